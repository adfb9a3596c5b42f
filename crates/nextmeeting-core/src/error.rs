use thiserror::Error;

/// Validation errors for values that enter the system from configuration or providers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid weekday '{value}', expected a weekday name such as Monday or Mon")]
    InvalidWeekday { value: String },
    #[error("invalid clock time '{value}', expected HH:MM with optional AM/PM")]
    InvalidClockTime { value: String },
    #[error("invalid boolean '{value}', expected true or false")]
    InvalidBoolean { value: String },

    #[error(
        "unknown meeting source '{value}', expected one of google-sheets, rest-api, database, json-file, airtable, jotform"
    )]
    InvalidSourceBackend { value: String },
    #[error(
        "unknown storage backend '{value}', expected one of aws-s3, cloudflare-r2, fly-volumes, local"
    )]
    InvalidStorageBackend { value: String },

    #[error("tenant field '{field}' cannot be empty")]
    EmptyTenantField { field: &'static str },
    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("utc offset must look like +HH:MM or -HH:MM: '{value}'")]
    InvalidUtcOffset { value: String },
    #[error("'{value}' is not a valid SQL identifier")]
    InvalidIdentifier { value: String },
}

/// Configuration errors raised while building settings or resolving adapters.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {name}")]
    MissingEnvVar { name: &'static str },

    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid tenant configuration: {0}")]
    Tenants(#[source] serde_json::Error),

    #[error("{backend} backend could not be initialised: {reason}")]
    Backend { backend: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name,
            reason: reason.into(),
        }
    }
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
