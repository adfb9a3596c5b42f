use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] nextmeeting_core::ConfigError),

    #[error(transparent)]
    Job(#[from] nextmeeting_core::JobError),

    #[error(transparent)]
    Tenant(#[from] nextmeeting_core::TenantError),

    #[error("unknown tenant '{name}', configured tenants: {known}")]
    UnknownTenant { name: String, known: String },

    #[error("server error: {0}")]
    Server(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::UnknownTenant { .. } => 2,
            Self::Job(_) => 1,
            Self::Tenant(_) => 3,
            Self::Server(_) => 1,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
