//! Environment-driven settings.
//!
//! Everything is read through [`Env`] so that tests can supply a fixed map
//! instead of mutating the process environment. Provider credentials are not
//! part of [`Settings`]; each adapter reads its own variables when its
//! registry resolves it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use time::UtcOffset;

use crate::domain::{parse_tenants, TenantConfig, TenantListError, DEFAULT_ARTIFACT_NAME};
use crate::publisher::{PublisherConfig, DEFAULT_TEMPLATE_KEY};
use crate::retry::RetryConfig;
use crate::util::parse_bool;
use crate::{ConfigError, ValidationError};

type Lookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Read-only view over environment variables.
#[derive(Clone)]
pub struct Env {
    lookup: Arc<Lookup>,
}

impl Env {
    /// Reads the real process environment.
    pub fn process() -> Self {
        Self {
            lookup: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// Fixed variable set, used by tests and embedders.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values: HashMap<String, String> = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self {
            lookup: Arc::new(move |name| values.get(name).cloned()),
        }
    }

    /// Trimmed value; unset and blank variables both read as `None`.
    pub fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    /// First variable in `names` that is set.
    pub fn first_of(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| self.get(name))
    }

    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_owned())
    }

    pub fn require(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::MissingEnvVar { name })
    }

    pub fn bool(&self, name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(name) {
            Some(value) => Ok(parse_bool(&value)?),
            None => Ok(default),
        }
    }

    pub fn parse<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            Some(value) => value
                .parse()
                .map_err(|error: T::Err| ConfigError::invalid(name, format!("'{value}': {error}"))),
            None => Ok(default),
        }
    }
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Env { .. }")
    }
}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source_backend: String,
    pub storage_backend: String,
    pub source_bucket: String,
    pub deploy_bucket: String,
    pub template_key: String,
    pub default_artifact_name: String,
    pub download_retry_delay: Duration,
    pub schedule_offset: UtcOffset,
    pub tenants: Vec<TenantConfig>,
    pub cloudfront_distribution_id: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub honeybadger_check_in_token: Option<String>,
    pub honeybadger_api_key: Option<String>,
    pub suppress_error_notifications: bool,
    pub test_mode: bool,
    pub run_interval_minutes: i64,
    pub run_on_startup: bool,
    pub port: u16,
    pub environment: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(&Env::process())
    }

    /// Builds settings from `env`. Backend names are kept as given; they are
    /// checked when the registries first resolve them.
    pub fn load(env: &Env) -> Result<Self, ConfigError> {
        let retry_delay_ms: u64 = env.parse("STORAGE_DOWNLOAD_RETRY_TIMEOUT_MS", 300)?;
        let schedule_offset = match env.get("SCHEDULE_UTC_OFFSET") {
            Some(value) => parse_utc_offset(&value)?,
            None => UtcOffset::UTC,
        };
        let run_interval_minutes: i64 = env.parse("RUN_INTERVAL_MINUTES", 60)?;
        if run_interval_minutes.checked_mul(60).is_none() {
            return Err(ConfigError::invalid(
                "RUN_INTERVAL_MINUTES",
                format!("{run_interval_minutes} minutes does not fit in seconds"),
            ));
        }

        Ok(Self {
            source_backend: env.get_or("MEETING_SOURCE", "google-sheets"),
            storage_backend: env.get_or("STORAGE_BACKEND", "aws-s3"),
            source_bucket: env
                .first_of(&["S3_BUCKET_NAME", "R2_BUCKET_NAME"])
                .unwrap_or_else(|| String::from("templates")),
            deploy_bucket: env
                .first_of(&["STATIC_SITE_S3_BUCKET", "R2_BUCKET_NAME"])
                .unwrap_or_else(|| String::from("sites")),
            template_key: env.get_or("TEMPLATE_FILE_KEY", DEFAULT_TEMPLATE_KEY),
            default_artifact_name: env.get_or("UPLOAD_FILE_NAME", DEFAULT_ARTIFACT_NAME),
            download_retry_delay: Duration::from_millis(retry_delay_ms),
            schedule_offset,
            tenants: load_tenants(env)?,
            cloudfront_distribution_id: env.get("CLOUDFRONT_DISTRIBUTION_ID"),
            slack_webhook_url: env.get("SLACK_WEBHOOK_URL"),
            honeybadger_check_in_token: env.get("HONEYBADGER_CHECK_IN_TOKEN"),
            honeybadger_api_key: env.get("HONEYBADGER_API_KEY"),
            suppress_error_notifications: env.bool("SUPPRESS_ERROR_NOTIFICATIONS", false)?,
            test_mode: env.bool("IS_TEST_MODE", false)?,
            run_interval_minutes,
            run_on_startup: env.bool("RUN_ON_STARTUP", false)?,
            port: env.parse("PORT", 8080)?,
            environment: env.get_or("APP_ENV", "production"),
        })
    }

    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            source_bucket: self.source_bucket.clone(),
            deploy_bucket: self.deploy_bucket.clone(),
            template_key: self.template_key.clone(),
            default_artifact_name: self.default_artifact_name.clone(),
            retry: RetryConfig::fixed(self.download_retry_delay, 3),
        }
    }

    /// Interval of the periodic loop, `None` when only a single run is wanted.
    pub fn run_interval(&self) -> Option<Duration> {
        u64::try_from(self.run_interval_minutes)
            .ok()
            .filter(|minutes| *minutes > 0)
            .and_then(|minutes| minutes.checked_mul(60))
            .map(Duration::from_secs)
    }
}

fn load_tenants(env: &Env) -> Result<Vec<TenantConfig>, ConfigError> {
    let json = match (env.get("TENANTS_JSON"), env.get("TENANTS_FILE")) {
        (Some(inline), _) => inline,
        (None, Some(path)) => {
            let path = PathBuf::from(path);
            std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?
        }
        (None, None) => {
            return Err(ConfigError::MissingEnvVar {
                name: "TENANTS_FILE",
            })
        }
    };

    let tenants = parse_tenants(&json).map_err(|error| match error {
        TenantListError::Json(error) => ConfigError::Tenants(error),
        TenantListError::Validation(error) => ConfigError::Validation(error),
    })?;
    if tenants.is_empty() {
        return Err(ConfigError::invalid("TENANTS_FILE", "no tenants configured"));
    }
    Ok(tenants)
}

/// Parses `Z`, `UTC`, `+HH:MM`, `-HH:MM` or `+HHMM`.
pub fn parse_utc_offset(value: &str) -> Result<UtcOffset, ValidationError> {
    let invalid = || ValidationError::InvalidUtcOffset {
        value: value.to_owned(),
    };
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }

    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'+') => (1_i8, &trimmed[1..]),
        Some(b'-') => (-1_i8, &trimmed[1..]),
        _ => return Err(invalid()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let hours: i8 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i8 = digits[2..].parse().map_err(|_| invalid())?;
    if minutes > 59 {
        return Err(invalid());
    }
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TENANTS: &str = r#"[{"name":"SA","sourceIdentifier":"sheet","siteIdentifier":"site"}]"#;

    #[test]
    fn defaults_apply_when_only_tenants_are_set() {
        let settings = Settings::load(&Env::from_pairs([("TENANTS_JSON", TENANTS)]))
            .expect("settings");

        assert_eq!(settings.source_backend, "google-sheets");
        assert_eq!(settings.storage_backend, "aws-s3");
        assert_eq!(settings.source_bucket, "templates");
        assert_eq!(settings.deploy_bucket, "sites");
        assert_eq!(settings.template_key, "index.template.html");
        assert_eq!(settings.download_retry_delay, Duration::from_millis(300));
        assert_eq!(settings.schedule_offset, UtcOffset::UTC);
        assert_eq!(settings.run_interval(), Some(Duration::from_secs(3600)));
        assert_eq!(settings.port, 8080);
        assert!(!settings.test_mode);
    }

    #[test]
    fn r2_bucket_is_the_fallback_for_both_buckets() {
        let settings = Settings::load(&Env::from_pairs([
            ("TENANTS_JSON", TENANTS),
            ("R2_BUCKET_NAME", "r2-bucket"),
            ("STATIC_SITE_S3_BUCKET", "deploy"),
        ]))
        .expect("settings");

        assert_eq!(settings.source_bucket, "r2-bucket");
        assert_eq!(settings.deploy_bucket, "deploy");
    }

    #[test]
    fn unknown_backend_names_are_not_rejected_at_load_time() {
        let settings = Settings::load(&Env::from_pairs([
            ("TENANTS_JSON", TENANTS),
            ("MEETING_SOURCE", "smoke-signals"),
        ]))
        .expect("settings load even with unknown backend");
        assert_eq!(settings.source_backend, "smoke-signals");
    }

    #[test]
    fn loose_booleans_are_configuration_errors() {
        let error = Settings::load(&Env::from_pairs([
            ("TENANTS_JSON", TENANTS),
            ("RUN_ON_STARTUP", "yes"),
        ]))
        .expect_err("strict boolean");
        assert!(matches!(
            error,
            ConfigError::Validation(ValidationError::InvalidBoolean { .. })
        ));
    }

    #[test]
    fn missing_tenants_are_reported() {
        let error = Settings::load(&Env::from_pairs(Vec::<(String, String)>::new()))
            .expect_err("tenants required");
        assert!(matches!(
            error,
            ConfigError::MissingEnvVar {
                name: "TENANTS_FILE"
            }
        ));
    }

    #[test]
    fn non_positive_interval_means_single_run() {
        let settings = Settings::load(&Env::from_pairs([
            ("TENANTS_JSON", TENANTS),
            ("RUN_INTERVAL_MINUTES", "0"),
        ]))
        .expect("settings");
        assert_eq!(settings.run_interval(), None);
    }

    #[test]
    fn interval_too_large_for_seconds_is_rejected() {
        let err = Settings::load(&Env::from_pairs([
            ("TENANTS_JSON", TENANTS),
            ("RUN_INTERVAL_MINUTES", "9223372036854775807"),
        ]))
        .expect_err("must fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "RUN_INTERVAL_MINUTES",
                ..
            }
        ));

        let settings = Settings::load(&Env::from_pairs([
            ("TENANTS_JSON", TENANTS),
            ("RUN_INTERVAL_MINUTES", "15"),
        ]))
        .expect("settings");
        assert_eq!(settings.run_interval(), Some(Duration::from_secs(900)));
    }

    #[test]
    fn utc_offsets_parse_in_common_spellings() {
        assert_eq!(parse_utc_offset("Z"), Ok(UtcOffset::UTC));
        assert_eq!(
            parse_utc_offset("-05:00"),
            Ok(UtcOffset::from_hms(-5, 0, 0).expect("offset"))
        );
        assert_eq!(
            parse_utc_offset("+0530"),
            Ok(UtcOffset::from_hms(5, 30, 0).expect("offset"))
        );
        assert!(parse_utc_offset("EST").is_err());
        assert!(parse_utc_offset("+5").is_err());
    }
}
