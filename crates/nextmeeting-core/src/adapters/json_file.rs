use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use super::{meeting_list, records_from_objects, GENERIC_JSON_ALIASES};
use crate::backend::SourceBackendId;
use crate::config::Env;
use crate::data_source::{MeetingSource, SourceError, SourceFuture};
use crate::domain::RawRecord;

const PROVIDER: &str = "json file";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonFileConfig {
    /// Directory that relative paths are resolved against.
    pub base_dir: PathBuf,
    /// File checked by `test_connection`.
    pub default_path: PathBuf,
}

impl Default for JsonFileConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            default_path: PathBuf::from("meetings.json"),
        }
    }
}

impl JsonFileConfig {
    pub fn from_env(env: &Env) -> Self {
        Self {
            base_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            default_path: PathBuf::from(env.get_or("JSON_FILE_PATH", "meetings.json")),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path.trim());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Reads meetings from a JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    config: JsonFileConfig,
}

impl JsonFileSource {
    pub fn new(config: JsonFileConfig) -> Self {
        Self { config }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn read(&self, path: &str) -> Result<Vec<RawRecord>, SourceError> {
        let path = self.config.resolve(path);
        let contents = tokio::fs::read_to_string(&path).await.map_err(|error| {
            SourceError::unavailable(format!("failed to read '{}': {error}", path.display()))
        })?;
        let document: Value = serde_json::from_str(&contents).map_err(|error| {
            SourceError::invalid_payload(format!("'{}' is not valid JSON: {error}", path.display()))
        })?;

        let records = records_from_objects(
            meeting_list(document, PROVIDER)?,
            &GENERIC_JSON_ALIASES,
            PROVIDER,
        );
        debug!(path = %path.display(), records = records.len(), "json meetings read");
        Ok(records)
    }
}

impl MeetingSource for JsonFileSource {
    fn id(&self) -> SourceBackendId {
        SourceBackendId::JsonFile
    }

    fn fetch_meetings<'a>(
        &'a self,
        source_identifier: &'a str,
    ) -> SourceFuture<'a, Result<Vec<RawRecord>, SourceError>> {
        Box::pin(self.read(source_identifier))
    }

    fn test_connection<'a>(&'a self) -> SourceFuture<'a, bool> {
        let path = self.config.base_dir.join(&self.config.default_path);
        Box::pin(async move { tokio::fs::metadata(&path).await.is_ok() })
    }
}
