//! Renders a schedule into the site template and uploads the artifacts.
//!
//! Steps, each aborting the rest for the tenant on failure:
//!
//! 1. Download the template from the source bucket (bounded retry).
//! 2. Replace the first injection marker with `const JSON_SCHEDULE=<json>;`.
//! 3. Upload the HTML to the deploy bucket (`text/html`, single attempt).
//! 4. Upload the payload as `<site>.json` (`application/json`, single attempt).

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{SchedulePayload, TenantConfig, DEFAULT_ARTIFACT_NAME};
use crate::retry::{retry, RetryConfig};
use crate::storage::{ObjectLocation, StorageAdapter, StorageError, UploadReceipt, UploadRequest};

/// Placeholder the template carries where the schedule is injected.
pub const TEMPLATE_INJECT_MARKER: &str = "/* INJECT_SCHEDULE_JSON */";

pub const DEFAULT_TEMPLATE_KEY: &str = "index.template.html";

const HTML_CONTENT_TYPE: &str = "text/html";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
    pub source_bucket: String,
    pub deploy_bucket: String,
    pub template_key: String,
    pub default_artifact_name: String,
    pub retry: RetryConfig,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            source_bucket: String::from("templates"),
            deploy_bucket: String::from("sites"),
            template_key: String::from(DEFAULT_TEMPLATE_KEY),
            default_artifact_name: String::from(DEFAULT_ARTIFACT_NAME),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to download '{key}' after {attempts} attempts: {source}")]
    DownloadFailed {
        key: String,
        attempts: u32,
        source: StorageError,
    },

    #[error("template '{key}' is not valid text: {source}")]
    TemplateEncoding {
        key: String,
        source: StorageError,
    },

    #[error("failed to serialize schedule payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to upload '{key}': {source}")]
    Upload {
        key: String,
        source: StorageError,
    },
}

impl PublishError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DownloadFailed { .. } => "DOWNLOAD_FAILED",
            Self::TemplateEncoding { .. } => "TEMPLATE_ENCODING",
            Self::Serialization(_) => "SERIALIZATION_FAILED",
            Self::Upload { .. } => "UPLOAD_FAILED",
        }
    }
}

/// Rendered page plus whether the marker was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub html: String,
    pub injected: bool,
}

/// Replaces the first marker occurrence with the schedule assignment.
///
/// `</` is escaped as `<\/` so notes containing `</script>` cannot end the
/// surrounding script element; the JSON value is unchanged.
pub fn render_artifact(template: &str, payload_json: &str) -> RenderedArtifact {
    match template.find(TEMPLATE_INJECT_MARKER) {
        Some(position) => {
            let script_safe = payload_json.replace("</", "<\\/");
            let mut html =
                String::with_capacity(template.len() + script_safe.len() + "const JSON_SCHEDULE=;".len());
            html.push_str(&template[..position]);
            html.push_str("const JSON_SCHEDULE=");
            html.push_str(&script_safe);
            html.push(';');
            html.push_str(&template[position + TEMPLATE_INJECT_MARKER.len()..]);
            RenderedArtifact {
                html,
                injected: true,
            }
        }
        None => RenderedArtifact {
            html: template.to_owned(),
            injected: false,
        },
    }
}

/// What one successful publish produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub html: UploadReceipt,
    pub json: UploadReceipt,
    pub template_attempts: u32,
    pub injected: bool,
}

pub struct Publisher {
    storage: Arc<dyn StorageAdapter>,
    config: PublisherConfig,
}

impl Publisher {
    pub fn new(storage: Arc<dyn StorageAdapter>, config: PublisherConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    #[tracing::instrument(level = "info", skip(self, payload, tenant), fields(tenant = %tenant.name))]
    pub async fn publish(
        &self,
        payload: &SchedulePayload,
        tenant: &TenantConfig,
    ) -> Result<PublishReport, PublishError> {
        let (template, template_attempts) = self.download_template().await?;
        let payload_json = serde_json::to_string(payload)?;

        let rendered = render_artifact(&template, &payload_json);
        if !rendered.injected {
            warn!(
                template = %self.config.template_key,
                marker = TEMPLATE_INJECT_MARKER,
                "template has no injection marker; uploading it unchanged"
            );
        }

        let html_key = tenant.artifact_key(&self.config.default_artifact_name);
        let html = self
            .upload(html_key, rendered.html, HTML_CONTENT_TYPE)
            .await?;
        let json = self
            .upload(tenant.payload_key(), payload_json, JSON_CONTENT_TYPE)
            .await?;

        info!(
            html = %html.location,
            json = %json.location,
            meetings = payload.len(),
            "site published"
        );
        Ok(PublishReport {
            html,
            json,
            template_attempts,
            injected: rendered.injected,
        })
    }

    async fn download_template(&self) -> Result<(String, u32), PublishError> {
        let location = ObjectLocation::new(&self.config.source_bucket, &self.config.template_key);
        let downloaded = retry(&self.config.retry, "template download", |_| {
            self.storage.download_file(&location)
        })
        .await
        .map_err(|exhausted| PublishError::DownloadFailed {
            key: location.key.clone(),
            attempts: exhausted.attempts,
            source: exhausted.last_error,
        })?;

        let template = downloaded
            .value
            .into_text()
            .map_err(|source| PublishError::TemplateEncoding {
                key: location.key.clone(),
                source,
            })?;
        Ok((template, downloaded.attempts))
    }

    async fn upload(
        &self,
        key: String,
        body: String,
        content_type: &str,
    ) -> Result<UploadReceipt, PublishError> {
        let location = ObjectLocation::new(&self.config.deploy_bucket, key);
        self.storage
            .upload_file(UploadRequest::new(location.clone(), body, content_type))
            .await
            .map_err(|source| PublishError::Upload {
                key: location.key,
                source,
            })
    }
}
