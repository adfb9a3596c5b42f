use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// File name used for the rendered page when a tenant does not name one.
pub const DEFAULT_ARTIFACT_NAME: &str = "index.html";

/// One site to regenerate: where its meetings come from and where it is published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfig {
    pub name: String,
    #[serde(alias = "googleSheetId", alias = "sourceId")]
    pub source_identifier: String,
    #[serde(alias = "siteUUID", alias = "siteId")]
    pub site_identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_name: Option<String>,
}

impl TenantConfig {
    pub fn new(
        name: impl Into<String>,
        source_identifier: impl Into<String>,
        site_identifier: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let tenant = Self {
            name: name.into(),
            source_identifier: source_identifier.into(),
            site_identifier: site_identifier.into(),
            artifact_name: None,
        };
        tenant.validate()?;
        Ok(tenant)
    }

    pub fn with_artifact_name(mut self, artifact_name: impl Into<String>) -> Self {
        self.artifact_name = Some(artifact_name.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("name", &self.name),
            ("sourceIdentifier", &self.source_identifier),
            ("siteIdentifier", &self.site_identifier),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::EmptyTenantField { field });
            }
        }
        if matches!(&self.artifact_name, Some(name) if name.trim().is_empty()) {
            return Err(ValidationError::EmptyTenantField {
                field: "artifactName",
            });
        }
        Ok(())
    }

    /// Deploy-bucket key of the rendered page: `<site>/index.html` unless overridden.
    pub fn artifact_key(&self, default_name: &str) -> String {
        match &self.artifact_name {
            Some(name) => name.clone(),
            None => format!("{}/{}", self.site_identifier, default_name),
        }
    }

    /// Deploy-bucket key of the companion JSON payload.
    pub fn payload_key(&self) -> String {
        format!("{}.json", self.site_identifier)
    }
}

/// Parses and validates a JSON array of tenants.
pub fn parse_tenants(json: &str) -> Result<Vec<TenantConfig>, TenantListError> {
    let tenants: Vec<TenantConfig> = serde_json::from_str(json)?;
    for tenant in &tenants {
        tenant.validate()?;
    }
    Ok(tenants)
}

#[derive(Debug, thiserror::Error)]
pub enum TenantListError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
