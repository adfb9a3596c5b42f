use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Closed set of meeting source backends selectable through `MEETING_SOURCE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceBackendId {
    GoogleSheets,
    RestApi,
    Database,
    JsonFile,
    Airtable,
    Jotform,
}

impl SourceBackendId {
    pub const ALL: [Self; 6] = [
        Self::GoogleSheets,
        Self::RestApi,
        Self::Database,
        Self::JsonFile,
        Self::Airtable,
        Self::Jotform,
    ];

    pub const DEFAULT: Self = Self::GoogleSheets;

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GoogleSheets => "google-sheets",
            Self::RestApi => "rest-api",
            Self::Database => "database",
            Self::JsonFile => "json-file",
            Self::Airtable => "airtable",
            Self::Jotform => "jotform",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::GoogleSheets => "Google Sheets",
            Self::RestApi => "REST API",
            Self::Database => "Database",
            Self::JsonFile => "JSON File",
            Self::Airtable => "Airtable",
            Self::Jotform => "Jotform",
        }
    }
}

impl Display for SourceBackendId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceBackendId {
    type Err = ValidationError;

    /// Exact, case-sensitive match. No aliases and no auto-detection.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == value)
            .ok_or_else(|| ValidationError::InvalidSourceBackend {
                value: value.to_owned(),
            })
    }
}

/// Closed set of storage backends selectable through `STORAGE_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackendId {
    AwsS3,
    CloudflareR2,
    FlyVolumes,
    Local,
}

impl StorageBackendId {
    pub const ALL: [Self; 4] = [
        Self::AwsS3,
        Self::CloudflareR2,
        Self::FlyVolumes,
        Self::Local,
    ];

    pub const DEFAULT: Self = Self::AwsS3;

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwsS3 => "aws-s3",
            Self::CloudflareR2 => "cloudflare-r2",
            Self::FlyVolumes => "fly-volumes",
            Self::Local => "local",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::AwsS3 => "AWS S3",
            Self::CloudflareR2 => "Cloudflare R2",
            Self::FlyVolumes => "Fly.io Volumes",
            Self::Local => "Local Filesystem",
        }
    }

    /// Object stores can hand out public URLs; filesystem backends only when
    /// a serving base URL is configured.
    pub const fn is_object_store(self) -> bool {
        matches!(self, Self::AwsS3 | Self::CloudflareR2)
    }
}

impl Display for StorageBackendId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageBackendId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == value)
            .ok_or_else(|| ValidationError::InvalidStorageBackend {
                value: value.to_owned(),
            })
    }
}
