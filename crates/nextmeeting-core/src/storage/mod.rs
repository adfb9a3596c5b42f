//! Object storage contract and backends.
//!
//! | Backend | Implementation | Public URLs |
//! |---------|----------------|-------------|
//! | `aws-s3` | [`S3Storage`] | always |
//! | `cloudflare-r2` | [`S3Storage`] against the R2 endpoint | when `R2_PUBLIC_DOMAIN` is set |
//! | `fly-volumes` | [`FilesystemStorage`] | when `FLY_APP_URL` is set |
//! | `local` | [`FilesystemStorage`] | never |

mod filesystem;
mod s3;

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use filesystem::FilesystemStorage;
pub use s3::S3Storage;
pub(crate) use s3::load_aws_config;

use crate::backend::StorageBackendId;
use crate::config::Env;
use crate::ConfigError;

/// Boxed future returned by storage trait methods.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Storage error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    NotFound,
    InvalidKey,
    InvalidContent,
    Unavailable,
    Io,
}

/// Structured storage error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageError {
    kind: StorageErrorKind,
    message: String,
}

impl StorageError {
    pub fn not_found(bucket: &str, key: &str) -> Self {
        Self {
            kind: StorageErrorKind::NotFound,
            message: format!("object '{bucket}/{key}' does not exist"),
        }
    }

    pub fn invalid_key(key: &str) -> Self {
        Self {
            kind: StorageErrorKind::InvalidKey,
            message: format!("object key '{key}' is not allowed"),
        }
    }

    pub fn invalid_content(message: impl Into<String>) -> Self {
        Self {
            kind: StorageErrorKind::InvalidContent,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: StorageErrorKind::Unavailable,
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self {
            kind: StorageErrorKind::Io,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> StorageErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            StorageErrorKind::NotFound => "storage.not_found",
            StorageErrorKind::InvalidKey => "storage.invalid_key",
            StorageErrorKind::InvalidContent => "storage.invalid_content",
            StorageErrorKind::Unavailable => "storage.unavailable",
            StorageErrorKind::Io => "storage.io",
        }
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for StorageError {}

/// Object contents: text or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectBody {
    Text(String),
    Binary(Vec<u8>),
}

impl ObjectBody {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.into_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Decodes the body as UTF-8 text.
    pub fn into_text(self) -> Result<String, StorageError> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Binary(bytes) => String::from_utf8(bytes)
                .map_err(|error| StorageError::invalid_content(format!("object is not UTF-8: {error}"))),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for ObjectBody {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for ObjectBody {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vec<u8>> for ObjectBody {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

/// Bucket + key address of one object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl Display for ObjectLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub location: ObjectLocation,
    pub body: ObjectBody,
    pub content_type: String,
}

impl UploadRequest {
    pub fn new(
        location: ObjectLocation,
        body: impl Into<ObjectBody>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            location,
            body: body.into(),
            content_type: content_type.into(),
        }
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub location: ObjectLocation,
    pub etag: Option<String>,
    pub public_url: Option<String>,
}

/// Storage backend contract.
pub trait StorageAdapter: Send + Sync {
    fn id(&self) -> StorageBackendId;

    fn upload_file<'a>(
        &'a self,
        request: UploadRequest,
    ) -> StorageFuture<'a, Result<UploadReceipt, StorageError>>;

    /// Downloads an object. A missing object is an error here.
    fn download_file<'a>(
        &'a self,
        location: &'a ObjectLocation,
    ) -> StorageFuture<'a, Result<ObjectBody, StorageError>>;

    /// `Ok(false)` for a missing object; other failures are errors.
    fn file_exists<'a>(
        &'a self,
        location: &'a ObjectLocation,
    ) -> StorageFuture<'a, Result<bool, StorageError>>;

    fn public_url(&self, location: &ObjectLocation) -> Option<String> {
        let _ = location;
        None
    }
}

/// Builds the storage adapter for `id`, reading its variables from `env`.
pub async fn storage_adapter_from_env(
    id: StorageBackendId,
    env: &Env,
) -> Result<Arc<dyn StorageAdapter>, ConfigError> {
    let adapter: Arc<dyn StorageAdapter> = match id {
        StorageBackendId::AwsS3 => Arc::new(S3Storage::aws_from_env(env).await),
        StorageBackendId::CloudflareR2 => Arc::new(S3Storage::r2_from_env(env).await?),
        StorageBackendId::FlyVolumes => Arc::new(FilesystemStorage::fly_volumes_from_env(env)),
        StorageBackendId::Local => Arc::new(FilesystemStorage::local_from_env(env)),
    };
    Ok(adapter)
}
