use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    ObjectBody, ObjectLocation, StorageAdapter, StorageError, StorageFuture, UploadReceipt,
    UploadRequest,
};
use crate::backend::StorageBackendId;
use crate::config::Env;

const META_SUFFIX: &str = ".meta";

/// Sidecar written next to every object.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMeta {
    content_type: String,
}

/// Stores objects as files under `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    id: StorageBackendId,
    root: PathBuf,
    public_base_url: Option<String>,
}

impl FilesystemStorage {
    pub fn new(id: StorageBackendId, root: impl Into<PathBuf>) -> Self {
        Self {
            id,
            root: root.into(),
            public_base_url: None,
        }
    }

    /// Files are served from `<base_url>/files/<bucket>/<key>`.
    pub fn with_public_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.public_base_url = Some(base_url.into().trim_end_matches('/').to_owned());
        self
    }

    /// Fly.io volume mounted at `FLY_VOLUME_PATH` (default `/data`).
    pub fn fly_volumes_from_env(env: &Env) -> Self {
        let storage = Self::new(
            StorageBackendId::FlyVolumes,
            env.get_or("FLY_VOLUME_PATH", "/data"),
        );
        match env.get("FLY_APP_URL") {
            Some(url) => storage.with_public_base_url(url),
            None => storage,
        }
    }

    /// Local directory at `LOCAL_STORAGE_PATH` (default `./local-storage`).
    pub fn local_from_env(env: &Env) -> Self {
        Self::new(
            StorageBackendId::Local,
            env.get_or("LOCAL_STORAGE_PATH", "./local-storage"),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, location: &ObjectLocation) -> Result<PathBuf, StorageError> {
        validate_segment(&location.bucket)?;
        validate_key(&location.key)?;
        Ok(self.root.join(&location.bucket).join(&location.key))
    }

    #[tracing::instrument(level = "debug", skip(self, request), fields(location = %request.location))]
    async fn write(&self, request: UploadRequest) -> Result<UploadReceipt, StorageError> {
        let path = self.object_path(&request.location)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| io_error("create directory", parent, error))?;
        }

        tokio::fs::write(&path, request.body.as_bytes())
            .await
            .map_err(|error| io_error("write", &path, error))?;

        let meta = serde_json::to_vec(&ObjectMeta {
            content_type: request.content_type,
        })
        .map_err(|error| StorageError::io(format!("failed to encode object metadata: {error}")))?;
        let meta_path = meta_path(&path);
        tokio::fs::write(&meta_path, meta)
            .await
            .map_err(|error| io_error("write", &meta_path, error))?;

        debug!(backend = %self.id, path = %path.display(), "object written");
        Ok(UploadReceipt {
            public_url: self.public_url(&request.location),
            etag: None,
            location: request.location,
        })
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn read(&self, location: &ObjectLocation) -> Result<ObjectBody, StorageError> {
        let path = self.object_path(location)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(ObjectBody::Binary(bytes)),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                Err(StorageError::not_found(&location.bucket, &location.key))
            }
            Err(error) => Err(io_error("read", &path, error)),
        }
    }

    async fn exists(&self, location: &ObjectLocation) -> Result<bool, StorageError> {
        let path = self.object_path(location)?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(io_error("stat", &path, error)),
        }
    }
}

impl StorageAdapter for FilesystemStorage {
    fn id(&self) -> StorageBackendId {
        self.id
    }

    fn upload_file<'a>(
        &'a self,
        request: UploadRequest,
    ) -> StorageFuture<'a, Result<UploadReceipt, StorageError>> {
        Box::pin(self.write(request))
    }

    fn download_file<'a>(
        &'a self,
        location: &'a ObjectLocation,
    ) -> StorageFuture<'a, Result<ObjectBody, StorageError>> {
        Box::pin(self.read(location))
    }

    fn file_exists<'a>(
        &'a self,
        location: &'a ObjectLocation,
    ) -> StorageFuture<'a, Result<bool, StorageError>> {
        Box::pin(self.exists(location))
    }

    fn public_url(&self, location: &ObjectLocation) -> Option<String> {
        self.public_base_url
            .as_ref()
            .map(|base| format!("{base}/files/{}/{}", location.bucket, location.key))
    }
}

fn meta_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(META_SUFFIX);
    PathBuf::from(name)
}

fn io_error(operation: &str, path: &Path, error: std::io::Error) -> StorageError {
    StorageError::io(format!("failed to {operation} '{}': {error}", path.display()))
}

fn validate_segment(bucket: &str) -> Result<(), StorageError> {
    if bucket.trim().is_empty() || bucket.contains(['/', '\\']) || bucket == ".." || bucket == "." {
        return Err(StorageError::invalid_key(bucket));
    }
    Ok(())
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.trim().is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.ends_with(META_SUFFIX)
        || key.split('/').any(|segment| segment == ".." || segment.is_empty())
    {
        return Err(StorageError::invalid_key(key));
    }
    Ok(())
}
