//! Lazily resolved adapter registries.
//!
//! A registry holds a configured backend name and resolves it to one adapter
//! the first time it is asked. Resolution runs at most once per registry,
//! even under concurrent callers; an unknown name fails on that first
//! resolution and every later call reports the same failure again without
//! caching it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::adapters::source_adapter_from_env;
use crate::backend::{SourceBackendId, StorageBackendId};
use crate::config::{Env, Settings};
use crate::data_source::MeetingSource;
use crate::http_client::HttpClient;
use crate::storage::{storage_adapter_from_env, StorageAdapter};
use crate::ConfigError;

type Resolution<T> = Pin<Box<dyn Future<Output = Result<Arc<T>, ConfigError>> + Send>>;
type Factory<T> = Box<dyn Fn(String) -> Resolution<T> + Send + Sync>;

/// Backend name → adapter, resolved once on first use.
pub struct AdapterRegistry<T: ?Sized> {
    kind: &'static str,
    backend_name: String,
    factory: Factory<T>,
    cell: OnceCell<Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> AdapterRegistry<T> {
    pub fn new<F, Fut>(kind: &'static str, backend_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, ConfigError>> + Send + 'static,
    {
        Self {
            kind,
            backend_name: backend_name.into(),
            factory: Box::new(move |name| -> Resolution<T> { Box::pin(factory(name)) }),
            cell: OnceCell::new(),
        }
    }

    /// Registry that is already resolved to `adapter`.
    pub fn with_adapter(kind: &'static str, backend_name: impl Into<String>, adapter: Arc<T>) -> Self {
        Self {
            kind,
            backend_name: backend_name.into(),
            factory: Box::new(|name| -> Resolution<T> {
                Box::pin(async move {
                    Err(ConfigError::Backend {
                        backend: "registry",
                        reason: format!("preset registry cannot resolve '{name}'"),
                    })
                })
            }),
            cell: OnceCell::new_with(Some(adapter)),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.initialized()
    }

    /// Returns the adapter, building it on the first call.
    pub async fn resolve(&self) -> Result<Arc<T>, ConfigError> {
        self.cell
            .get_or_try_init(|| async {
                let adapter = (self.factory)(self.backend_name.clone()).await?;
                info!(kind = self.kind, backend = %self.backend_name, "adapter resolved");
                Ok(adapter)
            })
            .await
            .map(Arc::clone)
    }
}

impl<T: ?Sized> std::fmt::Debug for AdapterRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("kind", &self.kind)
            .field("backend_name", &self.backend_name)
            .field("resolved", &self.cell.initialized())
            .finish()
    }
}

pub type SourceRegistry = AdapterRegistry<dyn MeetingSource>;
pub type StorageRegistry = AdapterRegistry<dyn StorageAdapter>;

/// Source registry reading adapter credentials from `env` at resolution time.
pub fn source_registry(
    backend_name: impl Into<String>,
    env: Env,
    http_client: Arc<dyn HttpClient>,
) -> SourceRegistry {
    AdapterRegistry::new("meeting source", backend_name, move |name| {
        let env = env.clone();
        let http_client = Arc::clone(&http_client);
        async move {
            let id: SourceBackendId = name.parse()?;
            source_adapter_from_env(id, &env, http_client)
        }
    })
}

/// Storage registry reading backend configuration from `env` at resolution time.
pub fn storage_registry(backend_name: impl Into<String>, env: Env) -> StorageRegistry {
    AdapterRegistry::new("storage backend", backend_name, move |name| {
        let env = env.clone();
        async move {
            let id: StorageBackendId = name.parse()?;
            storage_adapter_from_env(id, &env).await
        }
    })
}

/// Both registries, built once at process start and shared by reference.
#[derive(Debug)]
pub struct Registries {
    pub sources: SourceRegistry,
    pub storage: StorageRegistry,
}

impl Registries {
    pub fn new(sources: SourceRegistry, storage: StorageRegistry) -> Self {
        Self { sources, storage }
    }

    pub fn from_settings(settings: &Settings, env: Env, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            sources: source_registry(settings.source_backend.clone(), env.clone(), http_client),
            storage: storage_registry(settings.storage_backend.clone(), env),
        }
    }
}
