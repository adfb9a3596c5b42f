//! Contract tests: every backend name resolves to an adapter that honours
//! the shared source and storage contracts.

#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;

use nextmeeting_core::backend::{SourceBackendId, StorageBackendId};
use nextmeeting_core::registry::{source_registry, storage_registry};
use nextmeeting_core::storage::UploadRequest;
use nextmeeting_core::{ConfigError, Env, ObjectLocation, SourceErrorKind, ValidationError};
use support::ScriptedHttpClient;

fn empty_env() -> Env {
    Env::from_pairs(Vec::<(String, String)>::new())
}

#[tokio::test]
async fn every_source_backend_name_resolves_to_its_own_adapter() {
    for id in SourceBackendId::ALL {
        let registry = source_registry(id.as_str(), empty_env(), ScriptedHttpClient::silent());

        let adapter = registry
            .resolve()
            .await
            .unwrap_or_else(|error| panic!("{id} should resolve: {error}"));

        assert_eq!(adapter.id(), id, "backend name {}", id.as_str());
        assert!(registry.is_resolved());
    }
}

#[tokio::test]
async fn remote_sources_without_credentials_fail_before_any_request() {
    let cases = [
        (SourceBackendId::GoogleSheets, "1AbCdEf"),
        (SourceBackendId::Airtable, "Meetings"),
        (SourceBackendId::RestApi, "/meetings"),
        (SourceBackendId::Database, "meetings"),
        (SourceBackendId::Jotform, "240000000000000"),
    ];

    for (id, identifier) in cases {
        let http = ScriptedHttpClient::silent();
        let registry = source_registry(id.as_str(), empty_env(), http.clone());
        let adapter = registry.resolve().await.expect("adapter");

        let error = adapter
            .fetch_meetings(identifier)
            .await
            .expect_err("credentials are missing");

        assert_eq!(error.kind(), SourceErrorKind::MissingConfig, "{id}: {error}");
        assert!(http.requests().is_empty(), "{id} reached the network");
    }
}

#[tokio::test]
async fn unknown_backend_names_fail_for_both_registries() {
    let sources = source_registry("smoke-signals", empty_env(), ScriptedHttpClient::silent());
    let storage = storage_registry("smoke-signals", empty_env());

    let source_error = sources.resolve().await.err().expect("unknown source");
    let storage_error = storage.resolve().await.err().expect("unknown storage");

    assert!(matches!(
        source_error,
        ConfigError::Validation(ValidationError::InvalidSourceBackend { .. })
    ));
    assert!(storage_error.to_string().contains("smoke-signals"));
    assert!(!sources.is_resolved());
    assert!(!storage.is_resolved());

    // A second call reports the same failure again.
    assert!(sources.resolve().await.is_err());
}

#[tokio::test]
async fn cloudflare_r2_without_account_is_a_configuration_error() {
    let registry = storage_registry(StorageBackendId::CloudflareR2.as_str(), empty_env());

    let error = registry.resolve().await.err().expect("missing R2 account");

    assert!(matches!(
        error,
        ConfigError::MissingEnvVar {
            name: "R2_ACCOUNT_ID"
        }
    ));
}

#[tokio::test]
async fn filesystem_backends_store_and_return_objects() {
    let cases = [
        (StorageBackendId::Local, "LOCAL_STORAGE_PATH"),
        (StorageBackendId::FlyVolumes, "FLY_VOLUME_PATH"),
    ];

    for (id, root_var) in cases {
        let dir = tempfile::tempdir().expect("tempdir");
        let env = Env::from_pairs([(root_var, dir.path().display().to_string())]);
        let storage = storage_registry(id.as_str(), env)
            .resolve()
            .await
            .expect("filesystem storage");
        assert_eq!(storage.id(), id);

        let location = ObjectLocation::new("sites", "abc/index.html");
        assert!(!storage.file_exists(&location).await.expect("exists check"));

        let receipt = storage
            .upload_file(UploadRequest::new(
                location.clone(),
                "<html></html>",
                "text/html",
            ))
            .await
            .expect("upload");
        assert_eq!(receipt.location, location);

        assert!(storage.file_exists(&location).await.expect("exists check"));
        let body = storage
            .download_file(&location)
            .await
            .expect("download")
            .into_text()
            .expect("utf-8 body");
        assert_eq!(body, "<html></html>");
    }
}

#[tokio::test]
async fn shared_adapter_is_reused_across_resolutions() {
    let registry = source_registry("json-file", empty_env(), Arc::new(nextmeeting_core::NoopHttpClient));

    let first = registry.resolve().await.expect("first");
    let second = registry.resolve().await.expect("second");

    assert!(Arc::ptr_eq(&first, &second));
}
