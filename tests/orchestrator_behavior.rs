//! Behaviour tests for a full regeneration run across tenants.

mod support;

use std::sync::Arc;
use std::time::Duration;

use nextmeeting_core::config::Env;
use nextmeeting_core::data_source::{MeetingSource, SourceError};
use nextmeeting_core::domain::TenantConfig;
use nextmeeting_core::orchestrator::{TenantStatus, SUCCESS_BANNER};
use nextmeeting_core::registry::{source_registry, storage_registry, SourceRegistry, StorageRegistry};
use nextmeeting_core::storage::StorageAdapter;
use nextmeeting_core::{
    AdvisoryEffects, ConfigError, CrashReport, JobError, JobRunner, NoopHttpClient,
    PublisherConfig, Registries, RetryConfig, ValidationError,
};
use support::{record, InMemoryStorage, RecordingEffect, SlowSource, StaticSource, TEMPLATE};

fn tenants() -> Vec<TenantConfig> {
    vec![
        TenantConfig::new("S-Anon", "sheet-1", "site-1").expect("valid tenant"),
        TenantConfig::new("SA", "sheet-2", "site-2").expect("valid tenant"),
        TenantConfig::new("ACA", "sheet-3", "site-3").expect("valid tenant"),
    ]
}

fn storage() -> Arc<InMemoryStorage> {
    Arc::new(InMemoryStorage::with_template(
        "templates",
        "index.template.html",
        TEMPLATE,
    ))
}

fn healthy_source() -> StaticSource {
    StaticSource::default()
        .with("sheet-1", vec![record("Monday", "7:00 PM", Some("One"))])
        .with("sheet-2", vec![record("Tuesday", "7:00 PM", Some("Two"))])
        .with("sheet-3", vec![record("Friday", "7:00 PM", Some("Three"))])
}

fn registries(source: Arc<dyn MeetingSource>, storage: Arc<dyn StorageAdapter>) -> Arc<Registries> {
    Arc::new(Registries::new(
        SourceRegistry::with_adapter("meeting source", "json-file", source),
        StorageRegistry::with_adapter("storage backend", "local", storage),
    ))
}

fn publisher_config() -> PublisherConfig {
    PublisherConfig {
        retry: RetryConfig::fixed(Duration::ZERO, 3),
        ..PublisherConfig::default()
    }
}

struct Recorders {
    cdn: Arc<RecordingEffect<Vec<String>>>,
    notifier: Arc<RecordingEffect<String>>,
    crash: Arc<RecordingEffect<CrashReport>>,
    check_in: Arc<RecordingEffect<()>>,
}

impl Recorders {
    fn succeeding() -> Self {
        Self {
            cdn: RecordingEffect::succeeding(),
            notifier: RecordingEffect::succeeding(),
            crash: RecordingEffect::succeeding(),
            check_in: RecordingEffect::succeeding(),
        }
    }

    fn failing() -> Self {
        Self {
            cdn: RecordingEffect::failing(),
            notifier: RecordingEffect::failing(),
            crash: RecordingEffect::failing(),
            check_in: RecordingEffect::failing(),
        }
    }

    fn effects(&self) -> AdvisoryEffects {
        AdvisoryEffects::disabled()
            .with_cdn_purge(self.cdn.clone())
            .with_notifier(self.notifier.clone())
            .with_crash_reporter(self.crash.clone())
            .with_check_in(self.check_in.clone())
    }
}

// =============================================================================
// Tenant isolation
// =============================================================================

#[tokio::test]
async fn when_one_tenant_source_fails_then_the_others_still_publish() {
    // Given: three tenants where the second one's source is down
    let source = Arc::new(healthy_source().failing(
        "sheet-2",
        SourceError::upstream_status(503, "sheets returned status 503"),
    ));
    let storage = storage();
    let recorders = Recorders::succeeding();
    let runner = JobRunner::new(registries(source.clone(), storage.clone()), tenants(), publisher_config())
        .with_effects(recorders.effects());

    // When: the job runs
    let result = runner.run().await.expect("run is not fatal");

    // Then: tenants were visited in order and 1 and 3 were published
    assert_eq!(source.calls(), ["sheet-1", "sheet-2", "sheet-3"]);
    assert!(matches!(result.outcomes[0].status, TenantStatus::Published(_)));
    assert!(matches!(result.outcomes[1].status, TenantStatus::Failed(_)));
    assert!(matches!(result.outcomes[2].status, TenantStatus::Published(_)));
    assert!(storage.object("sites", "site-1.json").is_some());
    assert!(storage.object("sites", "site-2.json").is_none());
    assert!(storage.object("sites", "site-3/index.html").is_some());

    // And: the run reports one error
    let summary = result.summary();
    assert!(!summary.success);
    assert_eq!(summary.errors, 1);

    // And: the failure was reported individually and in the summary notification
    let reports = recorders.crash.seen();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].tenant.as_deref(), Some("SA"));
    assert_eq!(reports[0].class, "source.upstream_status");
    let notifications = recorders.notifier.seen();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].contains("1 failed tenant(s)"));
    assert!(notifications[0].contains("tenant 'SA'"));
}

#[tokio::test]
async fn when_one_tenant_cannot_upload_then_only_that_tenant_fails() {
    let storage = Arc::new(
        InMemoryStorage::with_template("templates", "index.template.html", TEMPLATE)
            .fail_upload_of("site-1/index.html"),
    );
    let runner = JobRunner::new(
        registries(Arc::new(healthy_source()), storage.clone()),
        tenants(),
        publisher_config(),
    );

    let result = runner.run().await.expect("run is not fatal");

    let failed: Vec<&str> = result.failures().map(|error| error.tenant()).collect();
    assert_eq!(failed, ["S-Anon"]);
    assert_eq!(result.failures().next().map(|error| error.code()), Some("UPLOAD_FAILED"));
    assert!(storage.object("sites", "site-2.json").is_some());
    assert!(storage.object("sites", "site-3.json").is_some());
}

#[tokio::test]
async fn when_every_tenant_publishes_then_the_success_banner_is_sent() {
    let recorders = Recorders::succeeding();
    let runner = JobRunner::new(
        registries(Arc::new(healthy_source()), storage()),
        tenants(),
        publisher_config(),
    )
    .with_effects(recorders.effects());

    let result = runner.run().await.expect("run succeeds");

    assert!(result.success());
    assert_eq!(recorders.notifier.seen(), [SUCCESS_BANNER]);
    assert_eq!(recorders.cdn.seen(), [vec![String::from("/*")]]);
    assert_eq!(recorders.check_in.seen().len(), 1);
    assert!(recorders.crash.seen().is_empty());
}

// =============================================================================
// Advisory effects never change the outcome
// =============================================================================

#[tokio::test]
async fn when_every_advisory_effect_fails_then_the_run_still_succeeds() {
    // Given: CDN, notifier, crash reporter and check-in all failing
    let recorders = Recorders::failing();
    let runner = JobRunner::new(
        registries(Arc::new(healthy_source()), storage()),
        tenants(),
        publisher_config(),
    )
    .with_effects(recorders.effects());

    // When
    let result = runner.run().await.expect("advisory failures are not fatal");

    // Then: the outcome only reflects the tenants
    assert!(result.success());
    assert_eq!(result.errors(), 0);

    // And: each effect was still attempted once
    assert_eq!(recorders.cdn.seen().len(), 1);
    assert_eq!(recorders.notifier.seen().len(), 1);
    assert_eq!(recorders.check_in.seen().len(), 1);
}

#[tokio::test]
async fn when_crash_reporting_fails_then_failed_tenants_are_still_counted_once() {
    let recorders = Recorders::failing();
    let source = Arc::new(
        healthy_source()
            .failing("sheet-1", SourceError::unavailable("timeout"))
            .failing("sheet-3", SourceError::unavailable("timeout")),
    );
    let runner = JobRunner::new(registries(source, storage()), tenants(), publisher_config())
        .with_effects(recorders.effects());

    let result = runner.run().await.expect("run is not fatal");

    assert_eq!(result.errors(), 2);
    let mut reported: Vec<Option<String>> = recorders
        .crash
        .seen()
        .into_iter()
        .map(|report| report.tenant)
        .collect();
    reported.sort();
    assert_eq!(
        reported,
        [Some(String::from("ACA")), Some(String::from("S-Anon"))]
    );
}

// =============================================================================
// Orchestration-level failures
// =============================================================================

fn empty_env() -> Env {
    Env::from_pairs(Vec::<(String, String)>::new())
}

#[tokio::test]
async fn when_source_backend_is_unknown_then_the_run_is_fatal_and_names_it() {
    // Given: a source registry configured with a backend that does not exist
    let recorders = Recorders::succeeding();
    let storage = storage();
    let registries = Arc::new(Registries::new(
        source_registry("smoke-signals", empty_env(), Arc::new(NoopHttpClient)),
        StorageRegistry::with_adapter("storage backend", "local", storage.clone()),
    ));
    let runner = JobRunner::new(registries, tenants(), publisher_config())
        .with_effects(recorders.effects());

    // When
    let error = runner.run().await.expect_err("unknown backend is fatal");

    // Then: the error names the backend
    assert!(matches!(
        &error,
        JobError::Setup(ConfigError::Validation(ValidationError::InvalidSourceBackend { value }))
            if value == "smoke-signals"
    ));
    assert!(error.to_string().contains("smoke-signals"));

    // And: operators were told, nothing was published, no check-in was sent
    let notifications = recorders.notifier.seen();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].contains("smoke-signals"));
    assert_eq!(recorders.crash.seen().len(), 1);
    assert!(recorders.check_in.seen().is_empty());
    assert!(storage.keys("sites").is_empty());
}

#[tokio::test]
async fn when_storage_backend_is_unknown_then_no_tenant_is_fetched() {
    let source = Arc::new(healthy_source());
    let registries = Arc::new(Registries::new(
        SourceRegistry::with_adapter("meeting source", "json-file", source.clone()),
        storage_registry("smoke-signals", empty_env()),
    ));
    let runner = JobRunner::new(registries, tenants(), publisher_config());

    let error = runner.run().await.expect_err("unknown backend is fatal");

    assert!(matches!(
        error,
        JobError::Setup(ConfigError::Validation(ValidationError::InvalidStorageBackend { .. }))
    ));
    assert!(source.calls().is_empty());
}

// =============================================================================
// Run lock
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_a_run_is_in_progress_then_a_second_trigger_does_not_overlap() {
    // Given: a slow source keeps the first run busy
    let source = Arc::new(SlowSource {
        inner: healthy_source(),
        delay: Duration::from_secs(5),
    });
    let runner = Arc::new(JobRunner::new(
        registries(source, storage()),
        tenants(),
        publisher_config(),
    ));
    let first = tokio::spawn({
        let runner = Arc::clone(&runner);
        async move { runner.run().await }
    });
    while !runner.is_running() {
        tokio::task::yield_now().await;
    }

    // When: another trigger arrives
    let second = runner.run().await;

    // Then: it is refused and the first run completes normally
    assert!(matches!(second, Err(JobError::AlreadyRunning)));
    let first = first.await.expect("task joins").expect("first run succeeds");
    assert!(first.success());
    assert!(!runner.is_running());
}
