//! Runs one regeneration job across every tenant.
//!
//! Tenants are processed one after another in configured order. A tenant that
//! fails is recorded and the loop moves on; only a failure to set the job up
//! (resolving the registries) aborts the run. CDN purge, crash reports, the
//! summary notification and the check-in are advisory.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::data_source::{MeetingSource, SourceError};
use crate::domain::{SchedulePayload, TenantConfig, UtcDateTime};
use crate::effects::{AdvisoryEffects, CrashReport};
use crate::normalize::Normalizer;
use crate::publisher::{PublishError, Publisher, PublisherConfig};
use crate::registry::Registries;
use crate::storage::{ObjectLocation, StorageAdapter};
use crate::util::{map_ordered, map_parallel};
use crate::ConfigError;

pub const SUCCESS_BANNER: &str = "✅ NextMeeting schedules regenerated";

/// Purged after every run.
pub const CDN_PURGE_PATH: &str = "/*";

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("tenant '{tenant}': fetching meetings failed: {source}")]
    Source { tenant: String, source: SourceError },

    #[error("tenant '{tenant}': publishing failed: {source}")]
    Publish { tenant: String, source: PublishError },
}

impl TenantError {
    pub fn tenant(&self) -> &str {
        match self {
            Self::Source { tenant, .. } | Self::Publish { tenant, .. } => tenant,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Source { source, .. } => source.code(),
            Self::Publish { source, .. } => source.code(),
        }
    }

    pub fn crash_report(&self) -> CrashReport {
        CrashReport::new(self.code(), self.to_string()).for_tenant(self.tenant())
    }
}

/// Fatal, run-level failures.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job setup failed: {0}")]
    Setup(#[from] ConfigError),

    #[error("a regeneration run is already in progress")]
    AlreadyRunning,
}

/// Where a tenant's artifacts landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedSite {
    pub meetings: usize,
    pub html: ObjectLocation,
    pub json: ObjectLocation,
    pub template_attempts: u32,
}

#[derive(Debug)]
pub enum TenantStatus {
    Published(PublishedSite),
    Failed(TenantError),
}

#[derive(Debug)]
pub struct TenantOutcome {
    pub tenant: String,
    pub status: TenantStatus,
}

impl TenantOutcome {
    pub fn error(&self) -> Option<&TenantError> {
        match &self.status {
            TenantStatus::Failed(error) => Some(error),
            TenantStatus::Published(_) => None,
        }
    }
}

/// Outcome of one run, in tenant order.
#[derive(Debug)]
pub struct JobResult {
    pub outcomes: Vec<TenantOutcome>,
    pub started_at: UtcDateTime,
    pub finished_at: UtcDateTime,
}

/// `{success, errors}` as reported to callers and the HTTP surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub success: bool,
    pub errors: usize,
}

impl JobResult {
    pub fn failures(&self) -> impl Iterator<Item = &TenantError> {
        self.outcomes.iter().filter_map(TenantOutcome::error)
    }

    pub fn errors(&self) -> usize {
        self.failures().count()
    }

    pub fn success(&self) -> bool {
        self.errors() == 0
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            success: self.success(),
            errors: self.errors(),
        }
    }

    /// Text of the summary notification.
    pub fn notification_text(&self) -> String {
        if self.success() {
            return String::from(SUCCESS_BANNER);
        }
        let causes = self
            .failures()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n• ");
        format!(
            "❗️ NextMeeting schedule regeneration finished with {} failed tenant(s):\n• {causes}",
            self.errors()
        )
    }
}

/// Fetches and normalizes one tenant's schedule without publishing it.
pub async fn build_tenant_schedule(
    source: &dyn MeetingSource,
    normalizer: &Normalizer,
    tenant: &TenantConfig,
    now: UtcDateTime,
) -> Result<SchedulePayload, TenantError> {
    let records = source
        .fetch_meetings(&tenant.source_identifier)
        .await
        .map_err(|source| TenantError::Source {
            tenant: tenant.name.clone(),
            source,
        })?;
    Ok(normalizer.build_schedule(records, now))
}

pub struct JobRunner {
    registries: Arc<Registries>,
    tenants: Vec<TenantConfig>,
    publisher_config: PublisherConfig,
    normalizer: Normalizer,
    effects: AdvisoryEffects,
    run_lock: Mutex<()>,
}

impl JobRunner {
    pub fn new(
        registries: Arc<Registries>,
        tenants: Vec<TenantConfig>,
        publisher_config: PublisherConfig,
    ) -> Self {
        Self {
            registries,
            tenants,
            publisher_config,
            normalizer: Normalizer::default(),
            effects: AdvisoryEffects::disabled(),
            run_lock: Mutex::new(()),
        }
    }

    pub fn from_settings(
        settings: &Settings,
        registries: Arc<Registries>,
        effects: AdvisoryEffects,
    ) -> Self {
        Self::new(registries, settings.tenants.clone(), settings.publisher_config())
            .with_normalizer(Normalizer::new(settings.schedule_offset))
            .with_effects(effects)
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_effects(mut self, effects: AdvisoryEffects) -> Self {
        self.effects = effects;
        self
    }

    pub fn tenants(&self) -> &[TenantConfig] {
        &self.tenants
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Runs the job once. Returns [`JobError::AlreadyRunning`] instead of
    /// starting a second, overlapping run.
    pub async fn run(&self) -> Result<JobResult, JobError> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            warn!("regeneration already in progress, ignoring trigger");
            return Err(JobError::AlreadyRunning);
        };

        let started_at = UtcDateTime::now();
        info!(%started_at, tenants = self.tenants.len(), "starting schedule regeneration");

        let (source, storage) = match self.resolve_adapters().await {
            Ok(adapters) => adapters,
            Err(setup_error) => {
                self.report_fatal(&setup_error).await;
                return Err(JobError::Setup(setup_error));
            }
        };
        let publisher = Publisher::new(storage, self.publisher_config.clone());

        let source = source.as_ref();
        let publisher = &publisher;
        let outcomes = map_ordered(&self.tenants, |_, tenant| {
            self.process_tenant(source, publisher, tenant)
        })
        .await;

        let result = JobResult {
            outcomes,
            started_at,
            finished_at: UtcDateTime::now(),
        };
        self.finish(&result).await;
        Ok(result)
    }

    async fn resolve_adapters(
        &self,
    ) -> Result<(Arc<dyn MeetingSource>, Arc<dyn StorageAdapter>), ConfigError> {
        let source = self.registries.sources.resolve().await?;
        let storage = self.registries.storage.resolve().await?;
        Ok((source, storage))
    }

    #[tracing::instrument(level = "info", skip_all, fields(tenant = %tenant.name))]
    async fn process_tenant(
        &self,
        source: &dyn MeetingSource,
        publisher: &Publisher,
        tenant: &TenantConfig,
    ) -> TenantOutcome {
        let status = match self.regenerate(source, publisher, tenant).await {
            Ok(site) => {
                info!(meetings = site.meetings, html = %site.html, "tenant regenerated");
                TenantStatus::Published(site)
            }
            Err(tenant_error) => {
                error!(error = %tenant_error, code = tenant_error.code(), "tenant failed, continuing");
                TenantStatus::Failed(tenant_error)
            }
        };
        TenantOutcome {
            tenant: tenant.name.clone(),
            status,
        }
    }

    async fn regenerate(
        &self,
        source: &dyn MeetingSource,
        publisher: &Publisher,
        tenant: &TenantConfig,
    ) -> Result<PublishedSite, TenantError> {
        let payload =
            build_tenant_schedule(source, &self.normalizer, tenant, UtcDateTime::now()).await?;
        let report = publisher
            .publish(&payload, tenant)
            .await
            .map_err(|source| TenantError::Publish {
                tenant: tenant.name.clone(),
                source,
            })?;

        Ok(PublishedSite {
            meetings: payload.len(),
            html: report.html.location,
            json: report.json.location,
            template_attempts: report.template_attempts,
        })
    }

    async fn finish(&self, result: &JobResult) {
        let failures: Vec<&TenantError> = result.failures().collect();
        if failures.is_empty() {
            info!(tenants = result.outcomes.len(), "schedule regeneration completed");
        } else {
            warn!(
                failed = failures.len(),
                tenants = result.outcomes.len(),
                "schedule regeneration completed with failures"
            );
            map_parallel(&failures, |_, failure| async move {
                self.effects.crash_reporter.run(&failure.crash_report()).await
            })
            .await;
        }

        self.effects
            .cdn_purge
            .run(&[String::from(CDN_PURGE_PATH)])
            .await;
        self.effects
            .notifier
            .run(&result.notification_text())
            .await;
        self.effects.check_in.run(&()).await;
    }

    async fn report_fatal(&self, setup_error: &ConfigError) {
        error!(error = %setup_error, "schedule regeneration aborted");
        self.effects
            .crash_reporter
            .run(&CrashReport::new("JOB_SETUP_FAILED", setup_error.to_string()))
            .await;
        self.effects
            .notifier
            .run(&format!("❗️ Error! {setup_error}"))
            .await;
    }
}
