//! Best-effort side effects run around a regeneration job.
//!
//! | Effect | Input | Backend |
//! |---|---|---|
//! | CDN purge | paths | CloudFront `CreateInvalidation` |
//! | Summary notification | text | Slack-compatible webhook |
//! | Crash report | [`CrashReport`] | Honeybadger notices API |
//! | Liveness check-in | `()` | Honeybadger check-in |
//!
//! Each effect is wrapped in an [`Advisory`]: failures are logged and turned
//! into an [`AdvisoryOutcome`], never into an error of the job.

mod cloudfront;
mod honeybadger;
mod slack;

use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

pub use cloudfront::CloudFrontInvalidator;
pub use honeybadger::{CrashReport, HoneybadgerCheckIn, HoneybadgerNotifier, HONEYBADGER_API_URL};
pub use slack::SlackNotifier;

use crate::config::{Env, Settings};
use crate::http_client::{HttpClient, HttpResponse};

pub type EffectFuture<'a> = Pin<Box<dyn Future<Output = Result<(), AdvisoryError>> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdvisoryError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("endpoint answered status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Provider(String),
}

impl AdvisoryError {
    pub(crate) fn check_response(response: &HttpResponse) -> Result<(), Self> {
        if response.is_success() {
            Ok(())
        } else {
            Err(Self::Status {
                status: response.status,
                body: response.body_snippet(200),
            })
        }
    }
}

/// One fallible side effect.
pub trait AdvisoryEffect<I: ?Sized + Sync>: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply<'a>(&'a self, input: &'a I) -> EffectFuture<'a>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvisoryOutcome {
    Delivered,
    /// Not configured or disabled.
    Skipped,
    Failed(AdvisoryError),
}

impl AdvisoryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Optional effect whose outcome is logged and returned, never propagated.
pub struct Advisory<I: ?Sized + Sync> {
    label: &'static str,
    effect: Option<Arc<dyn AdvisoryEffect<I>>>,
}

impl<I: ?Sized + Sync> Advisory<I> {
    pub fn disabled(label: &'static str) -> Self {
        Self {
            label,
            effect: None,
        }
    }

    pub fn new(label: &'static str, effect: Arc<dyn AdvisoryEffect<I>>) -> Self {
        Self {
            label,
            effect: Some(effect),
        }
    }

    pub fn from_option(label: &'static str, effect: Option<Arc<dyn AdvisoryEffect<I>>>) -> Self {
        Self { label, effect }
    }

    pub fn is_enabled(&self) -> bool {
        self.effect.is_some()
    }

    pub async fn run(&self, input: &I) -> AdvisoryOutcome {
        let Some(effect) = &self.effect else {
            debug!(effect = self.label, "skipped, not configured");
            return AdvisoryOutcome::Skipped;
        };

        match effect.apply(input).await {
            Ok(()) => {
                info!(effect = self.label, backend = effect.name(), "delivered");
                AdvisoryOutcome::Delivered
            }
            Err(error) => {
                warn!(effect = self.label, backend = effect.name(), %error, "failed, ignoring");
                AdvisoryOutcome::Failed(error)
            }
        }
    }
}

impl<I: ?Sized + Sync> Debug for Advisory<I> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Advisory")
            .field("label", &self.label)
            .field("backend", &self.effect.as_ref().map(|effect| effect.name()))
            .finish()
    }
}

/// Every advisory effect a job run drives.
#[derive(Debug)]
pub struct AdvisoryEffects {
    pub cdn_purge: Advisory<[String]>,
    pub notifier: Advisory<str>,
    pub crash_reporter: Advisory<CrashReport>,
    pub check_in: Advisory<()>,
}

impl Default for AdvisoryEffects {
    fn default() -> Self {
        Self::disabled()
    }
}

impl AdvisoryEffects {
    pub fn disabled() -> Self {
        Self {
            cdn_purge: Advisory::disabled("cdn_purge"),
            notifier: Advisory::disabled("notification"),
            crash_reporter: Advisory::disabled("crash_report"),
            check_in: Advisory::disabled("check_in"),
        }
    }

    pub fn with_cdn_purge(mut self, effect: Arc<dyn AdvisoryEffect<[String]>>) -> Self {
        self.cdn_purge = Advisory::new("cdn_purge", effect);
        self
    }

    pub fn with_notifier(mut self, effect: Arc<dyn AdvisoryEffect<str>>) -> Self {
        self.notifier = Advisory::new("notification", effect);
        self
    }

    pub fn with_crash_reporter(mut self, effect: Arc<dyn AdvisoryEffect<CrashReport>>) -> Self {
        self.crash_reporter = Advisory::new("crash_report", effect);
        self
    }

    pub fn with_check_in(mut self, effect: Arc<dyn AdvisoryEffect<()>>) -> Self {
        self.check_in = Advisory::new("check_in", effect);
        self
    }

    /// Enables each effect whose settings are present.
    ///
    /// Test mode disables the chat notification and crash reporting;
    /// `SUPPRESS_ERROR_NOTIFICATIONS` disables crash reporting only.
    pub async fn from_settings(settings: &Settings, env: &Env, http: Arc<dyn HttpClient>) -> Self {
        let mut effects = Self::disabled();

        if let Some(distribution_id) = &settings.cloudfront_distribution_id {
            effects = effects.with_cdn_purge(Arc::new(
                CloudFrontInvalidator::from_env(env, distribution_id.clone()).await,
            ));
        }

        if settings.test_mode {
            info!("test mode: chat notifications and crash reports are disabled");
        } else {
            if let Some(webhook_url) = &settings.slack_webhook_url {
                effects = effects.with_notifier(Arc::new(SlackNotifier::new(
                    webhook_url.clone(),
                    Arc::clone(&http),
                )));
            }
            if let Some(api_key) = &settings.honeybadger_api_key {
                if settings.suppress_error_notifications {
                    info!("crash reports suppressed by SUPPRESS_ERROR_NOTIFICATIONS");
                } else {
                    effects = effects.with_crash_reporter(Arc::new(
                        HoneybadgerNotifier::new(api_key.clone(), Arc::clone(&http))
                            .with_environment(settings.environment.clone()),
                    ));
                }
            }
        }

        if let Some(token) = &settings.honeybadger_check_in_token {
            effects = effects.with_check_in(Arc::new(HoneybadgerCheckIn::new(token.clone(), http)));
        }

        effects
    }
}
