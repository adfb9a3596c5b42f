use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;

use super::{AdvisoryEffect, AdvisoryError, EffectFuture};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};

pub const HONEYBADGER_API_URL: &str = "https://api.honeybadger.io";

/// A single error worth reporting, usually one failed tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrashReport {
    /// Error class shown in the dashboard, e.g. `DOWNLOAD_FAILED`.
    pub class: String,
    pub message: String,
    pub tenant: Option<String>,
}

impl CrashReport {
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
            tenant: None,
        }
    }

    pub fn for_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }
}

/// Liveness ping: `GET /v1/check_in/{token}`.
pub struct HoneybadgerCheckIn {
    token: String,
    base_url: String,
    http: Arc<dyn HttpClient>,
}

impl HoneybadgerCheckIn {
    pub fn new(token: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            token: token.into(),
            base_url: String::from(HONEYBADGER_API_URL),
            http,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }
}

impl AdvisoryEffect<()> for HoneybadgerCheckIn {
    fn name(&self) -> &'static str {
        "honeybadger_check_in"
    }

    fn apply<'a>(&'a self, _input: &'a ()) -> EffectFuture<'a> {
        Box::pin(async move {
            let url = format!(
                "{}/v1/check_in/{}",
                self.base_url,
                urlencoding::encode(&self.token)
            );
            let response = self
                .http
                .execute(HttpRequest::get(url).with_timeout(Duration::from_secs(10)))
                .await
                .map_err(|error| AdvisoryError::Transport(error.to_string()))?;
            AdvisoryError::check_response(&response)
        })
    }
}

/// Reports errors through `POST /v1/notices`.
pub struct HoneybadgerNotifier {
    api_key: String,
    base_url: String,
    environment: Option<String>,
    http: Arc<dyn HttpClient>,
}

impl HoneybadgerNotifier {
    pub fn new(api_key: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: String::from(HONEYBADGER_API_URL),
            environment: None,
            http,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    fn notice(&self, report: &CrashReport) -> serde_json::Value {
        let tags: Vec<&str> = report.tenant.as_deref().into_iter().collect();
        json!({
            "notifier": {
                "name": "nextmeeting",
                "version": env!("CARGO_PKG_VERSION"),
            },
            "error": {
                "class": report.class,
                "message": report.message,
                "tags": tags,
            },
            "request": {
                "context": { "tenant": report.tenant },
            },
            "server": {
                "environment_name": self.environment,
            },
        })
    }
}

impl AdvisoryEffect<CrashReport> for HoneybadgerNotifier {
    fn name(&self) -> &'static str {
        "honeybadger"
    }

    fn apply<'a>(&'a self, report: &'a CrashReport) -> EffectFuture<'a> {
        Box::pin(async move {
            let request = HttpRequest::post(format!("{}/v1/notices", self.base_url))
                .with_auth(&HttpAuth::Header {
                    name: String::from("X-API-Key"),
                    value: self.api_key.clone(),
                })
                .with_header("accept", "application/json")
                .with_json(&self.notice(report))
                .with_timeout(Duration::from_secs(10));
            let response = self
                .http
                .execute(request)
                .await
                .map_err(|error| AdvisoryError::Transport(error.to_string()))?;
            AdvisoryError::check_response(&response)
        })
    }
}
