use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::{AdvisoryEffect, AdvisoryError, EffectFuture};
use crate::http_client::{HttpClient, HttpRequest};

/// Posts `{"text": ...}` to a Slack-compatible incoming webhook.
pub struct SlackNotifier {
    webhook_url: String,
    http: Arc<dyn HttpClient>,
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            http,
        }
    }
}

impl AdvisoryEffect<str> for SlackNotifier {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn apply<'a>(&'a self, text: &'a str) -> EffectFuture<'a> {
        Box::pin(async move {
            let request = HttpRequest::post(&self.webhook_url)
                .with_json(&json!({ "text": text }))
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
