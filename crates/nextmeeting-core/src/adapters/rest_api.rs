use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::{meeting_list, records_from_objects, GENERIC_JSON_ALIASES};
use crate::backend::SourceBackendId;
use crate::config::Env;
use crate::data_source::{MeetingSource, SourceError, SourceFuture};
use crate::domain::RawRecord;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};

const PROVIDER: &str = "rest api";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestApiConfig {
    pub base_url: Option<String>,
    pub auth_token: Option<String>,
    pub api_key: Option<String>,
}

impl RestApiConfig {
    pub fn from_env(env: &Env) -> Self {
        Self {
            base_url: env.get("API_BASE_URL"),
            auth_token: env.get("API_AUTH_TOKEN"),
            api_key: env.get("API_KEY"),
        }
    }
}

/// Fetches a JSON meeting list from an arbitrary HTTP endpoint.
#[derive(Clone)]
pub struct RestApiSource {
    config: RestApiConfig,
    http_client: Arc<dyn HttpClient>,
}

impl RestApiSource {
    pub fn new(config: RestApiConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    /// Absolute URLs are used as-is; anything else is a path under `API_BASE_URL`.
    fn endpoint(&self, source_identifier: &str) -> Result<String, SourceError> {
        let identifier = source_identifier.trim();
        if identifier.starts_with("http://") || identifier.starts_with("https://") {
            return Ok(identifier.to_owned());
        }

        let base = self.config.base_url.as_deref().ok_or_else(|| {
            SourceError::missing_config(format!(
                "rest api source '{identifier}' is relative and API_BASE_URL is not set"
            ))
        })?;
        Ok(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            identifier.trim_start_matches('/')
        ))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn fetch(&self, source_identifier: &str) -> Result<Vec<RawRecord>, SourceError> {
        let mut request = HttpRequest::get(self.endpoint(source_identifier)?)
            .with_header("accept", "application/json");
        if let Some(token) = &self.config.auth_token {
            request = request.with_auth(&HttpAuth::BearerToken(token.clone()));
        }
        if let Some(key) = &self.config.api_key {
            request = request.with_auth(&HttpAuth::Header {
                name: String::from("X-API-Key"),
                value: key.clone(),
            });
        }

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| SourceError::transport(PROVIDER, error))?;
        if !response.is_success() {
            return Err(SourceError::from_response(PROVIDER, &response));
        }

        let document: Value = serde_json::from_str(&response.body).map_err(|error| {
            SourceError::invalid_payload(format!("{PROVIDER} returned malformed JSON: {error}"))
        })?;
        let records = records_from_objects(
            meeting_list(document, PROVIDER)?,
            &GENERIC_JSON_ALIASES,
            PROVIDER,
        );
        debug!(records = records.len(), "rest api meetings fetched");
        Ok(records)
    }
}

impl MeetingSource for RestApiSource {
    fn id(&self) -> SourceBackendId {
        SourceBackendId::RestApi
    }

    fn fetch_meetings<'a>(
        &'a self,
        source_identifier: &'a str,
    ) -> SourceFuture<'a, Result<Vec<RawRecord>, SourceError>> {
        Box::pin(self.fetch(source_identifier))
    }

    fn test_connection<'a>(&'a self) -> SourceFuture<'a, bool> {
        Box::pin(async move {
            match self.fetch("health").await {
                Ok(_) => true,
                Err(error) => {
                    tracing::warn!(%error, "rest api connection test failed");
                    false
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::RecordingHttpClient;
    use crate::data_source::SourceErrorKind;
    use serde_json::json;

    #[tokio::test]
    async fn relative_identifiers_join_base_url_and_send_both_credentials() {
        let client = Arc::new(RecordingHttpClient::json([json!({
            "meetings": [
                { "day_of_week": "Monday", "start_time": "19:00", "title": "Big Book", "durationMinutes": 75 },
                { "dayOfWeek": "Sunday", "startTime": "10:00 AM", "meetingName": "Sunday Serenity", "contact": "sam@example.org" }
            ]
        })]));
        let source = RestApiSource::new(
            RestApiConfig {
                base_url: Some(String::from("https://meetings.test/api/")),
                auth_token: Some(String::from("tok")),
                api_key: Some(String::from("key")),
            },
            client.clone(),
        );

        let records = source.fetch_meetings("/groups/sa").await.expect("fetch");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].meeting_name.as_deref(), Some("Big Book"));
        assert_eq!(records[0].duration_minutes.as_deref(), Some("75"));
        assert_eq!(records[1].contact_info.as_deref(), Some("sam@example.org"));

        let request = &client.recorded_requests()[0];
        assert_eq!(request.url, "https://meetings.test/api/groups/sa");
        assert_eq!(
            request.headers.get("authorization").map(String::as_str),
            Some("Bearer tok")
        );
        assert_eq!(request.headers.get("x-api-key").map(String::as_str), Some("key"));
    }

    #[tokio::test]
    async fn relative_identifier_without_base_url_is_a_config_error() {
        let client = Arc::new(RecordingHttpClient::default());
        let error = RestApiSource::new(RestApiConfig::default(), client.clone())
            .fetch_meetings("groups/sa")
            .await
            .expect_err("no base url");

        assert_eq!(error.kind(), SourceErrorKind::MissingConfig);
        assert!(client.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn payload_without_meeting_array_is_rejected() {
        let client = Arc::new(RecordingHttpClient::json([json!({ "status": "ok" })]));
        let error = RestApiSource::new(RestApiConfig::default(), client)
            .fetch_meetings("https://meetings.test/list")
            .await
            .expect_err("no array");

        assert_eq!(error.kind(), SourceErrorKind::InvalidPayload);
    }
}
