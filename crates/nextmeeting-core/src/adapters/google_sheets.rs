use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::value_text;
use crate::backend::SourceBackendId;
use crate::config::Env;
use crate::data_source::{MeetingSource, SourceError, SourceFuture};
use crate::domain::RawRecord;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::ConfigError;

const PROVIDER: &str = "google sheets";

/// Columns A..I: day, time, name, meeting id, password, join url, contact, notes, duration.
const COLUMN_RANGE: &str = "A:I";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleSheetsConfig {
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub base_url: String,
    /// Leading rows holding titles and column headers.
    pub header_rows: usize,
    /// Trailing rows holding notes below the schedule.
    pub footer_rows: usize,
}

impl Default for GoogleSheetsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            access_token: None,
            base_url: String::from("https://sheets.googleapis.com"),
            header_rows: 2,
            footer_rows: 2,
        }
    }
}

impl GoogleSheetsConfig {
    pub fn from_env(env: &Env) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: env.get("GOOGLE_API_KEY"),
            access_token: env.get("GOOGLE_ACCESS_TOKEN"),
            base_url: env.get_or("GOOGLE_SHEETS_BASE_URL", "https://sheets.googleapis.com"),
            footer_rows: env.parse("GOOGLE_SHEETS_FOOTER_ROWS", 2)?,
            ..Self::default()
        })
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Reads the first sheet of a spreadsheet through the Sheets v4 values API.
#[derive(Clone)]
pub struct GoogleSheetsSource {
    config: GoogleSheetsConfig,
    http_client: Arc<dyn HttpClient>,
}

impl GoogleSheetsSource {
    pub fn new(config: GoogleSheetsConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    fn request_for(&self, spreadsheet_id: &str) -> Result<HttpRequest, SourceError> {
        let mut url = format!(
            "{}/v4/spreadsheets/{}/values/{}?majorDimension=ROWS&valueRenderOption=FORMATTED_VALUE",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(spreadsheet_id),
            COLUMN_RANGE
        );

        let auth = match (&self.config.access_token, &self.config.api_key) {
            (Some(token), _) => HttpAuth::BearerToken(token.clone()),
            (None, Some(key)) => {
                url.push_str("&key=");
                url.push_str(&urlencoding::encode(key));
                HttpAuth::None
            }
            (None, None) => {
                return Err(SourceError::missing_config(
                    "google sheets requires GOOGLE_ACCESS_TOKEN or GOOGLE_API_KEY",
                ))
            }
        };

        Ok(HttpRequest::get(url).with_auth(&auth))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn fetch(&self, spreadsheet_id: &str) -> Result<Vec<RawRecord>, SourceError> {
        let request = self.request_for(spreadsheet_id)?;
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| SourceError::transport(PROVIDER, error))?;
        if !response.is_success() {
            return Err(SourceError::from_response(PROVIDER, &response));
        }

        let range: ValueRange = serde_json::from_str(&response.body).map_err(|error| {
            SourceError::invalid_payload(format!("{PROVIDER} returned malformed JSON: {error}"))
        })?;

        let body_end = range.values.len().saturating_sub(self.config.footer_rows);
        let records: Vec<RawRecord> = range.values[..body_end]
            .iter()
            .skip(self.config.header_rows)
            .filter_map(|row| row_to_record(row))
            .collect();
        debug!(rows = range.values.len(), records = records.len(), "sheet rows mapped");
        Ok(records)
    }
}

/// Rows without a start time are blank or spacer rows and are skipped.
fn row_to_record(row: &[Value]) -> Option<RawRecord> {
    let cell = |index: usize| row.get(index).and_then(value_text);

    let start_time = cell(1)?;
    Some(RawRecord {
        day_of_week: cell(0),
        start_time: Some(start_time),
        meeting_name: cell(2),
        meeting_id: cell(3),
        password: cell(4),
        join_url: cell(5),
        contact_info: cell(6),
        notes: cell(7),
        duration_minutes: cell(8),
    })
}

impl MeetingSource for GoogleSheetsSource {
    fn id(&self) -> SourceBackendId {
        SourceBackendId::GoogleSheets
    }

    fn fetch_meetings<'a>(
        &'a self,
        source_identifier: &'a str,
    ) -> SourceFuture<'a, Result<Vec<RawRecord>, SourceError>> {
        Box::pin(self.fetch(source_identifier))
    }

    fn test_connection<'a>(&'a self) -> SourceFuture<'a, bool> {
        let configured = self.config.access_token.is_some() || self.config.api_key.is_some();
        Box::pin(async move { configured })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::RecordingHttpClient;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::{HttpError, HttpResponse};
    use serde_json::json;

    fn source(client: Arc<RecordingHttpClient>, config: GoogleSheetsConfig) -> GoogleSheetsSource {
        GoogleSheetsSource::new(config, client)
    }

    fn api_key_config() -> GoogleSheetsConfig {
        GoogleSheetsConfig {
            api_key: Some(String::from("key-1")),
            base_url: String::from("https://sheets.test"),
            ..GoogleSheetsConfig::default()
        }
    }

    #[tokio::test]
    async fn skips_header_footer_and_rows_without_start_time() {
        let client = Arc::new(RecordingHttpClient::json([json!({
            "values": [
                ["NextMeeting schedule"],
                ["Day", "Time", "Name"],
                ["Monday", "7:00 PM", "Evening Group", "123 456", "pw", "https://zoom.test/j/1", "host@example.org", "Open", "90"],
                [],
                ["Tuesday", "", "No time"],
                ["Wednesday", "9:00 AM"],
                ["Thursday", "8:00 PM", "Footer note"],
                ["Last updated", "2024-01-01"]
            ]
        })]));

        let records = source(client.clone(), api_key_config())
            .fetch_meetings("sheet-1")
            .await
            .expect("fetch");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].meeting_name.as_deref(), Some("Evening Group"));
        assert_eq!(records[0].duration_minutes.as_deref(), Some("90"));
        assert_eq!(records[1].day_of_week.as_deref(), Some("Wednesday"));
        assert_eq!(records[1].meeting_name, None);

        let requests = client.recorded_requests();
        assert_eq!(
            requests[0].url,
            "https://sheets.test/v4/spreadsheets/sheet-1/values/A:I?majorDimension=ROWS&valueRenderOption=FORMATTED_VALUE&key=key-1"
        );
    }

    #[tokio::test]
    async fn sheet_shorter_than_its_footer_yields_nothing() {
        let client = Arc::new(RecordingHttpClient::json([json!({
            "values": [["Monday", "7:00 PM"]]
        })]));

        let records = source(client, api_key_config())
            .fetch_meetings("sheet-1")
            .await
            .expect("fetch");

        assert!(records.is_empty());
    }

    #[test]
    fn footer_rows_can_be_overridden_from_env() {
        let config = GoogleSheetsConfig::from_env(&Env::from_pairs([
            ("GOOGLE_API_KEY", "key-1"),
            ("GOOGLE_SHEETS_FOOTER_ROWS", "0"),
        ]))
        .expect("config");
        assert_eq!(config.footer_rows, 0);
        assert_eq!(config.header_rows, 2);

        let defaults = GoogleSheetsConfig::from_env(&Env::from_pairs([("GOOGLE_API_KEY", "key-1")]))
            .expect("config");
        assert_eq!(defaults.footer_rows, 2);

        let err = GoogleSheetsConfig::from_env(&Env::from_pairs([(
            "GOOGLE_SHEETS_FOOTER_ROWS",
            "-1",
        )]))
        .expect_err("must fail");
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[tokio::test]
    async fn access_token_is_sent_as_bearer_auth() {
        let client = Arc::new(RecordingHttpClient::json([json!({ "values": [] })]));
        let config = GoogleSheetsConfig {
            access_token: Some(String::from("ya29.token")),
            ..api_key_config()
        };

        source(client.clone(), config)
            .fetch_meetings("sheet-1")
            .await
            .expect("fetch");

        let request = &client.recorded_requests()[0];
        assert!(!request.url.contains("key="));
        assert_eq!(
            request.headers.get("authorization").map(String::as_str),
            Some("Bearer ya29.token")
        );
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_request() {
        let client = Arc::new(RecordingHttpClient::default());
        let error = source(client.clone(), GoogleSheetsConfig::default())
            .fetch_meetings("sheet-1")
            .await
            .expect_err("no credentials");

        assert_eq!(error.kind(), SourceErrorKind::MissingConfig);
        assert!(client.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_code() {
        let client = Arc::new(RecordingHttpClient::with_responses([
            Ok(HttpResponse::with_status(403, "{\"error\":\"denied\"}")),
            Err(HttpError::transient("unused")),
        ]));
        let error = source(client, api_key_config())
            .fetch_meetings("sheet-1")
            .await
            .expect_err("forbidden");

        assert_eq!(error.status(), Some(403));
        assert!(error.message().contains("denied"));
    }
}
