use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::FieldAliases;
use crate::backend::SourceBackendId;
use crate::config::Env;
use crate::data_source::{MeetingSource, SourceError, SourceFuture};
use crate::domain::RawRecord;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};

const PROVIDER: &str = "airtable";

/// Airtable caps pages at 100 records.
const PAGE_SIZE: usize = 100;

const AIRTABLE_ALIASES: FieldAliases = FieldAliases {
    day_of_week: &["Day of Week", "dayOfWeek", "Day"],
    start_time: &["Start Time", "startTime", "Time"],
    meeting_name: &["Meeting Name", "name", "Name"],
    meeting_id: &["Meeting ID", "meetingId"],
    password: &["Password", "password"],
    join_url: &["Join URL", "joinUrl", "url"],
    contact_info: &["Contact Info", "contactInfo"],
    notes: &["Notes", "notes"],
    duration_minutes: &["Duration (minutes)", "duration", "Duration"],
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AirtableConfig {
    pub api_key: Option<String>,
    pub base_id: Option<String>,
    pub default_table: String,
    pub base_url: String,
}

impl Default for AirtableConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_id: None,
            default_table: String::from("Meetings"),
            base_url: String::from("https://api.airtable.com"),
        }
    }
}

impl AirtableConfig {
    pub fn from_env(env: &Env) -> Self {
        Self {
            api_key: env.get("AIRTABLE_API_KEY"),
            base_id: env.get("AIRTABLE_BASE_ID"),
            default_table: env.get_or("AIRTABLE_TABLE_NAME", "Meetings"),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    records: Vec<AirtableRecord>,
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AirtableRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    fields: Value,
}

/// Lists every record of one Airtable table.
#[derive(Clone)]
pub struct AirtableSource {
    config: AirtableConfig,
    http_client: Arc<dyn HttpClient>,
}

impl AirtableSource {
    pub fn new(config: AirtableConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    fn credentials(&self) -> Result<(&str, &str), SourceError> {
        match (&self.config.api_key, &self.config.base_id) {
            (Some(key), Some(base)) => Ok((key, base)),
            _ => Err(SourceError::missing_config(
                "airtable requires AIRTABLE_API_KEY and AIRTABLE_BASE_ID",
            )),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn fetch(&self, table: &str) -> Result<Vec<RawRecord>, SourceError> {
        let (api_key, base_id) = self.credentials()?;
        let table = match table.trim() {
            "" => self.config.default_table.as_str(),
            name => name,
        };
        let auth = HttpAuth::BearerToken(api_key.to_owned());
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/v0/{}/{}?pageSize={PAGE_SIZE}",
                self.config.base_url.trim_end_matches('/'),
                urlencoding::encode(base_id),
                urlencoding::encode(table)
            );
            if let Some(token) = &offset {
                url.push_str("&offset=");
                url.push_str(&urlencoding::encode(token));
            }

            let response = self
                .http_client
                .execute(HttpRequest::get(url).with_auth(&auth))
                .await
                .map_err(|error| SourceError::transport(PROVIDER, error))?;
            if !response.is_success() {
                return Err(SourceError::from_response(PROVIDER, &response));
            }

            let page: RecordPage = serde_json::from_str(&response.body).map_err(|error| {
                SourceError::invalid_payload(format!("{PROVIDER} returned malformed JSON: {error}"))
            })?;
            let page_len = page.records.len();

            for record in page.records {
                match record.fields {
                    Value::Object(fields) => records.push(AIRTABLE_ALIASES.record_from(&fields)),
                    _ => warn!(record = ?record.id, "skipping airtable record without fields"),
                }
            }

            // Airtable only returns a continuation token while more records remain.
            match page.offset {
                Some(token) if page_len > 0 => offset = Some(token),
                _ => break,
            }
        }

        debug!(table, records = records.len(), "airtable records fetched");
        Ok(records)
    }
}

impl MeetingSource for AirtableSource {
    fn id(&self) -> SourceBackendId {
        SourceBackendId::Airtable
    }

    fn fetch_meetings<'a>(
        &'a self,
        source_identifier: &'a str,
    ) -> SourceFuture<'a, Result<Vec<RawRecord>, SourceError>> {
        Box::pin(self.fetch(source_identifier))
    }
}
