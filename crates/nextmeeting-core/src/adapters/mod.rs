//! Meeting source adapters.
//!
//! | Backend | Adapter | Source identifier |
//! |---------|---------|-------------------|
//! | `google-sheets` | [`GoogleSheetsSource`] | spreadsheet id |
//! | `airtable` | [`AirtableSource`] | table name (blank = `AIRTABLE_TABLE_NAME`) |
//! | `rest-api` | [`RestApiSource`] | absolute URL or path under `API_BASE_URL` |
//! | `database` | [`DatabaseSource`] | table name |
//! | `json-file` | [`JsonFileSource`] | file path |
//! | `jotform` | [`JotformSource`] | comma-separated form ids |

mod airtable;
mod database;
mod google_sheets;
mod jotform;
mod json_file;
mod rest_api;

use std::sync::Arc;

pub use airtable::{AirtableConfig, AirtableSource};
pub use database::{DatabaseConfig, DatabaseKind, DatabaseSource};
pub use google_sheets::{GoogleSheetsConfig, GoogleSheetsSource};
pub use jotform::{JotformConfig, JotformSource, SubmissionTransformer};
pub use json_file::{JsonFileConfig, JsonFileSource};
pub use rest_api::{RestApiConfig, RestApiSource};

use serde_json::{Map, Value};

use crate::backend::SourceBackendId;
use crate::config::Env;
use crate::data_source::{MeetingSource, SourceError};
use crate::domain::RawRecord;
use crate::http_client::HttpClient;
use crate::ConfigError;

/// Builds the source adapter for `id`, reading its variables from `env`.
///
/// Missing credentials are not an error here: adapters report them when a
/// fetch is attempted, before any network call. Malformed tuning variables
/// are.
pub fn source_adapter_from_env(
    id: SourceBackendId,
    env: &Env,
    http_client: Arc<dyn HttpClient>,
) -> Result<Arc<dyn MeetingSource>, ConfigError> {
    let adapter: Arc<dyn MeetingSource> = match id {
        SourceBackendId::GoogleSheets => Arc::new(GoogleSheetsSource::new(
            GoogleSheetsConfig::from_env(env)?,
            http_client,
        )),
        SourceBackendId::RestApi => {
            Arc::new(RestApiSource::new(RestApiConfig::from_env(env), http_client))
        }
        SourceBackendId::Database => Arc::new(DatabaseSource::new(DatabaseConfig::from_env(env))),
        SourceBackendId::JsonFile => Arc::new(JsonFileSource::new(JsonFileConfig::from_env(env))),
        SourceBackendId::Airtable => Arc::new(AirtableSource::new(
            AirtableConfig::from_env(env),
            http_client,
        )),
        SourceBackendId::Jotform => {
            Arc::new(JotformSource::new(JotformConfig::from_env(env), http_client))
        }
    };
    Ok(adapter)
}

/// Alias lists for the canonical fields, in lookup order.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldAliases {
    pub day_of_week: &'static [&'static str],
    pub start_time: &'static [&'static str],
    pub meeting_name: &'static [&'static str],
    pub meeting_id: &'static [&'static str],
    pub password: &'static [&'static str],
    pub join_url: &'static [&'static str],
    pub contact_info: &'static [&'static str],
    pub notes: &'static [&'static str],
    pub duration_minutes: &'static [&'static str],
}

impl FieldAliases {
    pub(crate) fn record_from(&self, fields: &Map<String, Value>) -> RawRecord {
        RawRecord {
            day_of_week: field_text(fields, self.day_of_week),
            start_time: field_text(fields, self.start_time),
            meeting_name: field_text(fields, self.meeting_name),
            meeting_id: field_text(fields, self.meeting_id),
            password: field_text(fields, self.password),
            join_url: field_text(fields, self.join_url),
            contact_info: field_text(fields, self.contact_info),
            notes: field_text(fields, self.notes),
            duration_minutes: field_text(fields, self.duration_minutes),
        }
    }
}

/// First non-empty value among `aliases`, rendered as text.
pub(crate) fn field_text(fields: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|alias| fields.get(*alias))
        .find_map(value_text)
}

/// Scalars become text; arrays of scalars are joined with `", "`.
pub(crate) fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_owned(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Meeting list under `meetings`, `data`, or the document itself.
pub(crate) fn meeting_list(document: Value, provider: &str) -> Result<Vec<Value>, SourceError> {
    let list = match document {
        Value::Array(items) => return Ok(items),
        Value::Object(mut object) => object
            .remove("meetings")
            .or_else(|| object.remove("data")),
        _ => None,
    };

    match list {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(SourceError::invalid_payload(format!(
            "{provider} response must contain an array of meetings"
        ))),
    }
}

/// Maps each JSON object to a record, skipping anything else with a warning.
pub(crate) fn records_from_objects(
    items: Vec<Value>,
    aliases: &FieldAliases,
    provider: &str,
) -> Vec<RawRecord> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match item {
            Value::Object(fields) => Some(aliases.record_from(&fields)),
            other => {
                tracing::warn!(provider, index, kind = json_kind(&other), "skipping malformed meeting record");
                None
            }
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// camelCase and snake_case spellings used by generic JSON providers.
pub(crate) const GENERIC_JSON_ALIASES: FieldAliases = FieldAliases {
    day_of_week: &["dayOfWeek", "day_of_week", "day"],
    start_time: &["startTime", "start_time", "time"],
    meeting_name: &["meetingName", "meeting_name", "name", "title"],
    meeting_id: &["meetingId", "meeting_id"],
    password: &["password", "passcode"],
    join_url: &["joinUrl", "join_url", "url"],
    contact_info: &["contactInfo", "contact_info", "contact"],
    notes: &["notes", "description"],
    duration_minutes: &["durationMinutes", "duration_minutes", "duration"],
};

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::http_client::{HttpClient, HttpError, HttpFuture, HttpRequest, HttpResponse};

    /// Replays scripted responses in order and records every request.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingHttpClient {
        responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingHttpClient {
        pub(crate) fn with_responses(
            responses: impl IntoIterator<Item = Result<HttpResponse, HttpError>>,
        ) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn json(bodies: impl IntoIterator<Item = serde_json::Value>) -> Self {
            Self::with_responses(
                bodies
                    .into_iter()
                    .map(|body| Ok(HttpResponse::ok_json(body.to_string()))),
            )
        }

        pub(crate) fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .clone()
        }
    }

    impl HttpClient for RecordingHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> HttpFuture<'a> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self
                .responses
                .lock()
                .expect("response queue should not be poisoned")
                .pop_front()
                .unwrap_or_else(|| Err(HttpError::permanent("no scripted response left")));
            Box::pin(async move { response })
        }
    }
}
