mod transform;

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

pub use transform::SubmissionTransformer;

use crate::backend::SourceBackendId;
use crate::config::Env;
use crate::data_source::{MeetingSource, SourceError, SourceFuture};
use crate::domain::RawRecord;
use crate::http_client::{HttpClient, HttpRequest};

const PROVIDER: &str = "jotform";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JotformConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Forms used when the tenant's source identifier is blank.
    pub form_ids: Vec<String>,
    pub page_size: usize,
    /// Raw `JOTFORM_FIELD_MAP`, validated on first fetch.
    pub field_map: Option<String>,
}

impl Default for JotformConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: String::from("https://api.jotform.com"),
            form_ids: Vec::new(),
            page_size: 200,
            field_map: None,
        }
    }
}

impl JotformConfig {
    pub fn from_env(env: &Env) -> Self {
        let page_size = env
            .get("JOTFORM_PAGE_SIZE")
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(200);
        Self {
            api_key: env.get("JOTFORM_API_KEY"),
            base_url: env.get_or("JOTFORM_BASE_URL", "https://api.jotform.com"),
            form_ids: split_form_ids(&env.get("JOTFORM_FORM_IDS").unwrap_or_default()),
            page_size,
            field_map: env.get("JOTFORM_FIELD_MAP"),
        }
    }
}

fn split_form_ids(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .collect()
}

#[derive(Debug, Deserialize)]
struct SubmissionPage {
    #[serde(default)]
    content: Vec<Value>,
    #[serde(default, rename = "resultSet", alias = "resultset")]
    result_set: Option<ResultSet>,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    #[serde(default)]
    offset: Option<u64>,
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FormDetails {
    content: FormContent,
}

#[derive(Debug, Deserialize)]
struct FormContent {
    #[serde(default)]
    title: Option<String>,
}

/// Reads meeting submissions from one or more Jotform forms.
#[derive(Clone)]
pub struct JotformSource {
    config: JotformConfig,
    http_client: Arc<dyn HttpClient>,
}

impl JotformSource {
    pub fn new(config: JotformConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    fn api_key(&self) -> Result<&str, SourceError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::missing_config("jotform requires JOTFORM_API_KEY"))
    }

    fn transformer(&self) -> Result<SubmissionTransformer, SourceError> {
        match &self.config.field_map {
            Some(map) => SubmissionTransformer::with_field_map(map)
                .map_err(|error| SourceError::missing_config(error.to_string())),
            None => Ok(SubmissionTransformer::default()),
        }
    }

    fn url(&self, path: &str, api_key: &str) -> String {
        format!(
            "{}{path}{}apiKey={}",
            self.config.base_url.trim_end_matches('/'),
            if path.contains('?') { '&' } else { '?' },
            urlencoding::encode(api_key)
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, SourceError> {
        let response = self
            .http_client
            .execute(HttpRequest::get(url).with_header("accept", "application/json"))
            .await
            .map_err(|error| SourceError::transport(PROVIDER, error))?;
        if !response.is_success() {
            return Err(SourceError::from_response(PROVIDER, &response));
        }
        serde_json::from_str(&response.body).map_err(|error| {
            SourceError::invalid_payload(format!("{PROVIDER} returned malformed JSON: {error}"))
        })
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn fetch(&self, source_identifier: &str) -> Result<Vec<RawRecord>, SourceError> {
        let api_key = self.api_key()?;
        let transformer = self.transformer()?;

        let mut form_ids = split_form_ids(source_identifier);
        if form_ids.is_empty() {
            form_ids = self.config.form_ids.clone();
        }
        if form_ids.is_empty() {
            return Err(SourceError::missing_config(
                "jotform needs form ids in the source identifier or JOTFORM_FORM_IDS",
            ));
        }

        let mut records = Vec::new();
        for form_id in &form_ids {
            let title = self.form_title(form_id, api_key).await;
            let submissions = self.submissions(form_id, api_key).await?;
            let before = records.len();
            records.extend(
                submissions
                    .iter()
                    .filter_map(|submission| transformer.transform(submission, title.as_deref())),
            );
            debug!(
                form = %form_id,
                submissions = submissions.len(),
                records = records.len() - before,
                "jotform form processed"
            );
        }
        Ok(records)
    }

    /// Best effort; only used as the meeting name fallback.
    async fn form_title(&self, form_id: &str, api_key: &str) -> Option<String> {
        let url = self.url(&format!("/form/{}", urlencoding::encode(form_id)), api_key);
        match self.get_json::<FormDetails>(url).await {
            Ok(details) => details.content.title.filter(|title| !title.trim().is_empty()),
            Err(error) => {
                warn!(form = %form_id, %error, "could not load jotform form title");
                None
            }
        }
    }

    async fn submissions(&self, form_id: &str, api_key: &str) -> Result<Vec<Value>, SourceError> {
        let page_size = self.config.page_size.max(1);
        let mut offset = 0_usize;
        let mut submissions = Vec::new();

        loop {
            let url = self.url(
                &format!(
                    "/form/{}/submissions?offset={offset}&limit={page_size}&orderby=created_at",
                    urlencoding::encode(form_id)
                ),
                api_key,
            );
            let page: SubmissionPage = self.get_json(url).await?;
            let received = page.content.len();
            submissions.extend(page.content);

            if received < page_size {
                break;
            }
            if let Some(ResultSet {
                offset: Some(page_offset),
                count,
                total: Some(total),
            }) = page.result_set
            {
                if page_offset + count.unwrap_or(received as u64) >= total {
                    break;
                }
            }
            offset += received;
        }

        Ok(submissions)
    }
}

impl MeetingSource for JotformSource {
    fn id(&self) -> SourceBackendId {
        SourceBackendId::Jotform
    }

    fn fetch_meetings<'a>(
        &'a self,
        source_identifier: &'a str,
    ) -> SourceFuture<'a, Result<Vec<RawRecord>, SourceError>> {
        Box::pin(self.fetch(source_identifier))
    }

    fn test_connection<'a>(&'a self) -> SourceFuture<'a, bool> {
        Box::pin(async move {
            let Ok(api_key) = self.api_key() else {
                return false;
            };
            let url = self.url("/user", api_key);
            match self.get_json::<Value>(url).await {
                Ok(_) => true,
                Err(error) => {
                    warn!(%error, "jotform connection test failed");
                    false
                }
            }
        })
    }
}
