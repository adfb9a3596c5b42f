//! Jotform submission → [`RawRecord`] mapping.
//!
//! Answers are matched on their field name, label text or question id, all
//! compared as lowercase alphanumerics, so `Meeting Day`, `meeting_day` and
//! `meetingDay` are the same identifier.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};
use tracing::warn;

use crate::domain::RawRecord;

/// Canonical meeting fields a submission can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MeetingField {
    DayOfWeek,
    StartTime,
    MeetingName,
    MeetingId,
    Password,
    JoinUrl,
    ContactInfo,
    Notes,
    DurationMinutes,
}

impl MeetingField {
    pub const ALL: [Self; 9] = [
        Self::DayOfWeek,
        Self::StartTime,
        Self::MeetingName,
        Self::MeetingId,
        Self::Password,
        Self::JoinUrl,
        Self::ContactInfo,
        Self::Notes,
        Self::DurationMinutes,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DayOfWeek => "dayOfWeek",
            Self::StartTime => "startTime",
            Self::MeetingName => "meetingName",
            Self::MeetingId => "meetingId",
            Self::Password => "password",
            Self::JoinUrl => "joinUrl",
            Self::ContactInfo => "contactInfo",
            Self::Notes => "notes",
            Self::DurationMinutes => "durationMinutes",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        let wanted = normalize_identifier(name);
        Self::ALL
            .into_iter()
            .find(|field| normalize_identifier(field.as_str()) == wanted)
    }

    const fn default_aliases(self) -> &'static [&'static str] {
        match self {
            Self::DayOfWeek => &["dayofweek", "day_of_week", "meetingday", "meeting_day", "day"],
            Self::StartTime => &["starttime", "start_time", "meetingtime", "meeting_time", "time"],
            Self::MeetingName => &[
                "meetingname",
                "meeting_name",
                "title",
                "meetingtitle",
                "meeting_title",
                "groupname",
            ],
            Self::MeetingId => &["meetingid", "meeting_id", "zoomid", "zoom_id", "connectionid"],
            Self::Password => &["password", "passcode", "meetingpassword", "meeting_password"],
            Self::JoinUrl => &[
                "joinurl",
                "join_url",
                "meetinglink",
                "meeting_link",
                "zoomlink",
                "zoom_link",
                "url",
            ],
            Self::ContactInfo => &[
                "contact",
                "contactinfo",
                "contact_info",
                "contactemail",
                "contact_email",
            ],
            Self::Notes => &["notes", "description", "details", "extra", "comments"],
            Self::DurationMinutes => &[
                "duration",
                "durationminutes",
                "duration_minutes",
                "meetinglength",
                "meeting_length",
            ],
        }
    }
}

/// Error raised by an invalid `JOTFORM_FIELD_MAP`.
#[derive(Debug, thiserror::Error)]
pub enum FieldMapError {
    #[error("JOTFORM_FIELD_MAP must be a JSON object of field name to alias list: {0}")]
    Json(#[from] serde_json::Error),
    #[error("JOTFORM_FIELD_MAP names unknown field '{0}'")]
    UnknownField(String),
}

/// Alias-driven submission transformer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionTransformer {
    aliases: BTreeMap<MeetingField, Vec<String>>,
}

impl Default for SubmissionTransformer {
    fn default() -> Self {
        let aliases = MeetingField::ALL
            .into_iter()
            .map(|field| {
                let mut list = Vec::new();
                for alias in field.default_aliases() {
                    push_unique(&mut list, normalize_identifier(alias));
                }
                (field, list)
            })
            .collect();
        Self { aliases }
    }
}

impl SubmissionTransformer {
    /// Default aliases with the entries of `field_map` tried first.
    ///
    /// `field_map` is a JSON object such as `{"dayOfWeek": ["Which day?"]}`.
    pub fn with_field_map(field_map: &str) -> Result<Self, FieldMapError> {
        let overrides: HashMap<String, Vec<String>> = serde_json::from_str(field_map)?;
        let mut transformer = Self::default();

        for (name, extra) in overrides {
            let field =
                MeetingField::from_name(&name).ok_or(FieldMapError::UnknownField(name))?;
            let entry = transformer.aliases.entry(field).or_default();
            let mut merged = Vec::new();
            for alias in extra.iter().map(|alias| normalize_identifier(alias)) {
                push_unique(&mut merged, alias);
            }
            for alias in entry.drain(..) {
                push_unique(&mut merged, alias);
            }
            *entry = merged;
        }

        Ok(transformer)
    }

    pub fn aliases(&self, field: MeetingField) -> &[String] {
        self.aliases.get(&field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Maps one submission; `None` when day or start time cannot be found.
    pub fn transform(&self, submission: &Value, form_title: Option<&str>) -> Option<RawRecord> {
        let submission_id = submission.get("id").and_then(Value::as_str).unwrap_or("?");
        let answers = answer_lookup(submission.get("answers"));
        let lookup = |field: MeetingField| {
            self.aliases(field)
                .iter()
                .find_map(|alias| answers.get(alias).cloned())
        };

        let Some(day_of_week) = lookup(MeetingField::DayOfWeek) else {
            warn!(submission = submission_id, "skipping jotform submission without a meeting day");
            return None;
        };
        let Some(start_time) = lookup(MeetingField::StartTime) else {
            warn!(submission = submission_id, "skipping jotform submission without a start time");
            return None;
        };

        let meeting_name = lookup(MeetingField::MeetingName)
            .or_else(|| non_empty(submission.get("title").and_then(Value::as_str)))
            .or_else(|| non_empty(form_title));
        let contact_info = lookup(MeetingField::ContactInfo)
            .or_else(|| non_empty(submission.get("sender_email").and_then(Value::as_str)));

        Some(RawRecord {
            day_of_week: Some(day_of_week),
            start_time: Some(start_time),
            meeting_name,
            meeting_id: lookup(MeetingField::MeetingId),
            password: lookup(MeetingField::Password),
            join_url: lookup(MeetingField::JoinUrl),
            contact_info,
            notes: lookup(MeetingField::Notes),
            duration_minutes: lookup(MeetingField::DurationMinutes),
        })
    }
}

fn push_unique(list: &mut Vec<String>, alias: String) {
    if !alias.is_empty() && !list.contains(&alias) {
        list.push(alias);
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Lowercase ASCII alphanumerics only.
pub(crate) fn normalize_identifier(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Normalized identifier → answer text, keyed by name, label text and question id.
fn answer_lookup(answers: Option<&Value>) -> HashMap<String, String> {
    let mut lookup = HashMap::new();
    let Some(Value::Object(answers)) = answers else {
        return lookup;
    };

    for (qid, answer) in answers {
        let Value::Object(answer) = answer else {
            continue;
        };
        let Some(text) = answer_text(answer) else {
            continue;
        };
        let identifiers = [
            answer.get("name").and_then(Value::as_str),
            answer.get("text").and_then(Value::as_str),
            Some(qid.as_str()),
        ];
        for identifier in identifiers.into_iter().flatten() {
            let key = normalize_identifier(identifier);
            if !key.is_empty() {
                lookup.entry(key).or_insert_with(|| text.clone());
            }
        }
    }
    lookup
}

/// `prettyFormat`, then scalar answers, arrays joined with `", "`, `{full}`
/// objects, and finally object values joined with spaces.
fn answer_text(answer: &Map<String, Value>) -> Option<String> {
    if let Some(pretty) = non_empty(answer.get("prettyFormat").and_then(Value::as_str)) {
        return Some(pretty);
    }

    let text = match answer.get("answer")? {
        Value::String(text) => text.trim().to_owned(),
        Value::Number(number) => number.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(object) => match object.get("full").and_then(scalar_text) {
            Some(full) => full,
            None => object
                .values()
                .filter_map(scalar_text)
                .collect::<Vec<_>>()
                .join(" "),
        },
        Value::Bool(_) | Value::Null => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => non_empty(Some(text)),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
