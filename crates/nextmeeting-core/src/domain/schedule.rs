use serde::{Deserialize, Serialize};

use crate::domain::{NormalizedMeeting, UtcDateTime};

/// Schedule type published in every payload: the whole week, ordered by next start.
pub const SCHEDULE_TYPE_FULL_WEEK: &str = "fullWeek";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleMetadata {
    pub schedule_type: String,
    pub generated_at: UtcDateTime,
}

impl ScheduleMetadata {
    pub fn full_week(generated_at: UtcDateTime) -> Self {
        Self {
            schedule_type: String::from(SCHEDULE_TYPE_FULL_WEEK),
            generated_at,
        }
    }
}

/// A normalized meeting together with the next time it starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMeeting {
    #[serde(flatten)]
    pub meeting: NormalizedMeeting,
    pub next_occurrence: UtcDateTime,
}

/// Payload injected into the site template and uploaded as `<site>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulePayload {
    pub metadata: ScheduleMetadata,
    pub meetings: Vec<ScheduledMeeting>,
}

impl SchedulePayload {
    pub fn len(&self) -> usize {
        self.meetings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meetings.is_empty()
    }
}
