//! Raw records → ordered schedule payload.
//!
//! Records without a usable day or start time are dropped. Defaults fill the
//! name and duration. Each surviving meeting gets the next instant (at or
//! after "now") on which it starts, interpreted in a fixed UTC offset, and
//! the list is stably sorted by that instant.

use time::{Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use tracing::{debug, warn};

use crate::domain::{
    parse_duration_minutes, ClockTime, DayOfWeek, NormalizedMeeting, RawRecord,
    ScheduleMetadata, ScheduledMeeting, SchedulePayload, UtcDateTime, UNTITLED_MEETING,
};
use crate::ValidationError;

/// Why a raw record did not make it into the schedule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DropReason {
    #[error("record has no day of week")]
    MissingDay,
    #[error("record has no start time")]
    MissingStartTime,
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Maps one raw record to a normalized meeting plus its parsed start time.
pub fn normalize_record(raw: RawRecord) -> Result<(NormalizedMeeting, ClockTime), DropReason> {
    let day = raw.day_of_week.as_deref().ok_or(DropReason::MissingDay)?;
    let start_time = raw.start_time.ok_or(DropReason::MissingStartTime)?;
    let day_of_week = DayOfWeek::parse(day)?;
    let clock = ClockTime::parse(&start_time)?;

    let meeting = NormalizedMeeting {
        day_of_week,
        start_time: start_time.trim().to_owned(),
        meeting_name: raw
            .meeting_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| String::from(UNTITLED_MEETING)),
        duration_minutes: parse_duration_minutes(raw.duration_minutes.as_deref()),
        meeting_id: raw.meeting_id,
        password: raw.password,
        join_url: raw.join_url,
        contact_info: raw.contact_info,
        notes: raw.notes,
    };
    Ok((meeting, clock))
}

/// Next instant `>= now` falling on `day` at `clock` in `offset`, as UTC.
pub fn next_occurrence(
    day: DayOfWeek,
    clock: ClockTime,
    now: OffsetDateTime,
    offset: UtcOffset,
) -> UtcDateTime {
    let local_now = now.to_offset(offset);
    let days_ahead = (i64::from(day.weekday().number_days_from_monday())
        - i64::from(local_now.weekday().number_days_from_monday()))
    .rem_euclid(7);

    let start = Time::MIDNIGHT
        + Duration::minutes(i64::from(clock.hour()) * 60 + i64::from(clock.minute()));
    let date = local_now.date() + Duration::days(days_ahead);
    let mut candidate = PrimitiveDateTime::new(date, start).assume_offset(offset);
    if candidate < local_now {
        candidate += Duration::weeks(1);
    }
    UtcDateTime::from_instant(candidate)
}

/// Builds schedule payloads in a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    offset: UtcOffset,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(UtcOffset::UTC)
    }
}

impl Normalizer {
    pub const fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    pub const fn offset(&self) -> UtcOffset {
        self.offset
    }

    /// Normalizes, drops unusable records, and orders by next occurrence.
    ///
    /// Pure given `now`: the same records and instant always produce the same payload.
    pub fn build_schedule(&self, records: Vec<RawRecord>, now: UtcDateTime) -> SchedulePayload {
        let received = records.len();
        let mut meetings: Vec<ScheduledMeeting> = records
            .into_iter()
            .enumerate()
            .filter_map(|(index, raw)| match normalize_record(raw) {
                Ok((meeting, clock)) => Some(ScheduledMeeting {
                    next_occurrence: next_occurrence(
                        meeting.day_of_week,
                        clock,
                        now.into_inner(),
                        self.offset,
                    ),
                    meeting,
                }),
                Err(reason) => {
                    warn!(index, %reason, "dropping meeting record");
                    None
                }
            })
            .collect();

        meetings.sort_by_key(|meeting| meeting.next_occurrence);
        debug!(received, kept = meetings.len(), "schedule normalized");

        SchedulePayload {
            metadata: ScheduleMetadata::full_week(now),
            meetings,
        }
    }
}
