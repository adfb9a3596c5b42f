mod meeting;
mod schedule;
mod tenant;
mod timestamp;

pub use meeting::{
    parse_duration_minutes, ClockTime, DayOfWeek, NormalizedMeeting, RawRecord,
    DEFAULT_DURATION_MINUTES, UNTITLED_MEETING,
};
pub use schedule::{ScheduleMetadata, ScheduledMeeting, SchedulePayload, SCHEDULE_TYPE_FULL_WEEK};
pub use tenant::{parse_tenants, TenantConfig, TenantListError, DEFAULT_ARTIFACT_NAME};
pub use timestamp::UtcDateTime;
