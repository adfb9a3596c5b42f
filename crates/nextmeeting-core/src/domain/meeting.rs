use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::Weekday;

use crate::ValidationError;

/// Placeholder used when a provider record carries no meeting name.
pub const UNTITLED_MEETING: &str = "<Untitled Meeting>";

/// Duration applied when a record has no usable duration.
pub const DEFAULT_DURATION_MINUTES: u32 = 60;

/// Weekday name as published in the schedule (`Monday` ... `Sunday`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DayOfWeek(Weekday);

impl DayOfWeek {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let lowered = input.trim().to_ascii_lowercase();
        let weekday = match lowered.as_str() {
            "monday" | "mon" => Weekday::Monday,
            "tuesday" | "tue" | "tues" => Weekday::Tuesday,
            "wednesday" | "wed" => Weekday::Wednesday,
            "thursday" | "thu" | "thur" | "thurs" => Weekday::Thursday,
            "friday" | "fri" => Weekday::Friday,
            "saturday" | "sat" => Weekday::Saturday,
            "sunday" | "sun" => Weekday::Sunday,
            _ => {
                return Err(ValidationError::InvalidWeekday {
                    value: input.to_owned(),
                })
            }
        };
        Ok(Self(weekday))
    }

    pub const fn weekday(self) -> Weekday {
        self.0
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(value: Weekday) -> Self {
        Self(value)
    }
}

impl Display for DayOfWeek {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for DayOfWeek {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for DayOfWeek {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayOfWeek {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

/// Wall-clock start time of a meeting, minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ValidationError> {
        if hour > 23 || minute > 59 {
            return Err(ValidationError::InvalidClockTime {
                value: format!("{hour:02}:{minute:02}"),
            });
        }
        Ok(Self { hour, minute })
    }

    /// Parses `19:00`, `7:00 PM`, `7pm`, `7:00:00 p.m.` and similar spellings.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidClockTime {
            value: input.to_owned(),
        };

        let lowered = input.trim().to_ascii_lowercase();
        let (clock, meridiem) = split_meridiem(&lowered);

        let mut parts = clock.trim().split(':');
        let hour = parse_component(parts.next()).ok_or_else(invalid)?;
        let minute = match parts.next() {
            Some(part) => parse_component(Some(part)).ok_or_else(invalid)?,
            None => 0,
        };
        if let Some(seconds) = parts.next() {
            parse_component(Some(seconds))
                .filter(|value| *value < 60)
                .ok_or_else(invalid)?;
        }
        if parts.next().is_some() || minute > 59 {
            return Err(invalid());
        }

        let hour = match meridiem {
            Some(Meridiem::Am) if (1..=12).contains(&hour) => hour % 12,
            Some(Meridiem::Pm) if (1..=12).contains(&hour) => hour % 12 + 12,
            Some(_) => return Err(invalid()),
            None if hour <= 23 => hour,
            None => return Err(invalid()),
        };

        Ok(Self { hour, minute })
    }

    pub const fn hour(self) -> u8 {
        self.hour
    }

    pub const fn minute(self) -> u8 {
        self.minute
    }
}

#[derive(Debug, Clone, Copy)]
enum Meridiem {
    Am,
    Pm,
}

fn split_meridiem(value: &str) -> (&str, Option<Meridiem>) {
    for (suffix, meridiem) in [
        ("a.m.", Meridiem::Am),
        ("p.m.", Meridiem::Pm),
        ("am", Meridiem::Am),
        ("pm", Meridiem::Pm),
    ] {
        if let Some(clock) = value.strip_suffix(suffix) {
            return (clock, Some(meridiem));
        }
    }
    (value, None)
}

fn parse_component(part: Option<&str>) -> Option<u8> {
    let part = part?.trim();
    if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Provider record after the adapter's own alias mapping, before normalization.
///
/// Every field is optional: adapters forward what the provider returned and
/// the normalizer decides what survives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub day_of_week: Option<String>,
    pub start_time: Option<String>,
    pub meeting_name: Option<String>,
    pub meeting_id: Option<String>,
    pub password: Option<String>,
    pub join_url: Option<String>,
    pub contact_info: Option<String>,
    pub notes: Option<String>,
    pub duration_minutes: Option<String>,
}

/// Canonical meeting shape published to every site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMeeting {
    pub day_of_week: DayOfWeek,
    pub start_time: String,
    pub meeting_name: String,
    pub duration_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Parses a duration given as an integer or numeric string.
///
/// Anything else, including zero and negative values, yields
/// [`DEFAULT_DURATION_MINUTES`].
pub fn parse_duration_minutes(value: Option<&str>) -> u32 {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return DEFAULT_DURATION_MINUTES;
    };

    if let Ok(minutes) = value.parse::<u32>() {
        return if minutes > 0 {
            minutes
        } else {
            DEFAULT_DURATION_MINUTES
        };
    }

    match value.parse::<f64>() {
        Ok(minutes) if minutes.is_finite() && minutes >= 1.0 && minutes <= f64::from(u32::MAX) => {
            minutes.trunc() as u32
        }
        _ => DEFAULT_DURATION_MINUTES,
    }
}
