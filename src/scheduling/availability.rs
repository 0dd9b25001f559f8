//! Validated availability model for a consultant: recurring weekly hours,
//! date-specific exceptions and booking-policy parameters.
//!
//! Construction performs all invariant checks; downstream engine stages
//! assume a well-formed profile and fail fast instead of re-validating.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ValidationError;

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Serde helpers for `HH:MM` wall-clock values (seconds tolerated on input).
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn parse(s: &str) -> Result<NaiveTime, chrono::ParseError> {
        NaiveTime::parse_from_str(s, FORMAT).or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
    }

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match time {
                Some(t) => super::serialize(t, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = Option::<String>::deserialize(deserializer)?;
            value
                .map(|s| super::parse(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

/// Working hours for one weekday, with an optional midday break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    #[serde(default, with = "hhmm::option", skip_serializing_if = "Option::is_none")]
    pub break_start: Option<NaiveTime>,
    #[serde(default, with = "hhmm::option", skip_serializing_if = "Option::is_none")]
    pub break_end: Option<NaiveTime>,
}

impl DaySchedule {
    /// The break interval, when both endpoints are present.
    pub fn break_range(&self) -> Option<(NaiveTime, NaiveTime)> {
        match (self.break_start, self.break_end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    fn validate(&self, day: &str) -> Result<(), ValidationError> {
        if self.start >= self.end {
            return Err(ValidationError::new(format!(
                "{day}: start must be before end"
            )));
        }
        match (self.break_start, self.break_end) {
            (None, None) => {}
            (Some(break_start), Some(break_end)) => {
                if break_start >= break_end {
                    return Err(ValidationError::new(format!(
                        "{day}: break start must be before break end"
                    )));
                }
                if break_start < self.start || break_end > self.end {
                    return Err(ValidationError::new(format!(
                        "{day}: break must fall within working hours"
                    )));
                }
            }
            _ => {
                return Err(ValidationError::new(format!(
                    "{day}: break start and break end must be set together"
                )));
            }
        }
        Ok(())
    }
}

/// Recurring weekly hours, indexed by day-of-week with 0 = Sunday. A `None`
/// entry means the consultant does not work that day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub days: [Option<DaySchedule>; 7],
}

impl WeeklySchedule {
    pub fn day(&self, weekday: Weekday) -> Option<&DaySchedule> {
        self.days[weekday.num_days_from_sunday() as usize].as_ref()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        for (index, entry) in self.days.iter().enumerate() {
            if let Some(schedule) = entry {
                schedule.validate(DAY_NAMES[index])?;
            }
        }
        Ok(())
    }
}

/// Custom opening hours attached to an exception day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

/// Raw date-specific override as stored and exchanged with clients. An
/// exception replaces the weekly entry for its date entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityException {
    pub date: NaiveDate,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_hours: Option<HourRange>,
}

/// Validated form of an exception: either the day is closed outright, or it
/// is open with optionally overridden hours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayOverride {
    Closed,
    Open { custom_hours: Option<HourRange> },
}

/// A consultant's complete, validated availability description.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityProfile {
    pub consultant_id: Uuid,
    pub weekly_schedule: WeeklySchedule,
    exceptions: BTreeMap<NaiveDate, DayOverride>,
    pub timezone: Tz,
    pub buffer_minutes: u32,
    pub max_advance_days: u32,
    pub min_notice_hours: u32,
}

impl AvailabilityProfile {
    /// Validate and assemble a profile from its raw parts.
    ///
    /// Duplicate exception dates resolve last-wins, matching the upsert
    /// semantics of the storage layer.
    pub fn new(
        consultant_id: Uuid,
        weekly_schedule: WeeklySchedule,
        exceptions: Vec<AvailabilityException>,
        timezone: &str,
        buffer_minutes: i32,
        max_advance_days: i32,
        min_notice_hours: i32,
    ) -> Result<Self, ValidationError> {
        weekly_schedule.validate()?;

        let timezone: Tz = timezone
            .parse()
            .map_err(|_| ValidationError::new(format!("unknown timezone: {timezone}")))?;

        let buffer_minutes = non_negative(buffer_minutes, "buffer_between_appointments")?;
        let max_advance_days = non_negative(max_advance_days, "max_advance_booking")?;
        let min_notice_hours = non_negative(min_notice_hours, "min_notice_booking")?;

        let mut folded = BTreeMap::new();
        for exception in exceptions {
            let overridden = if exception.available {
                if let Some(hours) = &exception.custom_hours {
                    if hours.start >= hours.end {
                        return Err(ValidationError::new(format!(
                            "exception {}: custom hours start must be before end",
                            exception.date
                        )));
                    }
                }
                DayOverride::Open {
                    custom_hours: exception.custom_hours,
                }
            } else {
                DayOverride::Closed
            };
            folded.insert(exception.date, overridden);
        }

        Ok(AvailabilityProfile {
            consultant_id,
            weekly_schedule,
            exceptions: folded,
            timezone,
            buffer_minutes,
            max_advance_days,
            min_notice_hours,
        })
    }

    /// Exact-date exception lookup; no range exceptions exist.
    pub fn exception_for(&self, date: NaiveDate) -> Option<&DayOverride> {
        self.exceptions.get(&date)
    }
}

fn non_negative(value: i32, field: &str) -> Result<u32, ValidationError> {
    u32::try_from(value).map_err(|_| ValidationError::new(format!("{field} must not be negative")))
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rejects_inverted_hours() {
        let mut weekly = WeeklySchedule::default();
        weekly.days[1] = Some(workday((17, 0), (9, 0)));
        let err = AvailabilityProfile::new(Uuid::new_v4(), weekly, vec![], "UTC", 0, 30, 0)
            .unwrap_err();
        assert!(err.to_string().contains("Monday"));
    }

    #[test]
    fn rejects_break_outside_working_hours() {
        let mut weekly = WeeklySchedule::default();
        weekly.days[2] = Some(DaySchedule {
            start: hm(9, 0),
            end: hm(17, 0),
            break_start: Some(hm(8, 0)),
            break_end: Some(hm(9, 30)),
        });
        assert!(AvailabilityProfile::new(Uuid::new_v4(), weekly, vec![], "UTC", 0, 30, 0).is_err());
    }

    #[test]
    fn rejects_half_specified_break() {
        let mut weekly = WeeklySchedule::default();
        weekly.days[3] = Some(DaySchedule {
            start: hm(9, 0),
            end: hm(17, 0),
            break_start: Some(hm(12, 0)),
            break_end: None,
        });
        assert!(AvailabilityProfile::new(Uuid::new_v4(), weekly, vec![], "UTC", 0, 30, 0).is_err());
    }

    #[test]
    fn rejects_unknown_timezone() {
        let weekly = every_day(workday((9, 0), (17, 0)));
        let err = AvailabilityProfile::new(Uuid::new_v4(), weekly, vec![], "Mars/Olympus", 0, 30, 0)
            .unwrap_err();
        assert!(err.to_string().contains("timezone"));
    }

    #[test]
    fn rejects_negative_policy_values() {
        let weekly = every_day(workday((9, 0), (17, 0)));
        assert!(
            AvailabilityProfile::new(Uuid::new_v4(), weekly, vec![], "UTC", -5, 30, 0).is_err()
        );
    }

    #[test]
    fn duplicate_exception_dates_resolve_last_wins() {
        let day = date(2025, 7, 4);
        let profile = profile_with(
            every_day(workday((9, 0), (17, 0))),
            vec![
                AvailabilityException {
                    date: day,
                    available: false,
                    custom_hours: None,
                },
                AvailabilityException {
                    date: day,
                    available: true,
                    custom_hours: Some(HourRange {
                        start: hm(10, 0),
                        end: hm(12, 0),
                    }),
                },
            ],
            "UTC",
        );

        match profile.exception_for(day) {
            Some(DayOverride::Open { custom_hours }) => {
                assert_eq!(custom_hours.as_ref().unwrap().start, hm(10, 0));
            }
            other => panic!("expected last-written exception, got {other:?}"),
        }
    }

    #[test]
    fn day_schedule_accepts_hhmm_and_hhmmss_wire_forms() {
        let short: DaySchedule = serde_json::from_str(r#"{"start":"09:00","end":"17:00"}"#).unwrap();
        let long: DaySchedule =
            serde_json::from_str(r#"{"start":"09:00:00","end":"17:00:00"}"#).unwrap();
        assert_eq!(short, long);
        assert_eq!(serde_json::to_string(&short).unwrap(), r#"{"start":"09:00","end":"17:00"}"#);
    }
}
