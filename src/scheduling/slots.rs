//! Bookable-slot generation for a single consultant and date.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use serde::Serialize;

use super::availability::{AvailabilityProfile, DayOverride};
use super::ValidationError;

/// A fixed-length candidate appointment interval. Derived on every query,
/// never persisted; `available` is only written during generation and
/// conflict resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub available: bool,
}

struct EffectiveDay {
    start: NaiveTime,
    end: NaiveTime,
    break_range: Option<(NaiveTime, NaiveTime)>,
}

/// Produce the candidate slots for `date`, walking the effective working
/// hours in `slot_minutes` increments.
///
/// Exceptions override the weekly entry: a closed exception short-circuits
/// to no slots even when weekly hours exist; custom hours replace start/end
/// while any weekly break is kept. Slots whose start falls inside the break
/// are dropped from the output entirely, and a final partial increment is
/// never emitted. All slots come back `available = true`; conflicts are the
/// resolver's job.
pub fn generate_slots(
    profile: &AvailabilityProfile,
    date: NaiveDate,
    slot_minutes: u32,
) -> Result<Vec<TimeSlot>, ValidationError> {
    if slot_minutes == 0 {
        return Err(ValidationError::new("slot length must be at least 1 minute"));
    }

    let Some(day) = effective_day(profile, date) else {
        return Ok(Vec::new());
    };

    let start_minute = minute_of_day(day.start);
    let end_minute = minute_of_day(day.end);
    let break_minutes = day
        .break_range
        .map(|(start, end)| (minute_of_day(start), minute_of_day(end)));

    let mut slots = Vec::new();
    let mut minute = start_minute;
    while minute + slot_minutes <= end_minute {
        let slot_start_minute = minute;
        minute += slot_minutes;

        // Half-open break interval; the slot is excluded when its start
        // falls inside it.
        if let Some((break_start, break_end)) = break_minutes {
            if slot_start_minute >= break_start && slot_start_minute < break_end {
                continue;
            }
        }

        let local_start = time_at_minute(slot_start_minute);
        // A wall time swallowed by a DST gap yields no slot for this
        // increment; ambiguous walls resolve to the earlier instant.
        let Some(start) = resolve_local(date, local_start, profile.timezone) else {
            continue;
        };

        slots.push(TimeSlot {
            start,
            end: start + Duration::minutes(i64::from(slot_minutes)),
            available: true,
        });
    }

    Ok(slots)
}

/// UTC bounds of the consultant-local calendar day, for fetching the
/// appointments that may conflict with slots on `date`.
pub fn day_bounds_utc(timezone: Tz, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        local_midnight(timezone, date),
        local_midnight(timezone, date + Duration::days(1)),
    )
}

fn local_midnight(timezone: Tz, date: NaiveDate) -> DateTime<Utc> {
    // Midnight can fall in a DST gap in a handful of zones; probe forward
    // until the wall time exists.
    for minutes in [0i64, 30, 60, 120, 180] {
        let naive = date.and_time(NaiveTime::MIN) + Duration::minutes(minutes);
        if let Some(resolved) = match timezone.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Some(dt),
            LocalResult::Ambiguous(earlier, _) => Some(earlier),
            LocalResult::None => None,
        } {
            return resolved.with_timezone(&Utc);
        }
    }
    // Unreachable for real zones; fall back to the UTC reading.
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn effective_day(profile: &AvailabilityProfile, date: NaiveDate) -> Option<EffectiveDay> {
    let weekly = profile.weekly_schedule.day(date.weekday());

    match profile.exception_for(date) {
        Some(DayOverride::Closed) => None,
        Some(DayOverride::Open { custom_hours }) => match (custom_hours, weekly) {
            (Some(hours), weekly) => Some(EffectiveDay {
                start: hours.start,
                end: hours.end,
                break_range: weekly.and_then(|day| day.break_range()),
            }),
            (None, Some(day)) => Some(EffectiveDay {
                start: day.start,
                end: day.end,
                break_range: day.break_range(),
            }),
            (None, None) => None,
        },
        None => weekly.map(|day| EffectiveDay {
            start: day.start,
            end: day.end,
            break_range: day.break_range(),
        }),
    }
}

fn minute_of_day(time: NaiveTime) -> u32 {
    time.num_seconds_from_midnight() / 60
}

fn time_at_minute(minute: u32) -> NaiveTime {
    NaiveTime::from_num_seconds_from_midnight_opt(minute * 60, 0)
        .unwrap_or(NaiveTime::MIN)
}

fn resolve_local(date: NaiveDate, time: NaiveTime, timezone: Tz) -> Option<DateTime<Utc>> {
    match timezone.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _) => Some(earlier.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::availability::test_support::*;
    use crate::scheduling::availability::{
        AvailabilityException, DaySchedule, HourRange, WeeklySchedule,
    };
    use chrono::TimeZone;
    use test_case::test_case;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn full_day_yields_sixteen_half_hour_slots() {
        let profile = profile_9_to_5(|_| {});
        let slots = generate_slots(&profile, date(2025, 6, 2), 30).unwrap();

        assert_eq!(slots.len(), 16);
        assert!(slots.iter().all(|slot| slot.available));
        assert_eq!(slots[0].start, utc(2025, 6, 2, 9, 0));
        assert_eq!(slots[0].end, utc(2025, 6, 2, 9, 30));
        assert_eq!(slots[15].start, utc(2025, 6, 2, 16, 30));
        assert_eq!(slots[15].end, utc(2025, 6, 2, 17, 0));
    }

    #[test]
    fn break_slots_are_excluded_entirely() {
        let schedule = DaySchedule {
            start: hm(9, 0),
            end: hm(17, 0),
            break_start: Some(hm(12, 0)),
            break_end: Some(hm(13, 0)),
        };
        let profile = profile_with(every_day(schedule), vec![], "UTC");
        let slots = generate_slots(&profile, date(2025, 6, 2), 30).unwrap();

        assert_eq!(slots.len(), 14);
        assert!(slots
            .iter()
            .all(|slot| slot.start.time() < hm(12, 0) || slot.start.time() >= hm(13, 0)));
    }

    #[test]
    fn closed_exception_short_circuits_weekly_hours() {
        let day = date(2025, 6, 2);
        let profile = profile_with(
            every_day(workday((9, 0), (17, 0))),
            vec![AvailabilityException {
                date: day,
                available: false,
                custom_hours: None,
            }],
            "UTC",
        );
        assert!(generate_slots(&profile, day, 30).unwrap().is_empty());
    }

    #[test]
    fn custom_hours_exception_overrides_start_and_end() {
        let day = date(2025, 6, 2);
        let profile = profile_with(
            every_day(workday((9, 0), (17, 0))),
            vec![AvailabilityException {
                date: day,
                available: true,
                custom_hours: Some(HourRange {
                    start: hm(10, 0),
                    end: hm(12, 0),
                }),
            }],
            "UTC",
        );
        let slots = generate_slots(&profile, day, 30).unwrap();

        assert_eq!(slots.len(), 4);
        assert_eq!(slots[0].start, utc(2025, 6, 2, 10, 0));
        assert_eq!(slots[3].end, utc(2025, 6, 2, 12, 0));
    }

    #[test]
    fn custom_hours_keep_the_weekly_break() {
        let day = date(2025, 6, 2);
        let schedule = DaySchedule {
            start: hm(9, 0),
            end: hm(17, 0),
            break_start: Some(hm(12, 0)),
            break_end: Some(hm(13, 0)),
        };
        let profile = profile_with(
            every_day(schedule),
            vec![AvailabilityException {
                date: day,
                available: true,
                custom_hours: Some(HourRange {
                    start: hm(11, 0),
                    end: hm(14, 0),
                }),
            }],
            "UTC",
        );
        let slots = generate_slots(&profile, day, 30).unwrap();

        // 11:00-14:00 is six increments; the two inside the break drop out.
        assert_eq!(slots.len(), 4);
        assert!(slots.iter().all(|slot| slot.start.time() != hm(12, 0)
            && slot.start.time() != hm(12, 30)));
    }

    #[test]
    fn day_without_schedule_yields_no_slots() {
        let mut weekly = WeeklySchedule::default();
        weekly.days[1] = Some(workday((9, 0), (17, 0)));
        let profile = profile_with(weekly, vec![], "UTC");

        // 2025-06-01 is a Sunday; only Monday has hours.
        assert!(generate_slots(&profile, date(2025, 6, 1), 30).unwrap().is_empty());
        assert_eq!(generate_slots(&profile, date(2025, 6, 2), 30).unwrap().len(), 16);
    }

    #[test_case((9, 0), (10, 15), 30, 2; "partial final increment dropped")]
    #[test_case((9, 0), (10, 0), 60, 1; "exact single hour")]
    #[test_case((9, 0), (9, 20), 30, 0; "window shorter than slot")]
    #[test_case((9, 0), (17, 0), 45, 10; "uneven slot length")]
    fn slot_counts(start: (u32, u32), end: (u32, u32), slot_minutes: u32, expected: usize) {
        let profile = profile_with(every_day(workday(start, end)), vec![], "UTC");
        let slots = generate_slots(&profile, date(2025, 6, 2), slot_minutes).unwrap();
        assert_eq!(slots.len(), expected);
    }

    #[test]
    fn zero_slot_length_is_rejected() {
        let profile = profile_9_to_5(|_| {});
        assert!(generate_slots(&profile, date(2025, 6, 2), 0).is_err());
    }

    #[test]
    fn slots_are_resolved_against_the_profile_timezone() {
        let profile = profile_with(every_day(workday((9, 0), (17, 0))), vec![], "America/New_York");
        let slots = generate_slots(&profile, date(2025, 1, 15), 30).unwrap();

        // 09:00 EST == 14:00 UTC.
        assert_eq!(slots[0].start, utc(2025, 1, 15, 14, 0));
    }

    #[test]
    fn dst_gap_swallows_nonexistent_slot_starts() {
        // Europe/Berlin 2025-03-30: 02:00 jumps to 03:00.
        let profile = profile_with(every_day(workday((1, 0), (4, 0))), vec![], "Europe/Berlin");
        let slots = generate_slots(&profile, date(2025, 3, 30), 30).unwrap();

        let starts: Vec<_> = slots
            .iter()
            .map(|slot| slot.start.with_timezone(&chrono_tz::Europe::Berlin).time())
            .collect();
        assert!(!starts.contains(&hm(2, 0)));
        assert!(!starts.contains(&hm(2, 30)));
        assert!(starts.contains(&hm(1, 30)));
        assert!(starts.contains(&hm(3, 0)));
    }

    #[test]
    fn generation_is_idempotent() {
        let profile = profile_9_to_5(|_| {});
        let first = generate_slots(&profile, date(2025, 6, 2), 30).unwrap();
        let second = generate_slots(&profile, date(2025, 6, 2), 30).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn day_bounds_cover_the_local_calendar_day() {
        let (start, end) = day_bounds_utc(chrono_tz::America::New_York, date(2025, 1, 15));
        assert_eq!(start, utc(2025, 1, 15, 5, 0));
        assert_eq!(end, utc(2025, 1, 16, 5, 0));
    }
}
