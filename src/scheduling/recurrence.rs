//! Expands a single appointment template and a recurrence pattern into the
//! concrete series of appointment instances.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};

use crate::db::models::{NewRecurrencePattern, RecurrenceFrequency};

use super::ValidationError;

/// The first appointment of the series; every instance copies its duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppointmentTemplate {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// One concrete occurrence. Identifiers (pattern id, consultant, client)
/// are attached by the persistence layer when each instance is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppointmentInstance {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// How the series steps forward once an instance has been emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceStep {
    Daily,
    /// Emission days, indexed by day-of-week with 0 = Sunday; at least one
    /// entry is true.
    Weekly { days: [bool; 7] },
    Monthly,
}

/// Termination condition; a pattern carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceEnd {
    /// Last calendar date (in the template's wall clock) that may emit.
    Until(NaiveDate),
    Count(u32),
}

/// A recurrence pattern that has passed validation. The expansion loop can
/// only terminate, because the end condition is guaranteed present and every
/// path through the loop advances the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub step: RecurrenceStep,
    pub interval: u32,
    pub end: RecurrenceEnd,
}

impl RecurrenceRule {
    pub fn from_pattern(pattern: &NewRecurrencePattern) -> Result<Self, ValidationError> {
        let interval = u32::try_from(pattern.interval)
            .ok()
            .filter(|interval| *interval >= 1)
            .ok_or_else(|| ValidationError::new("recurrence interval must be at least 1"))?;

        let step = match pattern.frequency {
            RecurrenceFrequency::Daily => RecurrenceStep::Daily,
            RecurrenceFrequency::Monthly => RecurrenceStep::Monthly,
            RecurrenceFrequency::Weekly => {
                let indices = pattern
                    .days_of_week
                    .as_deref()
                    .filter(|days| !days.is_empty())
                    .ok_or_else(|| {
                        ValidationError::new(
                            "weekly recurrence requires a non-empty days_of_week set",
                        )
                    })?;
                let mut days = [false; 7];
                for &index in indices {
                    let slot = days.get_mut(usize::from(index)).ok_or_else(|| {
                        ValidationError::new(format!(
                            "days_of_week entries must be 0-6, got {index}"
                        ))
                    })?;
                    *slot = true;
                }
                RecurrenceStep::Weekly { days }
            }
        };

        let end = match (pattern.end_date, pattern.occurrences) {
            (Some(end_date), None) => RecurrenceEnd::Until(end_date),
            (None, Some(occurrences)) => {
                let count = u32::try_from(occurrences)
                    .ok()
                    .filter(|count| *count >= 1)
                    .ok_or_else(|| {
                        ValidationError::new("recurrence occurrences must be at least 1")
                    })?;
                RecurrenceEnd::Count(count)
            }
            (None, None) => {
                return Err(ValidationError::new(
                    "recurrence requires an end date or an occurrence count",
                ))
            }
            (Some(_), Some(_)) => {
                return Err(ValidationError::new(
                    "recurrence may set an end date or an occurrence count, not both",
                ))
            }
        };

        Ok(RecurrenceRule { step, interval, end })
    }
}

/// Expand `pattern` from `template` into concrete instances.
///
/// Instances keep the template's wall-clock time and duration. Weekly
/// patterns skip non-matching days one day at a time without emitting;
/// monthly advancement is calendar-aware, clamping to the shorter month's
/// last day. A pattern with no termination condition is rejected before the
/// loop starts.
pub fn expand(
    template: &AppointmentTemplate,
    pattern: &NewRecurrencePattern,
) -> Result<Vec<AppointmentInstance>, ValidationError> {
    let rule = RecurrenceRule::from_pattern(pattern)?;
    expand_with_rule(template, &rule)
}

pub fn expand_with_rule(
    template: &AppointmentTemplate,
    rule: &RecurrenceRule,
) -> Result<Vec<AppointmentInstance>, ValidationError> {
    if template.start >= template.end {
        return Err(ValidationError::new(
            "appointment template start must be before its end",
        ));
    }

    let duration = template.end - template.start;
    let mut instances = Vec::new();
    let mut current = template.start;
    let mut count: u32 = 0;

    loop {
        match rule.end {
            RecurrenceEnd::Until(end_date) => {
                if current.date_naive() > end_date {
                    break;
                }
            }
            RecurrenceEnd::Count(limit) => {
                if count >= limit {
                    break;
                }
            }
        }

        if let RecurrenceStep::Weekly { days } = &rule.step {
            if !days[current.weekday().num_days_from_sunday() as usize] {
                let Some(next) = current.checked_add_days(Days::new(1)) else {
                    break;
                };
                current = next;
                continue;
            }
        }

        instances.push(AppointmentInstance {
            start: current,
            end: current + duration,
        });
        count += 1;

        let advanced = match rule.step {
            RecurrenceStep::Daily => current.checked_add_days(Days::new(u64::from(rule.interval))),
            RecurrenceStep::Weekly { .. } => {
                current.checked_add_days(Days::new(7 * u64::from(rule.interval)))
            }
            RecurrenceStep::Monthly => current.checked_add_months(Months::new(rule.interval)),
        };
        let Some(next) = advanced else {
            break;
        };
        current = next;
    }

    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pattern(frequency: RecurrenceFrequency) -> NewRecurrencePattern {
        NewRecurrencePattern {
            frequency,
            interval: 1,
            days_of_week: None,
            end_date: None,
            occurrences: None,
        }
    }

    fn template(y: i32, m: u32, d: u32) -> AppointmentTemplate {
        let start = Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap();
        AppointmentTemplate {
            start,
            end: start + chrono::Duration::minutes(60),
        }
    }

    #[test]
    fn weekly_by_occurrences_emits_mondays_seven_days_apart() {
        let mut weekly = pattern(RecurrenceFrequency::Weekly);
        weekly.days_of_week = Some(vec![1]);
        weekly.occurrences = Some(4);

        // 2025-06-02 is a Monday.
        let instances = expand(&template(2025, 6, 2), &weekly).unwrap();

        assert_eq!(instances.len(), 4);
        for pair in instances.windows(2) {
            assert_eq!(pair[1].start - pair[0].start, chrono::Duration::days(7));
        }
        assert_eq!(
            instances[3].start,
            Utc.with_ymd_and_hms(2025, 6, 23, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn weekly_skips_forward_to_the_first_matching_day() {
        let mut weekly = pattern(RecurrenceFrequency::Weekly);
        weekly.days_of_week = Some(vec![3]); // Wednesday
        weekly.occurrences = Some(1);

        // Start on Monday; first emission is Wednesday the 4th.
        let instances = expand(&template(2025, 6, 2), &weekly).unwrap();
        assert_eq!(
            instances[0].start,
            Utc.with_ymd_and_hms(2025, 6, 4, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn missing_termination_is_rejected_before_the_loop() {
        let mut daily = pattern(RecurrenceFrequency::Daily);
        daily.interval = 1;
        let err = expand(&template(2025, 6, 2), &daily).unwrap_err();
        assert!(err.to_string().contains("end date or an occurrence count"));
    }

    #[test]
    fn both_terminations_are_rejected() {
        let mut daily = pattern(RecurrenceFrequency::Daily);
        daily.end_date = NaiveDate::from_ymd_opt(2025, 7, 1);
        daily.occurrences = Some(5);
        assert!(expand(&template(2025, 6, 2), &daily).is_err());
    }

    #[test]
    fn weekly_without_days_is_rejected() {
        let mut weekly = pattern(RecurrenceFrequency::Weekly);
        weekly.occurrences = Some(2);
        assert!(expand(&template(2025, 6, 2), &weekly).is_err());

        weekly.days_of_week = Some(vec![]);
        assert!(expand(&template(2025, 6, 2), &weekly).is_err());
    }

    #[test]
    fn out_of_range_day_index_is_rejected() {
        let mut weekly = pattern(RecurrenceFrequency::Weekly);
        weekly.days_of_week = Some(vec![7]);
        weekly.occurrences = Some(2);
        let err = expand(&template(2025, 6, 2), &weekly).unwrap_err();
        assert!(err.to_string().contains("0-6"));
    }

    #[test]
    fn daily_interval_respects_the_step() {
        let mut daily = pattern(RecurrenceFrequency::Daily);
        daily.interval = 2;
        daily.occurrences = Some(3);

        let instances = expand(&template(2025, 6, 2), &daily).unwrap();
        let days: Vec<_> = instances.iter().map(|i| i.start.day()).collect();
        assert_eq!(days, vec![2, 4, 6]);
    }

    #[test]
    fn monthly_advancement_clamps_to_short_months() {
        let mut monthly = pattern(RecurrenceFrequency::Monthly);
        monthly.occurrences = Some(3);

        let instances = expand(&template(2025, 1, 31), &monthly).unwrap();
        let dates: Vec<_> = instances.iter().map(|i| i.start.date_naive()).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
                NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(),
                NaiveDate::from_ymd_opt(2025, 3, 28).unwrap(),
            ]
        );
    }

    #[test]
    fn end_date_is_an_inclusive_calendar_bound() {
        let mut daily = pattern(RecurrenceFrequency::Daily);
        daily.end_date = NaiveDate::from_ymd_opt(2025, 6, 4);

        let instances = expand(&template(2025, 6, 2), &daily).unwrap();
        assert_eq!(instances.len(), 3);
        assert_eq!(
            instances[2].start.date_naive(),
            NaiveDate::from_ymd_opt(2025, 6, 4).unwrap()
        );
    }

    #[test]
    fn instances_preserve_wall_clock_and_duration() {
        let mut weekly = pattern(RecurrenceFrequency::Weekly);
        weekly.days_of_week = Some(vec![1, 4]);
        weekly.occurrences = Some(5);

        let start = Utc.with_ymd_and_hms(2025, 6, 2, 14, 30, 0).unwrap();
        let template = AppointmentTemplate {
            start,
            end: start + chrono::Duration::minutes(90),
        };
        let instances = expand(&template, &weekly).unwrap();

        for instance in &instances {
            assert_eq!(instance.start.time(), start.time());
            assert_eq!(instance.end - instance.start, chrono::Duration::minutes(90));
        }
    }

    #[test]
    fn inverted_template_is_rejected() {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        let template = AppointmentTemplate {
            start,
            end: start - chrono::Duration::minutes(30),
        };
        let mut daily = pattern(RecurrenceFrequency::Daily);
        daily.occurrences = Some(1);
        assert!(expand_with_rule(
            &template,
            &RecurrenceRule::from_pattern(&daily).unwrap()
        )
        .is_err());
    }

    #[test]
    fn invalid_interval_is_rejected() {
        let mut daily = pattern(RecurrenceFrequency::Daily);
        daily.interval = 0;
        daily.occurrences = Some(2);
        assert!(expand(&template(2025, 6, 2), &daily).is_err());
    }
}
