use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "recurrence_frequency", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceFrequency {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct RecurringPattern {
    pub id: Uuid,
    pub frequency: RecurrenceFrequency,
    pub interval: i32,
    pub days_of_week: Option<Vec<i16>>,
    pub end_date: Option<NaiveDate>,
    pub occurrences: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Inbound recurrence request. The shallow checks live here; the engine's
/// rule constructor enforces the deeper shape (weekly day set, termination
/// exactly-one-of) before any expansion happens.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewRecurrencePattern {
    pub frequency: RecurrenceFrequency,
    #[validate(range(min = 1, message = "Interval must be at least 1"))]
    pub interval: i32,
    pub days_of_week: Option<Vec<u8>>,
    pub end_date: Option<NaiveDate>,
    #[validate(range(min = 1, message = "Occurrences must be at least 1"))]
    pub occurrences: Option<i32>,
}
