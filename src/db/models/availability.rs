use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::{Json, Uuid};
use validator::Validate;

use crate::scheduling::availability::{AvailabilityException, AvailabilityProfile, WeeklySchedule};
use crate::scheduling::ValidationError;

/// Availability profile as stored: the weekly schedule and exception list
/// live in JSONB columns, policy parameters in plain columns.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct AvailabilityProfileRecord {
    pub consultant_id: Uuid,
    pub weekly_schedule: Json<WeeklySchedule>,
    pub exceptions: Json<Vec<AvailabilityException>>,
    pub timezone: String,
    pub buffer_between_appointments: i32,
    pub max_advance_booking: i32,
    pub min_notice_booking: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AvailabilityProfileRecord> for AvailabilityProfile {
    type Error = ValidationError;

    fn try_from(record: AvailabilityProfileRecord) -> Result<Self, Self::Error> {
        AvailabilityProfile::new(
            record.consultant_id,
            record.weekly_schedule.0,
            record.exceptions.0,
            &record.timezone,
            record.buffer_between_appointments,
            record.max_advance_booking,
            record.min_notice_booking,
        )
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpsertAvailabilityProfile {
    pub weekly_schedule: WeeklySchedule,
    #[serde(default)]
    pub exceptions: Vec<AvailabilityException>,
    #[validate(length(min = 1, message = "Timezone must be set"))]
    pub timezone: String,
    #[validate(range(min = 0))]
    pub buffer_between_appointments: i32,
    #[validate(range(min = 0, max = 365))]
    pub max_advance_booking: i32,
    #[validate(range(min = 0))]
    pub min_notice_booking: i32,
}
