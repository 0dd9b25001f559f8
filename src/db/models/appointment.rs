use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use validator::Validate;

use super::NewRecurrencePattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "appointment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub consultant_id: Uuid,
    pub client_id: Uuid,
    pub consultation_type_id: Uuid,
    pub status: AppointmentStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: Option<String>,
    pub recurring_pattern_id: Option<Uuid>,
    pub is_recurring: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewAppointment {
    pub consultant_id: Uuid,
    pub client_id: Uuid,
    pub consultation_type_id: Uuid,
    #[validate(range(min = 1, message = "Duration must be at least 1 minute"))]
    pub duration_minutes: i64,
    pub start_time: DateTime<Utc>,
    pub notes: Option<String>,
    #[validate(nested)]
    pub recurrence: Option<NewRecurrencePattern>,
}

impl NewAppointment {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(self.duration_minutes)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAppointmentPayload {
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
}
