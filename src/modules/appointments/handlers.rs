use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app_state::AppState;
use crate::db::models::{
    Appointment, AppointmentStatus, NewAppointment, UpdateAppointmentPayload,
};
use crate::db::repositories::{AppointmentRepository, AvailabilityRepository};
use crate::db::DatabaseError;
use crate::error::{AppError, AppResult};
use crate::scheduling::slots::day_bounds_utc;
use crate::scheduling::{expand, AppointmentTemplate};

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub recurring_pattern_id: Option<Uuid>,
    pub appointments: Vec<Appointment>,
}

/// Book an appointment. When a recurrence pattern is attached, the pattern
/// is expanded into concrete instances and each instance is persisted under
/// the same pattern id, all-or-nothing.
pub async fn create_appointment(
    State(state): State<AppState>,
    Json(payload): Json<NewAppointment>,
) -> AppResult<(StatusCode, Json<BookingResponse>)> {
    payload.validate()?;

    let response = match &payload.recurrence {
        None => {
            let appointment = AppointmentRepository::create(&state.db, &payload)
                .await
                .map_err(slot_taken)?;
            info!(appointment_id = %appointment.id, consultant_id = %appointment.consultant_id, "Appointment booked");
            BookingResponse {
                recurring_pattern_id: None,
                appointments: vec![appointment],
            }
        }
        Some(pattern) => {
            let template = AppointmentTemplate {
                start: payload.start_time,
                end: payload.end_time(),
            };
            let instances = expand(&template, pattern)?;
            let (stored_pattern, appointments) =
                AppointmentRepository::create_recurring(&state.db, &payload, pattern, &instances)
                    .await
                    .map_err(slot_taken)?;
            info!(
                recurring_pattern_id = %stored_pattern.id,
                consultant_id = %payload.consultant_id,
                instance_count = appointments.len(),
                "Recurring appointments booked"
            );
            BookingResponse {
                recurring_pattern_id: Some(stored_pattern.id),
                appointments,
            }
        }
    };

    Ok((StatusCode::CREATED, Json(response)))
}

#[derive(Debug, Deserialize)]
pub struct AppointmentQuery {
    pub consultant_id: Uuid,
    pub date: NaiveDate,
    pub status: Option<AppointmentStatus>,
}

/// Appointments intersecting one consultant-local calendar day.
pub async fn list_appointments(
    State(state): State<AppState>,
    Query(query): Query<AppointmentQuery>,
) -> AppResult<Json<Vec<Appointment>>> {
    let timezone = AvailabilityRepository::fetch(&state.db, query.consultant_id)
        .await?
        .and_then(|record| record.timezone.parse::<Tz>().ok())
        .unwrap_or(chrono_tz::UTC);

    let (day_start, day_end) = day_bounds_utc(timezone, query.date);
    let appointments = AppointmentRepository::list_for_window(
        &state.db,
        query.consultant_id,
        day_start,
        day_end,
        query.status,
    )
    .await?;

    Ok(Json(appointments))
}

/// Status/notes transition (complete, no-show, annotate). The scheduling
/// engine itself never mutates appointments; this is the collaborator that
/// does.
pub async fn update_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Json(payload): Json<UpdateAppointmentPayload>,
) -> AppResult<Json<Appointment>> {
    payload.validate()?;
    let appointment = AppointmentRepository::update(&state.db, appointment_id, &payload).await?;

    Ok(Json(appointment))
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
) -> AppResult<Json<Appointment>> {
    let appointment = AppointmentRepository::cancel(&state.db, appointment_id).await?;
    info!(%appointment_id, "Appointment cancelled");

    Ok(Json(appointment))
}

fn slot_taken(err: DatabaseError) -> AppError {
    match err {
        DatabaseError::Duplicate => {
            AppError::Conflict("requested time is no longer available".to_string())
        }
        other => AppError::Database(other),
    }
}
