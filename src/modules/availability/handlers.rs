use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

use crate::app_state::AppState;
use crate::db::models::{
    AppointmentStatus, AvailabilityProfileRecord, UpsertAvailabilityProfile,
};
use crate::db::repositories::{AppointmentRepository, AvailabilityRepository};
use crate::error::{AppError, AppResult};
use crate::scheduling::availability::AvailabilityProfile;
use crate::scheduling::slots::day_bounds_utc;
use crate::scheduling::{self, TimeSlot};

pub async fn get_profile(
    State(state): State<AppState>,
    Path(consultant_id): Path<Uuid>,
) -> AppResult<Json<AvailabilityProfileRecord>> {
    let record = AvailabilityRepository::fetch(&state.db, consultant_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("availability profile for consultant {consultant_id}"))
        })?;

    Ok(Json(record))
}

pub async fn upsert_profile(
    State(state): State<AppState>,
    Path(consultant_id): Path<Uuid>,
    Json(payload): Json<UpsertAvailabilityProfile>,
) -> AppResult<Json<AvailabilityProfileRecord>> {
    payload.validate()?;

    // Reject malformed schedules before anything reaches storage; the slot
    // engine assumes profiles it reads back are well-formed.
    AvailabilityProfile::new(
        consultant_id,
        payload.weekly_schedule.clone(),
        payload.exceptions.clone(),
        &payload.timezone,
        payload.buffer_between_appointments,
        payload.max_advance_booking,
        payload.min_notice_booking,
    )?;

    let record = AvailabilityRepository::upsert(&state.db, consultant_id, &payload).await?;
    debug!(%consultant_id, "Availability profile upserted");

    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
    pub slot_minutes: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SlotsResponse {
    pub consultant_id: Uuid,
    pub date: NaiveDate,
    pub slot_minutes: u32,
    pub slots: Vec<TimeSlot>,
}

/// Compute the bookable slots for one consultant and date: generate from
/// the availability profile, mark conflicts against booked appointments
/// (with the profile's buffer), then drop anything inside the min-notice
/// window. Recomputed from scratch on every call.
pub async fn list_slots(
    State(state): State<AppState>,
    Path(consultant_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
) -> AppResult<Json<SlotsResponse>> {
    let record = AvailabilityRepository::fetch(&state.db, consultant_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("availability profile for consultant {consultant_id}"))
        })?;
    let profile: AvailabilityProfile = record.try_into()?;

    let slot_minutes = query
        .slot_minutes
        .unwrap_or(state.env.scheduling.default_slot_minutes);
    let now = state.clock.now();

    // Dates past the advance window are simply not offered.
    if !scheduling::date_within_booking_window(&profile, query.date, now) {
        return Ok(Json(SlotsResponse {
            consultant_id,
            date: query.date,
            slot_minutes,
            slots: Vec::new(),
        }));
    }

    let mut slots = scheduling::generate_slots(&profile, query.date, slot_minutes)?;

    let (day_start, day_end) = day_bounds_utc(profile.timezone, query.date);
    let booked = AppointmentRepository::list_for_window(
        &state.db,
        consultant_id,
        day_start,
        day_end,
        Some(AppointmentStatus::Scheduled),
    )
    .await?;

    scheduling::resolve_conflicts(&mut slots, &booked, profile.buffer_minutes);
    scheduling::apply_min_notice(&mut slots, scheduling::min_notice_cutoff(&profile, now));

    debug!(
        %consultant_id,
        date = %query.date,
        slot_count = slots.len(),
        booked_count = booked.len(),
        "Computed availability slots"
    );

    Ok(Json(SlotsResponse {
        consultant_id,
        date: query.date,
        slot_minutes,
        slots,
    }))
}
