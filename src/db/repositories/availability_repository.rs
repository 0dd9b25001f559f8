use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{AvailabilityProfileRecord, UpsertAvailabilityProfile};
use crate::db::DatabaseError;

pub struct AvailabilityRepository;

impl AvailabilityRepository {
    pub async fn fetch(
        pool: &PgPool,
        consultant_id: Uuid,
    ) -> Result<Option<AvailabilityProfileRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, AvailabilityProfileRecord>(
            r#"
            SELECT consultant_id, weekly_schedule, exceptions, timezone,
                   buffer_between_appointments, max_advance_booking, min_notice_booking,
                   created_at, updated_at
            FROM availability_profiles
            WHERE consultant_id = $1
            "#,
        )
        .bind(consultant_id)
        .fetch_optional(pool)
        .await?;

        Ok(record)
    }

    pub async fn upsert(
        pool: &PgPool,
        consultant_id: Uuid,
        profile: &UpsertAvailabilityProfile,
    ) -> Result<AvailabilityProfileRecord, DatabaseError> {
        let record = sqlx::query_as::<_, AvailabilityProfileRecord>(
            r#"
            INSERT INTO availability_profiles
                (consultant_id, weekly_schedule, exceptions, timezone,
                 buffer_between_appointments, max_advance_booking, min_notice_booking)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (consultant_id) DO UPDATE SET
                weekly_schedule = EXCLUDED.weekly_schedule,
                exceptions = EXCLUDED.exceptions,
                timezone = EXCLUDED.timezone,
                buffer_between_appointments = EXCLUDED.buffer_between_appointments,
                max_advance_booking = EXCLUDED.max_advance_booking,
                min_notice_booking = EXCLUDED.min_notice_booking,
                updated_at = NOW()
            RETURNING consultant_id, weekly_schedule, exceptions, timezone,
                      buffer_between_appointments, max_advance_booking, min_notice_booking,
                      created_at, updated_at
            "#,
        )
        .bind(consultant_id)
        .bind(Json(&profile.weekly_schedule))
        .bind(Json(&profile.exceptions))
        .bind(&profile.timezone)
        .bind(profile.buffer_between_appointments)
        .bind(profile.max_advance_booking)
        .bind(profile.min_notice_booking)
        .fetch_one(pool)
        .await?;

        Ok(record)
    }
}
