use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::models::{
    Appointment, AppointmentStatus, NewAppointment, NewRecurrencePattern, RecurringPattern,
    UpdateAppointmentPayload,
};
use crate::db::DatabaseError;
use crate::scheduling::AppointmentInstance;

const APPOINTMENT_COLUMNS: &str = "id, consultant_id, client_id, consultation_type_id, status, \
     start_time, end_time, notes, recurring_pattern_id, is_recurring, created_at, updated_at";

pub struct AppointmentRepository;

impl AppointmentRepository {
    /// Appointments whose interval intersects `[from, to)`, oldest first,
    /// optionally narrowed to one status.
    pub async fn list_for_window(
        pool: &PgPool,
        consultant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let appointments = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM appointments
            WHERE consultant_id = $1
              AND start_time < $3
              AND end_time > $2
              AND ($4 IS NULL OR status = $4)
            ORDER BY start_time
            "#
        ))
        .bind(consultant_id)
        .bind(from)
        .bind(to)
        .bind(status)
        .fetch_all(pool)
        .await?;

        Ok(appointments)
    }

    /// Book a single appointment. The overlap re-check and the insert run in
    /// one transaction; the table's exclusion constraint backs this up, so a
    /// race between two bookers surfaces as `Duplicate` rather than a
    /// double-booking.
    pub async fn create(pool: &PgPool, new: &NewAppointment) -> Result<Appointment, DatabaseError> {
        let mut tx = pool.begin().await?;
        let appointment = Self::insert_one(
            &mut tx,
            new,
            new.start_time,
            new.end_time(),
            None,
        )
        .await?;
        tx.commit().await?;

        Ok(appointment)
    }

    /// Persist a recurrence pattern and every expanded instance, atomically.
    /// Any instance clashing with an existing booking aborts the whole
    /// series.
    pub async fn create_recurring(
        pool: &PgPool,
        new: &NewAppointment,
        pattern: &NewRecurrencePattern,
        instances: &[AppointmentInstance],
    ) -> Result<(RecurringPattern, Vec<Appointment>), DatabaseError> {
        if instances.is_empty() {
            return Err(DatabaseError::InvalidInput(
                "recurrence pattern expands to no instances".to_string(),
            ));
        }

        let mut tx = pool.begin().await?;

        let days_of_week = pattern
            .days_of_week
            .as_ref()
            .map(|days| days.iter().map(|day| i16::from(*day)).collect::<Vec<i16>>());
        let stored_pattern = sqlx::query_as::<_, RecurringPattern>(
            r#"
            INSERT INTO recurring_patterns (frequency, "interval", days_of_week, end_date, occurrences)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, frequency, "interval", days_of_week, end_date, occurrences, created_at
            "#,
        )
        .bind(pattern.frequency)
        .bind(pattern.interval)
        .bind(days_of_week)
        .bind(pattern.end_date)
        .bind(pattern.occurrences)
        .fetch_one(&mut *tx)
        .await?;

        let mut appointments = Vec::with_capacity(instances.len());
        for instance in instances {
            appointments.push(
                Self::insert_one(&mut tx, new, instance.start, instance.end, Some(stored_pattern.id))
                    .await?,
            );
        }

        tx.commit().await?;

        Ok((stored_pattern, appointments))
    }

    /// Status/notes transition on an existing appointment (complete,
    /// no-show, annotate). Unset fields keep their stored values.
    pub async fn update(
        pool: &PgPool,
        appointment_id: Uuid,
        update: &UpdateAppointmentPayload,
    ) -> Result<Appointment, DatabaseError> {
        sqlx::query_as::<_, Appointment>(&format!(
            r#"
            UPDATE appointments
            SET status = COALESCE($2, status),
                notes = COALESCE($3, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(appointment_id)
        .bind(update.status)
        .bind(update.notes.as_deref())
        .fetch_optional(pool)
        .await?
        .ok_or(DatabaseError::NotFound)
    }

    /// Cancel a scheduled appointment; completed or already-cancelled rows
    /// are not touched.
    pub async fn cancel(pool: &PgPool, appointment_id: Uuid) -> Result<Appointment, DatabaseError> {
        sqlx::query_as::<_, Appointment>(&format!(
            r#"
            UPDATE appointments
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND status = 'scheduled'
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(appointment_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DatabaseError::NotFound)
    }

    async fn insert_one(
        tx: &mut Transaction<'_, Postgres>,
        new: &NewAppointment,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        recurring_pattern_id: Option<Uuid>,
    ) -> Result<Appointment, DatabaseError> {
        Self::ensure_interval_free(tx, new.consultant_id, start_time, end_time).await?;

        sqlx::query_as::<_, Appointment>(&format!(
            r#"
            INSERT INTO appointments
                (consultant_id, client_id, consultation_type_id, status,
                 start_time, end_time, notes, recurring_pattern_id, is_recurring)
            VALUES ($1, $2, $3, 'scheduled', $4, $5, $6, $7, $8)
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(new.consultant_id)
        .bind(new.client_id)
        .bind(new.consultation_type_id)
        .bind(start_time)
        .bind(end_time)
        .bind(new.notes.as_deref())
        .bind(recurring_pattern_id)
        .bind(recurring_pattern_id.is_some())
        .fetch_one(&mut **tx)
        .await
        .map_err(map_exclusion_violation)
    }

    async fn ensure_interval_free(
        tx: &mut Transaction<'_, Postgres>,
        consultant_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let (conflicts,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM appointments
            WHERE consultant_id = $1
              AND status = 'scheduled'
              AND start_time < $3
              AND end_time > $2
            "#,
        )
        .bind(consultant_id)
        .bind(start_time)
        .bind(end_time)
        .fetch_one(&mut **tx)
        .await?;

        if conflicts > 0 {
            return Err(DatabaseError::Duplicate);
        }
        Ok(())
    }
}

fn map_exclusion_violation(err: sqlx::Error) -> DatabaseError {
    match &err {
        // 23P01: the appointments_no_overlap constraint caught a race the
        // advisory pre-check missed.
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23P01") => {
            DatabaseError::Duplicate
        }
        _ => DatabaseError::Sqlx(err),
    }
}
