use axum::{
    routing::{get, patch, post},
    Router,
};

use super::handlers::{
    cancel_appointment, create_appointment, list_appointments, update_appointment,
};
use crate::app_state::AppState;

pub fn appointment_routes() -> Router<AppState> {
    Router::new()
        .route("/appointments", post(create_appointment).get(list_appointments))
        .route("/appointments/:appointment_id", patch(update_appointment))
        .route("/appointments/:appointment_id/cancel", post(cancel_appointment))
}
