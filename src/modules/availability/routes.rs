use axum::{routing::get, Router};

use super::handlers::{get_profile, list_slots, upsert_profile};
use crate::app_state::AppState;

pub fn availability_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/consultants/:consultant_id/availability",
            get(get_profile).put(upsert_profile),
        )
        .route("/consultants/:consultant_id/slots", get(list_slots))
}
