use sqlx::PgPool;
use std::sync::Arc;

use crate::config::Config;
use crate::scheduling::Clock;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub env: Config,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(db: PgPool, env: Config, clock: Arc<dyn Clock>) -> Self {
        Self { db, env, clock }
    }
}
