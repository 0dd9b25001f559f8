use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tracing::info;

use lexbook_backend::{
    app::create_router, app_state::AppState, config::Config, db, scheduling::SystemClock,
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;
    let telemetry_handles = telemetry::init_telemetry(None).await?;

    let pool = db::init_pool(&config.database)
        .await
        .context("Failed to initialize database pool")?;

    let addr = config.server_addr();
    let app_name = config.app.name.clone();
    let state = AppState::new(pool, config, Arc::new(SystemClock));
    let app = create_router(state);

    info!("{} listening on {}", app_name, addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .await
        .context("Failed to serve application")?;

    telemetry_handles.shutdown().await?;

    Ok(())
}
