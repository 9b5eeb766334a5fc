//! Sports News Analyzer: binary entrypoint
//! Boots the Axum HTTP server on Shuttle: config, tracing, shared state and routes.

use shuttle_axum::ShuttleAxum;
use sports_news_analyzer::{build_app, init_tracing, AppConfig};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = AppConfig::load()?;
    let router = build_app(&cfg)?;

    Ok(router.into())
}
