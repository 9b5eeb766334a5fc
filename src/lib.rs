// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod api;
pub mod chat;
pub mod classify;
pub mod config;
pub mod error;
pub mod ingest;
pub mod jobs;
pub mod llm;
pub mod metrics;
pub mod progress;
pub mod store;
pub mod text;

pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;

use axum::Router;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "sports_news_analyzer=info,warn";

/// Install the global subscriber. `RUST_LOG` overrides the default filter;
/// `LOG_FORMAT=json` switches to JSON lines. Safe to call more than once.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    // Err only when a subscriber is already installed (Shuttle, tests).
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

/// Full application router for a loaded config, `/metrics` included when enabled.
pub fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let state = AppState::from_config(cfg)?;
    let mut app = router(state);
    if metrics::metrics_enabled() {
        let m = metrics::Metrics::init()?;
        app = app.merge(m.router());
        info!("prometheus metrics enabled at /metrics");
    }
    info!(
        model = %cfg.llm.model,
        llm_enabled = cfg.llm.enabled,
        daily_category = %cfg.retriever.daily_category,
        "application wired"
    );
    Ok(app)
}
