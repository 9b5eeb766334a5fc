use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// Env switch for the Prometheus recorder and `/metrics`.
pub const ENV_METRICS: &str = "METRICS";

pub fn metrics_enabled() -> bool {
    std::env::var(ENV_METRICS)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// One-time series descriptions (so they show up on /metrics with help text).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "retriever_items_total",
            "News items accepted, labelled by retrieval path."
        );
        describe_counter!(
            "retriever_path_failures_total",
            "Retrieval paths that failed or came back empty."
        );
        describe_counter!(
            "retriever_fallback_sample_total",
            "Retrieval runs answered with the built-in sample."
        );
        describe_counter!(
            "llm_requests_total",
            "LLM completion calls by attempt and outcome."
        );
        describe_counter!("analysis_runs_total", "Analysis runs by outcome.");
        describe_histogram!("analysis_duration_ms", "Analysis run wall time in milliseconds.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_described();
        Ok(Self { handle })
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
