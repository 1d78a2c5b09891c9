use axum::{routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const STRATEGY_REQUESTS_TOTAL: &str = "strategy_requests_total";
pub const STRATEGY_FAILURES_TOTAL: &str = "strategy_failures_total";
pub const FORECAST_UNAVAILABLE_TOTAL: &str = "strategy_forecast_unavailable_total";
pub const STRATEGY_DURATION_MS: &str = "strategy_duration_ms";
pub const LAST_SUCCESS_PROB: &str = "strategy_last_success_prob";

/// The recorder is process-global; every `Metrics::init` shares it.
static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder once per process.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PROMETHEUS.get_or_try_init(|| {
            // Use default buckets to avoid API differences across crate versions.
            PrometheusBuilder::new()
                .install_recorder()
                .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))
        })?;
        // Touch the series so a fresh scrape already lists them.
        counter!(STRATEGY_REQUESTS_TOTAL).increment(0);
        counter!(FORECAST_UNAVAILABLE_TOTAL).increment(0);
        Ok(Self {
            handle: handle.clone(),
        })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
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

pub(crate) fn record_request() {
    counter!(STRATEGY_REQUESTS_TOTAL).increment(1);
}

pub(crate) fn record_failure(kind: &'static str) {
    counter!(STRATEGY_FAILURES_TOTAL, "kind" => kind).increment(1);
}

pub(crate) fn record_forecast_unavailable() {
    counter!(FORECAST_UNAVAILABLE_TOTAL).increment(1);
}

pub(crate) fn record_success(success_prob: f64, elapsed_ms: f64) {
    histogram!(STRATEGY_DURATION_MS).record(elapsed_ms);
    gauge!(LAST_SUCCESS_PROB).set(success_prob);
}
