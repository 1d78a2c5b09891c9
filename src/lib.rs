// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod agent;
pub mod allocation;
pub mod api;
pub mod artifact;
pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod forecast;
pub mod history;
pub mod llm;
pub mod metrics;
pub mod synth;
pub mod tracking;

// ---- Re-exports for stable public API ----
pub use crate::agent::{StrategyAgent, StrategyResponse};
pub use crate::api::router;
pub use crate::error::{Result, StrategyError};
pub use crate::features::{CampaignInput, FeatureNormalizer, FeatureRecord};

use anyhow::Context;
use axum::Router;
use tracing::info;

use crate::api::AppState;
use crate::config::StrategyConfig;

/// Build the full application router from the resolved configuration:
/// strategy API plus `/metrics`.
///
/// Fails when the classifier cannot be loaded or the configuration is invalid;
/// the service does not start without a classifier.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = StrategyConfig::load_default().context("loading strategy config")?;
    let agent = StrategyAgent::from_config(&cfg).context("initializing strategy agent")?;
    let metrics = crate::metrics::Metrics::init()?;
    info!(tracking = %cfg.tracking.uri, "Strategy service initialized");
    Ok(router(AppState::new(agent)).merge(metrics.router()))
}
