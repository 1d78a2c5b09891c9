//! # Strategy Agent
//! Sequences one strategy request:
//! normalize → predict → best-effort trend → allocate → synthesize → respond.
//!
//! The agent owns every long-lived component (classifier, forecaster
//! resolver, text backend). It is built once at startup from a resolved
//! [`StrategyConfig`] and shared by `Arc`; nothing here is global.
//!
//! Failure policy: prediction or synthesis failure aborts the request with
//! `GenerationFailed`; a missing or failing forecaster only drops the trend.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::allocation::{allocate, AllocationDecision};
use crate::classifier::PredictionService;
use crate::config::StrategyConfig;
use crate::error::{Result, StrategyError};
use crate::features::{CampaignInput, FeatureNormalizer, FeatureRecord};
use crate::forecast::{self, ForecastLocator, ForecastResolver, ForecasterHandle, ResolverStatus};
use crate::llm::{build_generator, DynGenerator};
use crate::metrics;
use crate::synth::StrategySynthesizer;
use crate::tracking::TrackingStore;

/// The only externally observable output of a strategy request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResponse {
    pub success_prob: f64,
    /// `null` when no forecaster could be used.
    pub trend: Option<f64>,
    pub strategy: String,
    pub allocation: AllocationDecision,
}

pub struct StrategyAgent {
    prediction: PredictionService,
    forecasts: Arc<ForecastResolver>,
    synthesizer: StrategySynthesizer,
    horizon_periods: Option<usize>,
}

impl StrategyAgent {
    pub fn new(
        prediction: PredictionService,
        forecasts: ForecastResolver,
        synthesizer: StrategySynthesizer,
    ) -> Self {
        Self {
            prediction,
            forecasts: Arc::new(forecasts),
            synthesizer,
            horizon_periods: None,
        }
    }

    /// Use a fixed forecast horizon instead of the request's `duration`.
    pub fn with_horizon(mut self, horizon_periods: Option<usize>) -> Self {
        self.horizon_periods = horizon_periods;
        self
    }

    /// Startup path: load the classifier, open the tracking store, build the backend.
    ///
    /// Fails with `ModelUnavailable` or `Configuration`; the forecaster is not
    /// touched until the first request needs it.
    pub fn from_config(cfg: &StrategyConfig) -> Result<Self> {
        let generator = build_generator(&cfg.llm);
        Self::from_config_with_generator(cfg, generator)
    }

    pub fn from_config_with_generator(cfg: &StrategyConfig, generator: DynGenerator) -> Result<Self> {
        info!("Initializing strategy agent");
        let prediction =
            PredictionService::load(&cfg.classifier.path, cfg.classifier.sha256.as_deref())?;
        let store = TrackingStore::open(&cfg.tracking.uri)?;
        debug!(root = %store.root().display(), "Tracking store opened");
        let forecasts = ForecastResolver::new(
            ForecastLocator {
                artifact_uri: cfg.forecast.artifact_uri.clone(),
                experiment: cfg.forecast.experiment.clone(),
                artifact_name: cfg.forecast.artifact_name.clone(),
            },
            store,
        );
        let synthesizer = StrategySynthesizer::new(generator);
        info!(
            classifier = %prediction.describe(),
            provider = synthesizer.provider_name(),
            "Strategy agent ready"
        );
        Ok(Self::new(prediction, forecasts, synthesizer).with_horizon(cfg.forecast.horizon_periods))
    }

    pub fn forecaster_status(&self) -> ResolverStatus {
        self.forecasts.status()
    }

    pub fn forecasts(&self) -> &ForecastResolver {
        &self.forecasts
    }

    pub fn provider_name(&self) -> &'static str {
        self.synthesizer.provider_name()
    }

    pub async fn generate(&self, input: &CampaignInput) -> Result<StrategyResponse> {
        let start = Instant::now();
        metrics::record_request();

        let outcome = self.run(input).await;
        match &outcome {
            Ok(resp) => {
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                metrics::record_success(resp.success_prob, elapsed_ms);
                info!(
                    success_prob = resp.success_prob,
                    trend_available = resp.trend.is_some(),
                    primary = %resp.allocation.primary,
                    elapsed_ms,
                    "Strategy generated"
                );
            }
            Err(e) => {
                metrics::record_failure(e.root_cause().kind());
                error!(error = %e, "Strategy generation error");
            }
        }
        outcome
    }

    async fn run(&self, input: &CampaignInput) -> Result<StrategyResponse> {
        let features = FeatureNormalizer::normalize(input);
        debug!(?features, "Features normalized");

        let success_prob = self
            .prediction
            .predict(&features)
            .map_err(StrategyError::generation_failed)?;

        let trend = self.trend_for(&features).await;
        let allocation = allocate(success_prob, features.budget, &features.contact);

        let strategy = self
            .synthesizer
            .synthesize(&features, success_prob, trend)
            .await
            .map_err(StrategyError::generation_failed)?;

        Ok(StrategyResponse {
            success_prob,
            trend,
            strategy,
            allocation,
        })
    }

    /// Best effort: any forecaster problem degrades to `None`.
    async fn trend_for(&self, features: &FeatureRecord) -> Option<f64> {
        let Some(handle) = self.resolve_forecaster().await else {
            metrics::record_forecast_unavailable();
            warn!("No trend data available; forecaster unavailable");
            return None;
        };
        let horizon = self
            .horizon_periods
            .unwrap_or(features.duration as usize);
        match forecast::forecast(&handle, horizon) {
            Ok(trend) => Some(trend),
            Err(e) => {
                metrics::record_forecast_unavailable();
                warn!(error = %e, "Trend computation failed; proceeding without trend data");
                None
            }
        }
    }

    /// First resolution reads the tracking store; keep that off the async workers.
    async fn resolve_forecaster(&self) -> Option<Arc<ForecasterHandle>> {
        if self.forecasts.is_settled() {
            return self.forecasts.resolve();
        }
        let resolver = Arc::clone(&self.forecasts);
        match tokio::task::spawn_blocking(move || resolver.resolve()).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "Forecaster resolution task failed");
                None
            }
        }
    }
}
