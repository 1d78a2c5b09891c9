//! Strategy configuration: one TOML document with `[classifier]`, `[tracking]`,
//! `[forecast]` and `[llm]` sections.
//!
//! Lookup order:
//! 1) `$STRATEGY_CONFIG_PATH` (must exist)
//! 2) `config/strategy.toml`
//! 3) built-in defaults
//!
//! `$STRATEGY_TRACKING_URI` and `$STRATEGY_FORECAST_URI` override the file.

pub mod ai;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, StrategyError};
use crate::tracking::DEFAULT_TRACKING_URI;
pub use ai::AiConfig;

pub const DEFAULT_STRATEGY_CONFIG_PATH: &str = "config/strategy.toml";
pub const ENV_STRATEGY_CONFIG_PATH: &str = "STRATEGY_CONFIG_PATH";
pub const ENV_TRACKING_URI: &str = "STRATEGY_TRACKING_URI";
pub const ENV_FORECAST_URI: &str = "STRATEGY_FORECAST_URI";

pub const DEFAULT_CLASSIFIER_PATH: &str = "models/rf_strategy_model.json";
pub const DEFAULT_FORECAST_EXPERIMENT: &str = "Forecasting";
pub const DEFAULT_FORECAST_ARTIFACT: &str = "prophet_model";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default)]
    pub classifier: ClassifierSection,
    #[serde(default)]
    pub tracking: TrackingSection,
    #[serde(default)]
    pub forecast: ForecastSection,
    #[serde(default)]
    pub llm: AiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSection {
    #[serde(default = "default_classifier_path")]
    pub path: PathBuf,
    /// Optional SHA-256 of the artifact, verified before parsing.
    #[serde(default)]
    pub sha256: Option<String>,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            path: default_classifier_path(),
            sha256: None,
        }
    }
}

fn default_classifier_path() -> PathBuf {
    PathBuf::from(DEFAULT_CLASSIFIER_PATH)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSection {
    #[serde(default = "default_tracking_uri")]
    pub uri: String,
}

impl Default for TrackingSection {
    fn default() -> Self {
        Self {
            uri: default_tracking_uri(),
        }
    }
}

fn default_tracking_uri() -> String {
    DEFAULT_TRACKING_URI.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastSection {
    #[serde(default = "default_experiment")]
    pub experiment: String,
    #[serde(default = "default_artifact_name")]
    pub artifact_name: String,
    /// Explicit artifact; skips discovery when it loads.
    #[serde(default)]
    pub artifact_uri: Option<String>,
    /// Fixed horizon; when absent the request's `duration` is used.
    #[serde(default)]
    pub horizon_periods: Option<usize>,
}

impl Default for ForecastSection {
    fn default() -> Self {
        Self {
            experiment: default_experiment(),
            artifact_name: default_artifact_name(),
            artifact_uri: None,
            horizon_periods: None,
        }
    }
}

fn default_experiment() -> String {
    DEFAULT_FORECAST_EXPERIMENT.to_string()
}
fn default_artifact_name() -> String {
    DEFAULT_FORECAST_ARTIFACT.to_string()
}

impl StrategyConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: StrategyConfig = toml::from_str(s)
            .map_err(|e| StrategyError::Configuration(format!("invalid strategy config: {e}")))?;
        cfg.llm.sanitize();
        if let Some(uri) = &cfg.forecast.artifact_uri {
            if uri.trim().is_empty() {
                cfg.forecast.artifact_uri = None;
            }
        }
        Ok(cfg)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path).map_err(|e| {
            StrategyError::Configuration(format!("reading {}: {e}", path.display()))
        })?;
        let cfg = Self::from_toml_str(&s)?;
        info!(path = %path.display(), "Strategy config loaded");
        Ok(cfg)
    }

    /// Resolve the config using env var + fallbacks, then apply env overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_STRATEGY_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(StrategyError::Configuration(format!(
                    "{ENV_STRATEGY_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                )));
            }
            Self::load_from_file(&pb)?
        } else {
            let default_path = PathBuf::from(DEFAULT_STRATEGY_CONFIG_PATH);
            if default_path.exists() {
                Self::load_from_file(&default_path)?
            } else {
                info!("No strategy config file found; using built-in defaults");
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(uri) = non_empty_env(ENV_TRACKING_URI) {
            self.tracking.uri = uri;
        }
        if let Some(uri) = non_empty_env(ENV_FORECAST_URI) {
            self.forecast.artifact_uri = Some(uri);
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = StrategyConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.classifier.path, PathBuf::from(DEFAULT_CLASSIFIER_PATH));
        assert_eq!(cfg.tracking.uri, DEFAULT_TRACKING_URI);
        assert_eq!(cfg.forecast.experiment, "Forecasting");
        assert_eq!(cfg.forecast.artifact_name, "prophet_model");
        assert!(cfg.forecast.artifact_uri.is_none());
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert!(cfg.llm.enabled);
    }

    #[test]
    fn malformed_document_is_configuration_error() {
        let err = StrategyConfig::from_toml_str("[forecast\nexperiment=").unwrap_err();
        assert!(matches!(err, StrategyError::Configuration(_)));
    }

    #[test]
    fn blank_artifact_uri_means_discovery() {
        let cfg = StrategyConfig::from_toml_str("[forecast]\nartifact_uri = \"  \"\n").unwrap();
        assert!(cfg.forecast.artifact_uri.is_none());
    }
}
