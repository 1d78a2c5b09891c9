//! Error taxonomy shared by every stage of strategy generation.
//!
//! Library errors (I/O, JSON, HTTP) are converted into one of these kinds at
//! the component boundary that observed them; nothing downstream ever sees a
//! raw `std::io::Error` or `reqwest::Error`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrategyError {
    /// Classifier artifact could not be loaded. Fatal at construction time.
    #[error("classifier unavailable: {0}")]
    ModelUnavailable(String),

    /// Normalized features could not be shaped into the classifier's input row.
    #[error("feature mismatch: {0}")]
    FeatureMismatch(String),

    /// Forecaster missing or unusable. Always recovered by the agent.
    #[error("forecaster unavailable: {0}")]
    ForecastUnavailable(String),

    /// Text backend unreachable, failing, or missing its credential.
    #[error("strategy synthesis unavailable: {0}")]
    SynthesisUnavailable(String),

    /// Configuration or tracking-store location could not be resolved.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A request aborted; wraps the stage error that caused it.
    #[error("strategy generation failed: {0}")]
    GenerationFailed(#[source] Box<StrategyError>),
}

pub type Result<T> = std::result::Result<T, StrategyError>;

impl StrategyError {
    /// Wrap a stage error as a request-level failure. Already wrapped errors are kept as is.
    pub fn generation_failed(cause: StrategyError) -> Self {
        match cause {
            already @ StrategyError::GenerationFailed(_) => already,
            other => StrategyError::GenerationFailed(Box::new(other)),
        }
    }

    /// Innermost stage error (self when not wrapped).
    pub fn root_cause(&self) -> &StrategyError {
        match self {
            StrategyError::GenerationFailed(inner) => inner.root_cause(),
            other => other,
        }
    }

    /// Short stable label, used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            StrategyError::ModelUnavailable(_) => "model_unavailable",
            StrategyError::FeatureMismatch(_) => "feature_mismatch",
            StrategyError::ForecastUnavailable(_) => "forecast_unavailable",
            StrategyError::SynthesisUnavailable(_) => "synthesis_unavailable",
            StrategyError::Configuration(_) => "configuration",
            StrategyError::GenerationFailed(_) => "generation_failed",
        }
    }

    /// True when the caller's input is at fault rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self.root_cause(), StrategyError::FeatureMismatch(_))
    }
}
