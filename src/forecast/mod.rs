//! Trend forecasting: artifact model, lazy resolution, and the trend scalar.

pub mod model;
mod resolver;
mod service;

pub use model::{
    Forecaster, Seasonality, TrendParams, TrendSeasonalModel, MAX_FREQ_DAYS, MAX_INDEX_LEN, MODEL_FILE,
};
pub use resolver::{
    ForecastLocator, ForecastResolver, ForecasterHandle, ResolverStats, ResolverStatus,
};
pub use service::{forecast, tail_mean, TREND_TAIL_WINDOW};
