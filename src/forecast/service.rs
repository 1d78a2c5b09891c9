//! Horizon → trend scalar.

use tracing::debug;

use super::resolver::ForecasterHandle;
use crate::error::{Result, StrategyError};

/// Tail window averaged into the trend value (weekly source granularity).
pub const TREND_TAIL_WINDOW: usize = 4;

/// Extend the index by `horizon_periods`, predict, and average the last
/// [`TREND_TAIL_WINDOW`] points.
pub fn forecast(handle: &ForecasterHandle, horizon_periods: usize) -> Result<f64> {
    let model = handle.model();
    let index = model.make_future_index(horizon_periods)?;
    let series = model.predict(&index);
    let trend = tail_mean(&series, TREND_TAIL_WINDOW).ok_or_else(|| {
        StrategyError::ForecastUnavailable(format!(
            "forecaster {} produced no usable points",
            handle.source_uri()
        ))
    })?;
    debug!(horizon_periods, points = series.len(), trend, "Trend computed");
    Ok(trend)
}

/// Mean of the last `window` values; `None` for an empty or non-finite tail.
pub fn tail_mean(series: &[f64], window: usize) -> Option<f64> {
    let n = window.min(series.len());
    if n == 0 {
        return None;
    }
    let tail = &series[series.len() - n..];
    let mean = tail.iter().sum::<f64>() / n as f64;
    mean.is_finite().then_some(mean)
}
