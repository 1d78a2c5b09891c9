//! Additive trend + seasonality forecaster.
//!
//! `yhat(ds) = y_scale * (trend(t) + Σ seasonality(ds))` where `t` is time
//! scaled to `[0, 1]` over the training history and the trend is piecewise
//! linear with rate changes at `changepoints`.

use std::f64::consts::PI;
use std::path::Path;

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::artifact::read_verified;
use crate::error::{Result, StrategyError};

/// Artifact file name inside a logged forecaster directory.
pub const MODEL_FILE: &str = "model.json";

/// Longest spacing between periods a model may declare.
pub const MAX_FREQ_DAYS: i64 = 366;
/// Upper bound on history plus horizon periods in one prediction.
pub const MAX_INDEX_LEN: usize = 100_000;

/// Forecaster seam: extend the time index, then predict over it.
pub trait Forecaster: Send + Sync {
    /// History dates followed by `periods` future dates.
    ///
    /// Fails with `ForecastUnavailable` when the index would leave the
    /// representable date range or exceed [`MAX_INDEX_LEN`].
    fn make_future_index(&self, periods: usize) -> Result<Vec<NaiveDate>>;
    fn predict(&self, index: &[NaiveDate]) -> Vec<f64>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendParams {
    /// Base growth rate.
    pub k: f64,
    /// Base offset.
    pub m: f64,
    /// Changepoint locations in scaled time.
    #[serde(default)]
    pub changepoints: Vec<f64>,
    /// Rate adjustments, one per changepoint.
    #[serde(default)]
    pub deltas: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seasonality {
    pub name: String,
    pub period_days: f64,
    /// `[a_n, b_n]` for n = 1..=order.
    pub fourier: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSeasonalModel {
    /// First history date.
    pub start: NaiveDate,
    /// Spacing between consecutive periods.
    pub freq_days: i64,
    /// Number of history periods the model was fitted on.
    pub history_len: usize,
    #[serde(default = "one")]
    pub y_scale: f64,
    pub trend: TrendParams,
    #[serde(default)]
    pub seasonalities: Vec<Seasonality>,
}

fn one() -> f64 {
    1.0
}

impl TrendSeasonalModel {
    pub fn load(dir_or_file: &Path) -> Result<Self> {
        let file = if dir_or_file.is_dir() {
            dir_or_file.join(MODEL_FILE)
        } else {
            dir_or_file.to_path_buf()
        };
        let bytes = read_verified(&file, None).map_err(StrategyError::ForecastUnavailable)?;
        let model: Self = serde_json::from_slice(&bytes).map_err(|e| {
            StrategyError::ForecastUnavailable(format!("parsing {}: {e}", file.display()))
        })?;
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<()> {
        let bad = |msg: &str| Err(StrategyError::ForecastUnavailable(msg.to_string()));
        if !(1..=MAX_FREQ_DAYS).contains(&self.freq_days) {
            return bad("freq_days must be between 1 and 366");
        }
        if !(1..=MAX_INDEX_LEN).contains(&self.history_len) {
            return bad("history_len must be between 1 and 100000");
        }
        if self.trend.changepoints.len() != self.trend.deltas.len() {
            return bad("changepoints and deltas differ in length");
        }
        let finite = [self.y_scale, self.trend.k, self.trend.m]
            .iter()
            .chain(&self.trend.changepoints)
            .chain(&self.trend.deltas)
            .all(|v| v.is_finite());
        if !finite {
            return bad("non-finite trend parameters");
        }
        for s in &self.seasonalities {
            if !(s.period_days.is_finite() && s.period_days > 0.0) {
                return bad("seasonality period must be positive");
            }
            if s.fourier.iter().flatten().any(|v| !v.is_finite()) {
                return bad("non-finite seasonality coefficients");
            }
        }
        Ok(())
    }

    /// Span of the history in days; at least one period so `t` stays finite.
    fn t_scale_days(&self) -> f64 {
        let freq = self.freq_days as f64;
        (self.history_len.saturating_sub(1) as f64 * freq).max(freq)
    }

    fn trend_at(&self, t: f64) -> f64 {
        let mut rate = self.trend.k;
        let mut offset = self.trend.m;
        for (cp, delta) in self.trend.changepoints.iter().zip(&self.trend.deltas) {
            if t >= *cp {
                rate += delta;
                offset -= cp * delta;
            }
        }
        rate * t + offset
    }

    fn seasonal_at(&self, days_since_epoch: f64) -> f64 {
        self.seasonalities
            .iter()
            .map(|s| {
                s.fourier
                    .iter()
                    .enumerate()
                    .map(|(i, [a, b])| {
                        let x = 2.0 * PI * (i as f64 + 1.0) * days_since_epoch / s.period_days;
                        a * x.cos() + b * x.sin()
                    })
                    .sum::<f64>()
            })
            .sum()
    }
}

impl Forecaster for TrendSeasonalModel {
    fn make_future_index(&self, periods: usize) -> Result<Vec<NaiveDate>> {
        let total = self
            .history_len
            .checked_add(periods)
            .filter(|n| *n <= MAX_INDEX_LEN)
            .ok_or_else(|| {
                StrategyError::ForecastUnavailable(format!(
                    "{} history + {periods} future periods exceeds {MAX_INDEX_LEN}",
                    self.history_len
                ))
            })?;
        (0..total)
            .map(|i| {
                i64::try_from(i)
                    .ok()
                    .and_then(|i| i.checked_mul(self.freq_days))
                    .and_then(TimeDelta::try_days)
                    .and_then(|offset| self.start.checked_add_signed(offset))
                    .ok_or_else(|| {
                        StrategyError::ForecastUnavailable(format!(
                            "period {i} is outside the supported date range"
                        ))
                    })
            })
            .collect()
    }

    fn predict(&self, index: &[NaiveDate]) -> Vec<f64> {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
        let scale = self.t_scale_days();
        index
            .iter()
            .map(|ds| {
                let t = (*ds - self.start).num_days() as f64 / scale;
                let d = (*ds - epoch).num_days() as f64;
                self.y_scale * (self.trend_at(t) + self.seasonal_at(d))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(k: f64, m: f64) -> TrendSeasonalModel {
        TrendSeasonalModel {
            start: NaiveDate::from_ymd_opt(2008, 5, 5).unwrap(),
            freq_days: 7,
            history_len: 11,
            y_scale: 100.0,
            trend: TrendParams {
                k,
                m,
                changepoints: vec![],
                deltas: vec![],
            },
            seasonalities: vec![],
        }
    }

    #[test]
    fn future_index_includes_history() {
        let m = linear(1.0, 0.0);
        let idx = m.make_future_index(3).unwrap();
        assert_eq!(idx.len(), 14);
        assert_eq!(idx[0], m.start);
        assert_eq!(idx[13], NaiveDate::from_ymd_opt(2008, 8, 4).unwrap());
    }

    #[test]
    fn linear_trend_hits_endpoints() {
        let m = linear(1.0, 0.5);
        let idx = m.make_future_index(0).unwrap();
        let y = m.predict(&idx);
        assert!((y[0] - 50.0).abs() < 1e-9);
        assert!((y[10] - 150.0).abs() < 1e-9);
    }

    #[test]
    fn changepoint_bends_the_trend_continuously() {
        let mut m = linear(1.0, 0.0);
        m.trend.changepoints = vec![0.5];
        m.trend.deltas = vec![-1.0];
        let idx = m.make_future_index(0).unwrap();
        let y = m.predict(&idx);
        // rate drops to zero at t = 0.5 and the curve stays continuous
        assert!((y[5] - 50.0).abs() < 1e-9);
        assert!((y[10] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn validate_rejects_out_of_range_spacing() {
        let mut m = linear(1.0, 0.0);
        m.freq_days = 200_000_000_000_000;
        assert!(matches!(m.validate(), Err(StrategyError::ForecastUnavailable(_))));
        m.freq_days = 7;
        m.history_len = MAX_INDEX_LEN + 1;
        assert!(matches!(m.validate(), Err(StrategyError::ForecastUnavailable(_))));
    }

    #[test]
    fn oversized_horizon_is_an_error_not_a_panic() {
        let m = linear(1.0, 0.0);
        assert!(matches!(
            m.make_future_index(usize::MAX),
            Err(StrategyError::ForecastUnavailable(_))
        ));
        assert!(m.make_future_index(MAX_INDEX_LEN).is_err());
    }

    #[test]
    fn index_past_the_last_representable_date_is_an_error() {
        // Skips validation, as a hand-built model could.
        let mut m = linear(1.0, 0.0);
        m.freq_days = 200_000_000_000_000;
        m.history_len = 3;
        assert!(matches!(
            m.make_future_index(4),
            Err(StrategyError::ForecastUnavailable(_))
        ));
    }

    #[test]
    fn validate_rejects_mismatched_changepoints() {
        let mut m = linear(1.0, 0.0);
        m.trend.changepoints = vec![0.5];
        assert!(matches!(m.validate(), Err(StrategyError::ForecastUnavailable(_))));
    }
}
