//! Rolling correlation statistics between instrument return series.
//!
//! All functions here are lagging: they only read the bars handed in, so a
//! reading never incorporates data newer than the evaluation timestamp.

use chrono::{DateTime, Utc};
use sentinel_core::config::{CorrelationConfig, SentinelConfig};
use sentinel_core::error::Result;
use sentinel_core::events::{Bar, BarInterval, CorrelationHealth, CorrelationReading};
use sentinel_core::traits::DataFeed;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Simple returns (percent change between consecutive closes), keyed by the
/// timestamp of the later bar.
#[must_use]
pub fn simple_returns(bars: &[Bar]) -> Vec<(DateTime<Utc>, f64)> {
    bars.windows(2)
        .filter_map(|pair| {
            let prev: f64 = pair[0].close.try_into().unwrap_or(0.0);
            let curr: f64 = pair[1].close.try_into().unwrap_or(0.0);
            if prev == 0.0 {
                None
            } else {
                Some((pair[1].timestamp, (curr - prev) / prev))
            }
        })
        .collect()
}

/// Inner-joins two return series on timestamp, preserving the first
/// series' chronological order.
#[must_use]
pub fn align(
    a: &[(DateTime<Utc>, f64)],
    b: &[(DateTime<Utc>, f64)],
) -> Vec<(f64, f64)> {
    let b_by_ts: HashMap<DateTime<Utc>, f64> = b.iter().copied().collect();
    a.iter()
        .filter_map(|(ts, ra)| b_by_ts.get(ts).map(|rb| (*ra, *rb)))
        .collect()
}

/// Pearson correlation of aligned return pairs. Returns 0.0 for degenerate
/// input (fewer than two pairs or zero variance in either series).
#[must_use]
pub fn pearson(pairs: &[(f64, f64)]) -> f64 {
    let n = pairs.len();
    if n < 2 {
        return 0.0;
    }
    let nf = n as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / nf;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / nf;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    let r = cov / denom;
    r.clamp(-1.0, 1.0)
}

/// Sample standard deviation. Returns 0.0 for fewer than two values.
fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / (n - 1) as f64;
    var.sqrt()
}

/// Correlation and correlation volatility for two bar series.
///
/// Requires at least `lookback_periods` aligned returns; anything less
/// yields exactly `{0.0, 0.0}`. The volatility is the sample standard
/// deviation of a rolling (`rolling_window`) correlation computed over the
/// same aligned window.
#[must_use]
pub fn correlation_reading(a: &[Bar], b: &[Bar], config: &CorrelationConfig) -> CorrelationReading {
    if a.len() < config.min_periods_for_valid || b.len() < config.min_periods_for_valid {
        return CorrelationReading::INVALID;
    }

    let aligned = align(&simple_returns(a), &simple_returns(b));
    if aligned.len() < config.lookback_periods {
        return CorrelationReading::INVALID;
    }

    let window = &aligned[aligned.len() - config.lookback_periods..];
    let value = pearson(window);

    let rolling: Vec<f64> = window
        .windows(config.rolling_window.max(2))
        .map(pearson)
        .collect();
    let volatility = sample_std(&rolling);

    CorrelationReading { value, volatility }
}

/// Pearson correlation over the most recent `lookback` aligned returns of
/// two bar series; 0.0 when too few aligned points exist.
#[must_use]
pub fn pair_correlation(a: &[Bar], b: &[Bar], lookback: usize) -> f64 {
    let aligned = align(&simple_returns(a), &simple_returns(b));
    if aligned.len() < lookback {
        return 0.0;
    }
    pearson(&aligned[aligned.len() - lookback..])
}

/// Grades a reading against the configured thresholds.
///
/// Volatile correlations are unreliable regardless of level; stable ones
/// grade by |value| against the healthy and breakdown thresholds. This is
/// how "unhealthy but stable" stays distinguishable from "volatile".
#[must_use]
pub fn assess_health(reading: CorrelationReading, config: &CorrelationConfig) -> CorrelationHealth {
    if reading.volatility > config.volatility_limit {
        return CorrelationHealth::Warning;
    }
    let level = reading.value.abs();
    if level >= config.healthy_threshold {
        CorrelationHealth::Healthy
    } else if level >= config.critical_breakdown {
        CorrelationHealth::Warning
    } else if level >= config.critical_breakdown * 0.75 {
        CorrelationHealth::Critical
    } else {
        CorrelationHealth::Broken
    }
}

/// Correlation health for one monitored pair.
#[derive(Debug, Clone)]
pub struct PairHealth {
    pub instrument1: String,
    pub instrument2: String,
    pub reading: CorrelationReading,
    pub health: CorrelationHealth,
    pub timestamp: DateTime<Utc>,
}

/// Fetches fresh series each check and grades correlation health for the
/// configured key pairs.
pub struct CorrelationMonitor {
    pairs: Vec<(String, String)>,
    config: CorrelationConfig,
    feed: Arc<dyn DataFeed>,
}

impl CorrelationMonitor {
    #[must_use]
    pub fn new(config: &SentinelConfig, feed: Arc<dyn DataFeed>) -> Self {
        let instruments = &config.instruments;
        let pairs = vec![
            (
                instruments.equity_index.clone(),
                instruments.carry_pair.clone(),
            ),
            (instruments.equity_index.clone(), instruments.vix.clone()),
            (
                instruments.equity_index.clone(),
                instruments.long_bond.clone(),
            ),
        ];
        Self {
            pairs,
            config: config.correlation.clone(),
            feed,
        }
    }

    /// Bars needed so that the aligned returns cover the lookback window.
    fn bars_needed(&self) -> usize {
        self.config.lookback_periods + self.config.rolling_window
    }

    /// Checks one pair from freshly fetched series.
    ///
    /// # Errors
    /// Returns `DataUnavailable` / `InsufficientHistory` when either fetch
    /// fails.
    pub async fn check_pair(&self, inst1: &str, inst2: &str) -> Result<PairHealth> {
        let bars = self.bars_needed();
        let a = self
            .feed
            .get_history(inst1, bars, BarInterval::OneMinute)
            .await?;
        let b = self
            .feed
            .get_history(inst2, bars, BarInterval::OneMinute)
            .await?;

        let reading = correlation_reading(&a, &b, &self.config);
        let health = assess_health(reading, &self.config);

        if matches!(
            health,
            CorrelationHealth::Critical | CorrelationHealth::Broken
        ) {
            warn!(
                pair = %format!("{inst1}/{inst2}"),
                correlation = reading.value,
                volatility = reading.volatility,
                "correlation breakdown"
            );
        }

        Ok(PairHealth {
            instrument1: inst1.to_string(),
            instrument2: inst2.to_string(),
            reading,
            health,
            timestamp: Utc::now(),
        })
    }

    /// Checks every configured pair; pairs that fail to fetch are logged
    /// and skipped.
    pub async fn sweep(&self) -> Vec<PairHealth> {
        let mut statuses = Vec::with_capacity(self.pairs.len());
        for (inst1, inst2) in &self.pairs {
            match self.check_pair(inst1, inst2).await {
                Ok(status) => statuses.push(status),
                Err(e) => info!(pair = %format!("{inst1}/{inst2}"), error = %e, "pair check skipped"),
            }
        }
        statuses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::bars_from_closes;

    fn config() -> CorrelationConfig {
        CorrelationConfig {
            lookback_periods: 10,
            min_periods_for_valid: 8,
            rolling_window: 5,
            ..CorrelationConfig::default()
        }
    }

    #[test]
    fn perfectly_correlated_series_reads_one() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + f64::from(i % 3)).collect();
        let a = bars_from_closes(&closes);
        let b = bars_from_closes(&closes.iter().map(|c| c * 2.0).collect::<Vec<_>>());
        let reading = correlation_reading(&a, &b, &config());
        assert!(reading.is_valid());
        assert!((reading.value - 1.0).abs() < 1e-9);
        assert!(reading.volatility >= 0.0);
    }

    #[test]
    fn anti_correlated_series_reads_minus_one() {
        let up: Vec<f64> = (0..20).map(|i| 100.0 + f64::from(i % 3)).collect();
        let down: Vec<f64> = (0..20).map(|i| 100.0 - f64::from(i % 3)).collect();
        let reading = correlation_reading(
            &bars_from_closes(&up),
            &bars_from_closes(&down),
            &config(),
        );
        assert!((reading.value + 1.0).abs() < 1e-9);
    }

    #[test]
    fn value_always_within_bounds() {
        let a: Vec<f64> = (0..25)
            .map(|i| 100.0 + (f64::from(i) * 0.7).sin() * 3.0)
            .collect();
        let b: Vec<f64> = (0..25)
            .map(|i| 50.0 + (f64::from(i) * 1.3).cos() * 2.0)
            .collect();
        let reading =
            correlation_reading(&bars_from_closes(&a), &bars_from_closes(&b), &config());
        assert!(reading.value >= -1.0 && reading.value <= 1.0);
        assert!(reading.volatility >= 0.0);
    }

    #[test]
    fn insufficient_raw_bars_is_invalid() {
        let closes: Vec<f64> = (0..5).map(|i| 100.0 + f64::from(i)).collect();
        let a = bars_from_closes(&closes);
        let b = bars_from_closes(&closes);
        let reading = correlation_reading(&a, &b, &config());
        assert_eq!(reading, CorrelationReading::INVALID);
    }

    #[test]
    fn insufficient_aligned_returns_is_invalid() {
        // Enough raw bars, but disjoint timestamps leave nothing aligned.
        let closes: Vec<f64> = (0..12).map(|i| 100.0 + f64::from(i)).collect();
        let a = bars_from_closes(&closes);
        let mut b = bars_from_closes(&closes);
        for bar in &mut b {
            bar.timestamp += chrono::Duration::seconds(17);
        }
        let reading = correlation_reading(&a, &b, &config());
        assert_eq!(reading, CorrelationReading::INVALID);
    }

    #[test]
    fn constant_series_reads_zero_not_nan() {
        let flat = vec![100.0; 20];
        let moving: Vec<f64> = (0..20).map(|i| 100.0 + f64::from(i)).collect();
        let reading = correlation_reading(
            &bars_from_closes(&flat),
            &bars_from_closes(&moving),
            &config(),
        );
        assert!(reading.value.abs() < f64::EPSILON);
        assert!(!reading.value.is_nan());
    }

    #[test]
    fn health_distinguishes_unhealthy_from_volatile() {
        let config = CorrelationConfig::default();
        // Low but stable: graded on the level, not flagged volatile.
        let stable_low = CorrelationReading {
            value: 0.30,
            volatility: 0.05,
        };
        assert_eq!(
            assess_health(stable_low, &config),
            CorrelationHealth::Critical
        );
        // Strong but volatile: unreliable.
        let volatile = CorrelationReading {
            value: 0.80,
            volatility: 0.20,
        };
        assert_eq!(assess_health(volatile, &config), CorrelationHealth::Warning);
        // Strong and stable.
        let healthy = CorrelationReading {
            value: 0.73,
            volatility: 0.05,
        };
        assert_eq!(assess_health(healthy, &config), CorrelationHealth::Healthy);
        // Collapsed.
        let broken = CorrelationReading {
            value: 0.10,
            volatility: 0.02,
        };
        assert_eq!(assess_health(broken, &config), CorrelationHealth::Broken);
    }
}
