//! VIX-adaptive risk-on/risk-off regime classification.
//!
//! Each tick fetches fresh gauge series, scores risk appetite against a
//! VIX-scaled movement threshold, and buckets the session-adjusted score
//! into one of five regimes. High correlation volatility is the primary
//! false-positive guard: it withholds classification entirely.

use crate::correlation::correlation_reading;
use chrono::Utc;
use sentinel_core::config::{
    CorrelationConfig, InstrumentsConfig, RegimeConfig, ScoreBands, SentinelConfig,
    SessionMultipliers, VixBands,
};
use sentinel_core::events::{Bar, BarInterval, RegimeClassification, RegimeStatus, RegimeType};
use sentinel_core::session::TradingSession;
use sentinel_core::traits::DataFeed;
use std::sync::Arc;
use tracing::{debug, warn};

/// VIX level band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VixCategory {
    Low,
    Moderate,
    High,
    Extreme,
}

/// Buckets a VIX level and returns the band's threshold multiplier.
#[must_use]
pub fn categorize_vix(level: f64, bands: &VixBands) -> (VixCategory, f64) {
    if level < bands.low.max {
        (VixCategory::Low, bands.low.threshold_multiplier)
    } else if level < bands.moderate.max {
        (VixCategory::Moderate, bands.moderate.threshold_multiplier)
    } else if level < bands.high.max {
        (VixCategory::High, bands.high.threshold_multiplier)
    } else {
        (VixCategory::Extreme, bands.extreme_multiplier)
    }
}

/// Maps a session-adjusted score onto a regime bucket.
///
/// The bands form a total, non-overlapping partition of the score line:
/// every score lands in exactly one bucket, boundaries included.
#[must_use]
pub fn classify_score(score: f64, bands: &ScoreBands) -> RegimeType {
    if score >= bands.strong_risk_on_min {
        RegimeType::StrongRiskOn
    } else if score >= bands.weak_risk_on_min {
        RegimeType::WeakRiskOn
    } else if score > bands.neutral_min {
        RegimeType::Neutral
    } else if score > bands.weak_risk_off_min {
        RegimeType::WeakRiskOff
    } else {
        RegimeType::StrongRiskOff
    }
}

/// Percent change from the first to the last close of a series.
fn percent_change(bars: &[Bar]) -> f64 {
    if bars.len() < 2 {
        return 0.0;
    }
    let first: f64 = bars[0].close.try_into().unwrap_or(0.0);
    let last: f64 = bars[bars.len() - 1].close.try_into().unwrap_or(0.0);
    if first == 0.0 {
        return 0.0;
    }
    (last - first) / first * 100.0
}

/// Classifies market risk appetite from multi-instrument percent changes.
pub struct RegimeEngine {
    instruments: InstrumentsConfig,
    config: RegimeConfig,
    correlation: CorrelationConfig,
    feed: Arc<dyn DataFeed>,
    last_regime: Option<RegimeType>,
}

impl RegimeEngine {
    #[must_use]
    pub fn new(config: &SentinelConfig, feed: Arc<dyn DataFeed>) -> Self {
        Self {
            instruments: config.instruments.clone(),
            config: config.regime.clone(),
            correlation: config.correlation.clone(),
            feed,
            last_regime: None,
        }
    }

    /// Runs one regime analysis for the given session.
    ///
    /// Terminal outcomes: `DataError` when any required fetch fails (no
    /// further computation), `Unreliable` when correlation volatility
    /// breaches the limit, otherwise a scored classification. The session
    /// score multiplier is applied before bucketing.
    pub async fn analyze(
        &mut self,
        session: TradingSession,
        multipliers: SessionMultipliers,
    ) -> RegimeClassification {
        let now = Utc::now();

        let equity = match self.fetch_1m(&self.instruments.equity_index).await {
            Ok(bars) => bars,
            Err(_) => return RegimeClassification::data_error(session, now),
        };
        let carry = match self.fetch_1m(&self.instruments.carry_pair).await {
            Ok(bars) => bars,
            Err(_) => return RegimeClassification::data_error(session, now),
        };
        let vix = match self.fetch_1m(&self.instruments.vix).await {
            Ok(bars) => bars,
            Err(_) => return RegimeClassification::data_error(session, now),
        };
        let bond = match self
            .feed
            .get_history(
                &self.instruments.long_bond,
                self.config.bond_bars,
                BarInterval::FiveMinutes,
            )
            .await
        {
            Ok(bars) => bars,
            Err(e) => {
                warn!(symbol = %self.instruments.long_bond, error = %e, "regime fetch failed");
                return RegimeClassification::data_error(session, now);
            }
        };

        let corr_bars = self.correlation.lookback_periods + self.correlation.rolling_window;
        let corr_equity = match self
            .feed
            .get_history(
                &self.instruments.equity_index,
                corr_bars,
                BarInterval::OneMinute,
            )
            .await
        {
            Ok(bars) => bars,
            Err(e) => {
                warn!(error = %e, "regime correlation fetch failed");
                return RegimeClassification::data_error(session, now);
            }
        };
        let corr_carry = match self
            .feed
            .get_history(
                &self.instruments.carry_pair,
                corr_bars,
                BarInterval::OneMinute,
            )
            .await
        {
            Ok(bars) => bars,
            Err(e) => {
                warn!(error = %e, "regime correlation fetch failed");
                return RegimeClassification::data_error(session, now);
            }
        };

        let vix_level: f64 = vix
            .last()
            .map(|bar| bar.close.try_into().unwrap_or(0.0))
            .unwrap_or(0.0);
        let (_, vix_multiplier) = categorize_vix(vix_level, &self.config.vix_bands);
        let threshold =
            self.config.base_threshold_percent * vix_multiplier * multipliers.threshold;

        let reading = correlation_reading(&corr_equity, &corr_carry, &self.correlation);
        if reading.volatility > self.correlation.volatility_limit {
            warn!(
                volatility = reading.volatility,
                limit = self.correlation.volatility_limit,
                "correlation volatile, regime unreliable"
            );
            return RegimeClassification::unreliable(
                session,
                reading.value,
                vix_level,
                threshold,
                now,
            );
        }

        let mut score = 0.0;
        let equity_change = percent_change(&equity);
        let carry_change = percent_change(&carry);
        let vix_change = percent_change(&vix);
        let bond_change = percent_change(&bond);

        let equity_weight = self.instruments.gauge_weight(&self.instruments.equity_index);
        if equity_change > threshold {
            score += equity_weight;
            debug!(change = equity_change, "equity gauge risk-on");
        } else if equity_change < -threshold {
            score -= equity_weight;
            debug!(change = equity_change, "equity gauge risk-off");
        }

        let carry_weight = self.instruments.gauge_weight(&self.instruments.carry_pair);
        if carry_change > threshold {
            score += carry_weight;
        } else if carry_change < -threshold {
            score -= carry_weight;
        }

        let vix_weight = self.instruments.gauge_weight(&self.instruments.vix);
        if vix_change < -self.config.vix_move_threshold {
            score += vix_weight;
            debug!(change = vix_change, "vix declining, risk-on");
        } else if vix_change > self.config.vix_move_threshold {
            score -= vix_weight;
            debug!(change = vix_change, "vix rising, risk-off");
        }

        let bond_weight = self.instruments.gauge_weight(&self.instruments.long_bond);
        if bond_change > self.config.bond_trend_threshold {
            score += bond_weight;
        } else if bond_change < -self.config.bond_trend_threshold {
            score -= bond_weight;
        }

        // Session adjustment applies to the raw score, before bucketing.
        score *= multipliers.score;

        let regime_type = classify_score(score, &self.config.score_bands);
        let confidence = self.confidence(reading.value, reading.volatility, vix_level);

        if let Some(previous) = self.last_regime {
            if previous != regime_type {
                warn!(
                    from = ?previous,
                    to = ?regime_type,
                    score,
                    "regime shift"
                );
            }
        }
        self.last_regime = Some(regime_type);

        RegimeClassification {
            status: RegimeStatus::Ok,
            regime_type,
            score,
            confidence,
            correlation_health: reading.value,
            vix_level,
            threshold_used: threshold,
            session,
            timestamp: now,
        }
    }

    async fn fetch_1m(&self, symbol: &str) -> sentinel_core::error::Result<Vec<Bar>> {
        self.feed
            .get_history(symbol, self.config.history_bars, BarInterval::OneMinute)
            .await
            .map_err(|e| {
                warn!(symbol, error = %e, "regime fetch failed");
                e
            })
    }

    /// Mean of three independently clamped [0, 1] factors: correlation
    /// strength, correlation stability, and VIX calm. Additive by design so
    /// no single weak factor zeroes the whole confidence.
    fn confidence(&self, correlation: f64, volatility: f64, vix: f64) -> f64 {
        let corr_factor = (correlation / self.config.confidence_corr_reference).clamp(0.0, 1.0);
        let stability_factor =
            (1.0 - volatility / self.correlation.volatility_limit).clamp(0.0, 1.0);
        let vix_factor = (1.0
            - (vix - self.config.confidence_vix_baseline).max(0.0)
                / self.config.confidence_vix_spread)
            .clamp(0.0, 1.0);
        (corr_factor + stability_factor + vix_factor) / 3.0
    }
}
