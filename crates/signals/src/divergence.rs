//! Price/correlation divergence detection with false-positive suppression.
//!
//! A divergence is price weakness (or strength) in the core instrument that
//! its usual correlated partner refuses to confirm, while volatility agrees.
//! Every raw signal must clear four independent rejection filters, in order,
//! before it is surfaced; the first failing filter is the one reason logged.

use crate::correlation::pair_correlation;
use chrono::Utc;
use sentinel_core::config::{DivergenceConfig, InstrumentsConfig, SentinelConfig};
use sentinel_core::error::{Result, SentinelError};
use sentinel_core::events::{Bar, BarInterval, DivergenceKind, DivergenceSignal, NewsImpact};
use sentinel_core::traits::{DataFeed, NewsCalendar};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fractal lows: bars whose low is the strict minimum of a symmetric
/// `period`-bar window on each side. Falls back to the window minimum when
/// no bar qualifies, so callers always have a reference level.
#[must_use]
pub fn fractal_lows(bars: &[Bar], period: usize) -> Vec<f64> {
    let lows: Vec<f64> = bars
        .iter()
        .map(|bar| bar.low.try_into().unwrap_or(0.0))
        .collect();
    let mut found = Vec::new();
    if lows.len() > 2 * period {
        for i in period..lows.len() - period {
            let is_low = (1..=period).all(|j| lows[i] < lows[i - j] && lows[i] < lows[i + j]);
            if is_low {
                found.push(lows[i]);
            }
        }
    }
    if found.is_empty() {
        if let Some(min) = lows.iter().copied().reduce(f64::min) {
            found.push(min);
        }
    }
    found
}

/// Fractal highs, mirror of `fractal_lows`.
#[must_use]
pub fn fractal_highs(bars: &[Bar], period: usize) -> Vec<f64> {
    let highs: Vec<f64> = bars
        .iter()
        .map(|bar| bar.high.try_into().unwrap_or(0.0))
        .collect();
    let mut found = Vec::new();
    if highs.len() > 2 * period {
        for i in period..highs.len() - period {
            let is_high = (1..=period).all(|j| highs[i] > highs[i - j] && highs[i] > highs[i + j]);
            if is_high {
                found.push(highs[i]);
            }
        }
    }
    if found.is_empty() {
        if let Some(max) = highs.iter().copied().reduce(f64::max) {
            found.push(max);
        }
    }
    found
}

fn last_close(bars: &[Bar]) -> f64 {
    bars.last()
        .map(|bar| bar.close.try_into().unwrap_or(0.0))
        .unwrap_or(0.0)
}

fn first_close(bars: &[Bar]) -> f64 {
    bars.first()
        .map(|bar| bar.close.try_into().unwrap_or(0.0))
        .unwrap_or(0.0)
}

/// Detects divergences between the core pair and each satellite, passing
/// every raw signal through the rejection filter chain.
pub struct DivergenceEngine {
    instruments: InstrumentsConfig,
    config: DivergenceConfig,
    feed: Arc<dyn DataFeed>,
    calendar: Arc<dyn NewsCalendar>,
}

impl DivergenceEngine {
    #[must_use]
    pub fn new(
        config: &SentinelConfig,
        feed: Arc<dyn DataFeed>,
        calendar: Arc<dyn NewsCalendar>,
    ) -> Self {
        Self {
            instruments: config.instruments.clone(),
            config: config.divergence.clone(),
            feed,
            calendar,
        }
    }

    /// Scans all configured pairs and returns only signals that cleared
    /// every filter. A signal that fails a filter is dropped and the
    /// filter's name logged; detection errors skip the pair.
    pub async fn scan(&self) -> Vec<DivergenceSignal> {
        let core = self.instruments.equity_index.clone();
        let mut pairs = vec![(self.instruments.carry_pair.clone(), core.clone())];
        for satellite in &self.instruments.satellites {
            pairs.push((satellite.clone(), satellite.clone()));
        }

        let mut accepted = Vec::new();
        for (partner, signal_instrument) in pairs {
            let raw = match self.detect_pair(&core, &partner, &signal_instrument).await {
                Ok(signal) => signal,
                Err(e) => {
                    debug!(partner = %partner, error = %e, "divergence check skipped");
                    continue;
                }
            };
            let Some(signal) = raw else { continue };

            match self.validate(&signal).await {
                Ok(()) => {
                    info!(
                        kind = ?signal.kind,
                        instrument = %signal.instrument,
                        magnitude = signal.magnitude,
                        confidence = signal.confidence,
                        "divergence accepted"
                    );
                    accepted.push(signal);
                }
                Err(SentinelError::FilterRejected { filter }) => {
                    info!(
                        instrument = %signal.instrument,
                        filter, "divergence rejected"
                    );
                }
                Err(e) => {
                    warn!(instrument = %signal.instrument, error = %e, "divergence validation error");
                }
            }
        }
        accepted
    }

    /// Checks one (core, partner) pair for a fractal divergence.
    ///
    /// Bullish: the core makes a new fractal low the partner refuses to
    /// confirm (higher low) while the volatility index declines. Bearish is
    /// the mirror on highs.
    ///
    /// # Errors
    /// Propagates feed failures for either series.
    pub async fn detect_pair(
        &self,
        core: &str,
        partner: &str,
        signal_instrument: &str,
    ) -> Result<Option<DivergenceSignal>> {
        let core_bars = self
            .feed
            .get_history(core, self.config.scan_bars, BarInterval::OneMinute)
            .await?;
        let partner_bars = self
            .feed
            .get_history(partner, self.config.scan_bars, BarInterval::OneMinute)
            .await?;
        let vix_bars = self
            .feed
            .get_history(
                &self.instruments.vix,
                self.config.vix_bars,
                BarInterval::OneMinute,
            )
            .await?;

        let correlation =
            pair_correlation(&core_bars, &partner_bars, self.config.confidence_lookback);
        let vix_declining = last_close(&vix_bars) < first_close(&vix_bars);
        let vix_rising = last_close(&vix_bars) > first_close(&vix_bars);

        let core_lows = fractal_lows(&core_bars, self.config.fractal_period);
        let partner_lows = fractal_lows(&partner_bars, self.config.fractal_period);
        if core_lows.len() >= 2 && partner_lows.len() >= 2 {
            let core_prev = core_lows[core_lows.len() - 2];
            let core_last = core_lows[core_lows.len() - 1];
            let partner_prev = partner_lows[partner_lows.len() - 2];
            let partner_last = partner_lows[partner_lows.len() - 1];

            let core_new_low = core_last < core_prev * (1.0 - self.config.new_extreme_pct);
            let partner_higher_low = partner_last > partner_prev * (1.0 + self.config.confirm_pct);
            if core_new_low && partner_higher_low && vix_declining {
                let magnitude = ((core_prev - core_last) / core_prev).abs();
                return Ok(Some(DivergenceSignal {
                    kind: DivergenceKind::Bullish,
                    instrument: signal_instrument.to_string(),
                    magnitude,
                    confidence: signal_strength(magnitude, correlation),
                    correlation,
                    timestamp: Utc::now(),
                }));
            }
        }

        let core_highs = fractal_highs(&core_bars, self.config.fractal_period);
        let partner_highs = fractal_highs(&partner_bars, self.config.fractal_period);
        if core_highs.len() >= 2 && partner_highs.len() >= 2 {
            let core_prev = core_highs[core_highs.len() - 2];
            let core_last = core_highs[core_highs.len() - 1];
            let partner_prev = partner_highs[partner_highs.len() - 2];
            let partner_last = partner_highs[partner_highs.len() - 1];

            let core_new_high = core_last > core_prev * (1.0 + self.config.new_extreme_pct);
            let partner_lower_high = partner_last < partner_prev * (1.0 - self.config.confirm_pct);
            if core_new_high && partner_lower_high && vix_rising {
                let magnitude = ((core_last - core_prev) / core_prev).abs();
                return Ok(Some(DivergenceSignal {
                    kind: DivergenceKind::Bearish,
                    instrument: signal_instrument.to_string(),
                    magnitude,
                    confidence: signal_strength(magnitude, correlation),
                    correlation,
                    timestamp: Utc::now(),
                }));
            }
        }

        Ok(None)
    }

    /// Runs the four rejection filters in order. All must pass; the first
    /// failure short-circuits and is the one reason surfaced.
    ///
    /// # Errors
    /// `FilterRejected` naming the failing filter. A filter whose own data
    /// fetch fails rejects conservatively under its own name.
    pub async fn validate(&self, _signal: &DivergenceSignal) -> Result<()> {
        self.filter_term_structure().await?;
        self.filter_price_range().await?;
        self.filter_news().await?;
        self.filter_correlation_decay().await?;
        Ok(())
    }

    /// Rejects when the VIX term structure is in backwardation beyond the
    /// configured ratio (spot bid over the 3-month, panic conditions).
    pub(crate) async fn filter_term_structure(&self) -> Result<()> {
        const NAME: &str = "vix_term_structure";
        let spot = self.quote_price(&self.instruments.vix, NAME).await?;
        let term = self.quote_price(&self.instruments.vix_term, NAME).await?;
        if term <= 0.0 {
            return Err(SentinelError::FilterRejected { filter: NAME });
        }
        let ratio = spot / term;
        if ratio > self.config.backwardation_limit {
            warn!(ratio, "vix term structure backwardated");
            return Err(SentinelError::FilterRejected { filter: NAME });
        }
        Ok(())
    }

    /// Rejects when the core instrument's recent range is too small to
    /// distinguish a divergence from noise.
    pub(crate) async fn filter_price_range(&self) -> Result<()> {
        const NAME: &str = "price_range";
        let bars = match self
            .feed
            .get_history(
                &self.instruments.equity_index,
                self.config.scan_bars,
                BarInterval::OneMinute,
            )
            .await
        {
            Ok(bars) => bars,
            Err(e) => {
                warn!(error = %e, "range filter data error, rejecting");
                return Err(SentinelError::FilterRejected { filter: NAME });
            }
        };

        let highs = bars.iter().map(|b| b.high.try_into().unwrap_or(0.0));
        let lows = bars.iter().map(|b| b.low.try_into().unwrap_or(f64::MAX));
        let max_high: f64 = highs.fold(0.0, f64::max);
        let min_low: f64 = lows.fold(f64::MAX, f64::min);
        if min_low <= 0.0 || min_low == f64::MAX {
            return Err(SentinelError::FilterRejected { filter: NAME });
        }
        let range = (max_high - min_low) / min_low;
        if range < self.config.min_price_range {
            debug!(range, "price range below noise floor");
            return Err(SentinelError::FilterRejected { filter: NAME });
        }
        Ok(())
    }

    /// Rejects when a high-impact scheduled event falls inside the window.
    pub(crate) async fn filter_news(&self) -> Result<()> {
        const NAME: &str = "news";
        let window = self.config.news_window_minutes;
        let events = match self.calendar.get_events(window, window).await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "news filter data error, rejecting");
                return Err(SentinelError::FilterRejected { filter: NAME });
            }
        };
        if let Some(event) = events.iter().find(|e| e.impact == NewsImpact::High) {
            info!(title = %event.title, "high-impact news inside window");
            return Err(SentinelError::FilterRejected { filter: NAME });
        }
        Ok(())
    }

    /// Rejects when the core-pair correlation is decaying: the short-window
    /// reading has dropped below the long-window reading by more than the
    /// configured ratio.
    pub(crate) async fn filter_correlation_decay(&self) -> Result<()> {
        const NAME: &str = "correlation_decay";
        let core = match self
            .feed
            .get_history(
                &self.instruments.equity_index,
                self.config.scan_bars,
                BarInterval::OneMinute,
            )
            .await
        {
            Ok(bars) => bars,
            Err(e) => {
                warn!(error = %e, "decay filter data error, rejecting");
                return Err(SentinelError::FilterRejected { filter: NAME });
            }
        };
        let partner = match self
            .feed
            .get_history(
                &self.instruments.carry_pair,
                self.config.scan_bars,
                BarInterval::OneMinute,
            )
            .await
        {
            Ok(bars) => bars,
            Err(e) => {
                warn!(error = %e, "decay filter data error, rejecting");
                return Err(SentinelError::FilterRejected { filter: NAME });
            }
        };

        let recent = pair_correlation(&core, &partner, self.config.decay_short_lookback);
        let longer = pair_correlation(&core, &partner, self.config.decay_long_lookback);
        if recent < longer * self.config.decay_ratio {
            warn!(recent, longer, "correlation decaying");
            return Err(SentinelError::FilterRejected { filter: NAME });
        }
        Ok(())
    }

    async fn quote_price(&self, symbol: &str, filter: &'static str) -> Result<f64> {
        match self.feed.get_quote(symbol).await {
            Ok(quote) => Ok(quote.price.try_into().unwrap_or(0.0)),
            Err(e) => {
                warn!(symbol, error = %e, "filter quote error, rejecting");
                Err(SentinelError::FilterRejected { filter })
            }
        }
    }
}

/// Confidence of a divergence from its magnitude and the pair correlation.
/// A 1% extrema delta saturates the magnitude component; correlation at the
/// 0.7 reference saturates the correlation component.
fn signal_strength(magnitude: f64, correlation: f64) -> f64 {
    let magnitude_score = (magnitude / 0.01).min(1.0);
    let correlation_score = (correlation / 0.7).clamp(0.3, 1.0);
    magnitude_score * 0.6 + correlation_score * 0.4
}
