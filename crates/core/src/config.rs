use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for the sentinel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub system: SystemConfig,
    pub instruments: InstrumentsConfig,
    pub correlation: CorrelationConfig,
    pub regime: RegimeConfig,
    pub divergence: DivergenceConfig,
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    pub execution: ExecutionConfig,
    pub sessions: SessionsConfig,
}

/// Control-loop cadence and reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Seconds between decision ticks. Ticks are strictly sequential.
    pub tick_interval_secs: u64,
    /// Seconds between independent margin checks.
    pub margin_monitor_interval_secs: u64,
    /// Publish a P3 status summary every this many ticks.
    pub status_every_ticks: u64,
    /// Seed for the synthetic feed, for reproducible paper sessions.
    pub feed_seed: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
            margin_monitor_interval_secs: 30,
            status_every_ticks: 5,
            feed_seed: 7,
        }
    }
}

/// One primary gauge and its scoring weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaugeWeight {
    pub symbol: String,
    pub weight: f64,
}

/// Instrument universe. The four primary gauges drive regime scoring; the
/// satellites are scanned for divergences against the equity index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentsConfig {
    /// Core equity index CFD (divergence core instrument).
    pub equity_index: String,
    /// Carry currency pair paired with the index for correlation health.
    pub carry_pair: String,
    /// Volatility index symbol.
    pub vix: String,
    /// Three-month volatility index, for the term-structure filter.
    pub vix_term: String,
    /// Long-bond yield symbol.
    pub long_bond: String,
    pub satellites: Vec<String>,
    /// Weights should sum to <= 1; the engine does not normalize them.
    pub primary_gauges: Vec<GaugeWeight>,
}

impl Default for InstrumentsConfig {
    fn default() -> Self {
        Self {
            equity_index: "US500".to_string(),
            carry_pair: "USDJPY".to_string(),
            vix: "VIX".to_string(),
            vix_term: "VIX3M".to_string(),
            long_bond: "US10Y".to_string(),
            satellites: vec![
                "DAX".to_string(),
                "NAS100".to_string(),
                "AUDJPY".to_string(),
            ],
            primary_gauges: vec![
                GaugeWeight {
                    symbol: "US500".to_string(),
                    weight: 0.35,
                },
                GaugeWeight {
                    symbol: "USDJPY".to_string(),
                    weight: 0.30,
                },
                GaugeWeight {
                    symbol: "VIX".to_string(),
                    weight: 0.20,
                },
                GaugeWeight {
                    symbol: "US10Y".to_string(),
                    weight: 0.10,
                },
            ],
        }
    }
}

impl InstrumentsConfig {
    /// Weight configured for a gauge symbol, zero when absent.
    #[must_use]
    pub fn gauge_weight(&self, symbol: &str) -> f64 {
        self.primary_gauges
            .iter()
            .find(|g| g.symbol == symbol)
            .map_or(0.0, |g| g.weight)
    }
}

/// Correlation statistics parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Aligned returns required for a valid reading.
    pub lookback_periods: usize,
    /// Minimum raw bars per series before alignment is attempted.
    pub min_periods_for_valid: usize,
    /// |correlation| at or above this is healthy.
    pub healthy_threshold: f64,
    /// |correlation| at or below this is a critical breakdown.
    pub critical_breakdown: f64,
    /// Correlation volatility above this makes the regime unreliable.
    pub volatility_limit: f64,
    /// Window of the rolling correlation whose std-dev is the volatility.
    pub rolling_window: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            lookback_periods: 20,
            min_periods_for_valid: 15,
            healthy_threshold: 0.65,
            critical_breakdown: 0.40,
            volatility_limit: 0.15,
            rolling_window: 5,
        }
    }
}

/// One VIX band: the level ceiling and the threshold multiplier applied
/// inside the band. The extreme band has no ceiling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VixBand {
    pub max: f64,
    pub threshold_multiplier: f64,
}

/// VIX-adaptive threshold bands: calm markets get a lower movement
/// threshold, turbulent markets a higher one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VixBands {
    pub low: VixBand,
    pub moderate: VixBand,
    pub high: VixBand,
    pub extreme_multiplier: f64,
}

impl Default for VixBands {
    fn default() -> Self {
        Self {
            low: VixBand {
                max: 15.0,
                threshold_multiplier: 1.0,
            },
            moderate: VixBand {
                max: 25.0,
                threshold_multiplier: 0.8,
            },
            high: VixBand {
                max: 40.0,
                threshold_multiplier: 0.6,
            },
            extreme_multiplier: 0.4,
        }
    }
}

/// Score bands mapping the regime score onto the five regime buckets.
/// The bands form a total, non-overlapping partition of the score line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreBands {
    /// score >= this: strong risk-on.
    pub strong_risk_on_min: f64,
    /// score >= this (and below strong): weak risk-on.
    pub weak_risk_on_min: f64,
    /// score > this (and below weak risk-on): neutral.
    pub neutral_min: f64,
    /// score > this (and at or below neutral_min): weak risk-off;
    /// at or below this: strong risk-off.
    pub weak_risk_off_min: f64,
}

impl Default for ScoreBands {
    fn default() -> Self {
        Self {
            strong_risk_on_min: 3.0,
            weak_risk_on_min: 1.5,
            neutral_min: -1.5,
            weak_risk_off_min: -3.0,
        }
    }
}

/// Regime engine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Base movement threshold, percent, before VIX adaptation.
    pub base_threshold_percent: f64,
    pub vix_bands: VixBands,
    pub score_bands: ScoreBands,
    /// VIX percent move that counts as a risk signal (either direction).
    pub vix_move_threshold: f64,
    /// Percent move that makes the long-bond trend rising/falling.
    pub bond_trend_threshold: f64,
    /// One-minute bars fetched per gauge series.
    pub history_bars: usize,
    /// Five-minute bars fetched for the long-bond trend.
    pub bond_bars: usize,
    /// Reference correlation for full confidence.
    pub confidence_corr_reference: f64,
    /// VIX level considered fully calm.
    pub confidence_vix_baseline: f64,
    /// VIX spread over which confidence decays to zero.
    pub confidence_vix_spread: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            base_threshold_percent: 0.2,
            vix_bands: VixBands::default(),
            score_bands: ScoreBands::default(),
            vix_move_threshold: 5.0,
            bond_trend_threshold: 0.05,
            history_bars: 15,
            bond_bars: 3,
            confidence_corr_reference: 0.7,
            confidence_vix_baseline: 15.0,
            confidence_vix_spread: 25.0,
        }
    }
}

/// Divergence detection and rejection-filter parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DivergenceConfig {
    /// Bars on each side of a fractal extremum.
    pub fractal_period: usize,
    /// One-minute bars scanned per instrument.
    pub scan_bars: usize,
    /// Bars of VIX history for the declining/rising check.
    pub vix_bars: usize,
    /// Fractional new-extreme threshold for the core instrument
    /// (0.0005 = the new low must be at least 0.05% below the prior one).
    pub new_extreme_pct: f64,
    /// Fractional higher-low / lower-high confirmation threshold for the
    /// correlated partner.
    pub confirm_pct: f64,
    /// Correlation lookback used for signal confidence.
    pub confidence_lookback: usize,
    /// Filter: reject when spot/3-month VIX exceeds this ratio.
    pub backwardation_limit: f64,
    /// Filter: reject when the core range over the scan window is below
    /// this fraction (noise).
    pub min_price_range: f64,
    /// Filter: reject when a high-impact event falls within this many
    /// minutes, past or future.
    pub news_window_minutes: i64,
    /// Filter: reject when short-window correlation falls below
    /// long-window correlation times this ratio.
    pub decay_ratio: f64,
    /// Short correlation window for the decay filter.
    pub decay_short_lookback: usize,
    /// Long correlation window for the decay filter.
    pub decay_long_lookback: usize,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            fractal_period: 5,
            scan_bars: 30,
            vix_bars: 10,
            new_extreme_pct: 0.0005,
            confirm_pct: 0.0002,
            confidence_lookback: 20,
            backwardation_limit: 1.02,
            min_price_range: 0.003,
            news_window_minutes: 30,
            decay_ratio: 0.7,
            decay_short_lookback: 10,
            decay_long_lookback: 20,
        }
    }
}

/// Signal assembly parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Minimum divergence confidence to act on.
    pub min_divergence_confidence: f64,
    /// Minimum regime confidence for a regime-only proposal.
    pub min_regime_confidence: f64,
    /// Stop distance, fraction of entry, for divergence proposals.
    pub divergence_stop_pct: f64,
    /// Target distance, fraction of entry, for divergence proposals.
    pub divergence_target_pct: f64,
    /// Stop distance for regime-only proposals.
    pub regime_stop_pct: f64,
    /// Target distance for regime-only proposals.
    pub regime_target_pct: f64,
    /// Confidence boost when divergence direction agrees with the regime.
    pub aligned_confidence_boost: f64,
    /// Hard ceiling on boosted confidence.
    pub confidence_cap: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            min_divergence_confidence: 0.65,
            min_regime_confidence: 0.70,
            divergence_stop_pct: 0.0025,
            divergence_target_pct: 0.005,
            regime_stop_pct: 0.003,
            regime_target_pct: 0.01,
            aligned_confidence_boost: 1.2,
            confidence_cap: 0.95,
        }
    }
}

/// Risk sizing and margin parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Percent of equity risked per trade before reductions.
    pub max_per_trade_risk_percent: f64,
    /// Percent of equity risked per GMT day across all trades.
    pub max_daily_risk_percent: f64,
    /// Confidence below this halves the risk.
    pub confidence_floor: f64,
    /// Multiplier applied when the instrument has an active divergence.
    pub divergence_penalty: f64,
    /// Multiplier applied by the post-trade watcher on correlation break.
    pub correlation_break_penalty: f64,
    pub max_leverage: u32,
    /// Daily swap cost (dollars, negative) below which size is reduced.
    pub swap_cost_floor: f64,
    /// Reduction factor applied on a swap-cost breach.
    pub swap_reduction_factor: f64,
    /// Fraction of equity margin may occupy, enforced exactly.
    pub margin_utilization_cap: f64,
    /// Annualized swap rates per instrument (negative = cost).
    pub swap_rates: HashMap<String, f64>,
    /// Rate used for instruments missing from the table.
    pub default_swap_rate: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        let mut swap_rates = HashMap::new();
        swap_rates.insert("US500".to_string(), -0.03);
        swap_rates.insert("USDJPY".to_string(), -0.02);
        swap_rates.insert("DAX".to_string(), -0.035);
        swap_rates.insert("NAS100".to_string(), -0.03);
        swap_rates.insert("AUDJPY".to_string(), -0.025);
        Self {
            max_per_trade_risk_percent: 1.8,
            max_daily_risk_percent: 3.0,
            confidence_floor: 0.65,
            divergence_penalty: 0.5,
            correlation_break_penalty: 0.3,
            max_leverage: 30,
            swap_cost_floor: -10.0,
            swap_reduction_factor: 0.7,
            margin_utilization_cap: 0.7,
            swap_rates,
            default_swap_rate: -0.03,
        }
    }
}

impl RiskConfig {
    /// Annualized swap rate for an instrument.
    #[must_use]
    pub fn swap_rate(&self, instrument: &str) -> f64 {
        self.swap_rates
            .get(instrument)
            .copied()
            .unwrap_or(self.default_swap_rate)
    }
}

/// Confirmation, readiness, and alerting parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Seconds the gate waits for a human response.
    pub confirmation_timeout_secs: u64,
    /// Acknowledgment window attached to the P1 trade alert.
    pub alert_ack_timeout_secs: u64,
    /// Bound of the outbound alert queue.
    pub alert_queue_size: usize,
    /// Maximum P0 alerts per rate window; excess is delayed, never dropped.
    pub p0_rate_limit: usize,
    /// P0 sliding rate window, seconds.
    pub p0_rate_window_secs: u64,
    /// Losses within the loss window that suspend trading.
    pub recent_loss_limit: usize,
    /// Trailing window, minutes, for the recent-loss count.
    pub loss_window_minutes: i64,
    /// Fraction of the daily loss limit that forces rejection.
    pub daily_loss_ratio: f64,
    /// Low-liquidity blackout window start hour (GMT, inclusive).
    pub blackout_start_hour: u32,
    /// Blackout window end hour (GMT, exclusive). Equal hours disable it.
    pub blackout_end_hour: u32,
    /// Optional webhook endpoint for outbound alerts.
    pub webhook_url: Option<String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_secs: 30,
            alert_ack_timeout_secs: 300,
            alert_queue_size: 64,
            p0_rate_limit: 3,
            p0_rate_window_secs: 900,
            recent_loss_limit: 3,
            loss_window_minutes: 60,
            daily_loss_ratio: 0.7,
            blackout_start_hour: 0,
            blackout_end_hour: 5,
            webhook_url: None,
        }
    }
}

/// Multipliers one session applies to the pipeline's parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionMultipliers {
    /// Scales the regime movement threshold.
    pub threshold: f64,
    /// Scales the raw regime score before bucketing.
    pub score: f64,
    /// Scales the per-trade risk.
    pub position_size: f64,
}

/// Per-session multiplier table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub asian: SessionMultipliers,
    pub european: SessionMultipliers,
    pub us_overlap: SessionMultipliers,
    pub us_only: SessionMultipliers,
    pub closed: SessionMultipliers,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            asian: SessionMultipliers {
                threshold: 0.6,
                score: 1.4,
                position_size: 0.5,
            },
            european: SessionMultipliers {
                threshold: 0.85,
                score: 1.0,
                position_size: 0.75,
            },
            us_overlap: SessionMultipliers {
                threshold: 1.0,
                score: 1.0,
                position_size: 1.0,
            },
            us_only: SessionMultipliers {
                threshold: 0.9,
                score: 0.9,
                position_size: 0.8,
            },
            closed: SessionMultipliers {
                threshold: 1.0,
                score: 0.0,
                position_size: 0.0,
            },
        }
    }
}
