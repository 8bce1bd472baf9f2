//! Leverage-aware position sizing for CFD proposals.
//!
//! A deterministic cascade of adjustments, each strictly reducing or leaving
//! the risk amount unchanged. The cascade never increases risk beyond the
//! per-trade base, and the final result always respects the margin
//! utilization cap and the remaining daily budget.

use crate::ledger::DailyRiskLedger;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sentinel_core::config::{CorrelationConfig, RiskConfig, SentinelConfig};
use sentinel_core::error::{Result, SentinelError};
use sentinel_core::events::{PositionSizingResult, TradeProposal};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{info, warn};

/// Converts an f64 parameter through its shortest decimal representation,
/// avoiding binary-float dust in money arithmetic.
fn dec(value: f64) -> Decimal {
    Decimal::from_str(&value.to_string()).unwrap_or(Decimal::ZERO)
}

/// Sizes proposals against account equity, regime strength, carrying costs,
/// margin headroom, and the daily risk budget.
pub struct RiskSizer {
    config: RiskConfig,
    correlation: CorrelationConfig,
    ledger: Mutex<DailyRiskLedger>,
    active_divergences: Mutex<HashSet<String>>,
}

impl RiskSizer {
    #[must_use]
    pub fn new(config: &SentinelConfig, ledger: DailyRiskLedger) -> Self {
        Self {
            config: config.risk.clone(),
            correlation: config.correlation.clone(),
            ledger: Mutex::new(ledger),
            active_divergences: Mutex::new(HashSet::new()),
        }
    }

    /// Flags an instrument as carrying an active divergence, which halves
    /// (by the configured penalty) any position sized on it.
    pub fn mark_divergence(&self, instrument: &str) {
        self.active_divergences
            .lock()
            .expect("divergence set poisoned")
            .insert(instrument.to_string());
    }

    /// Clears an instrument's divergence flag.
    pub fn clear_divergence(&self, instrument: &str) {
        self.active_divergences
            .lock()
            .expect("divergence set poisoned")
            .remove(instrument);
    }

    /// Projected daily overnight financing cost for a position value
    /// (negative = cost to the trader).
    #[must_use]
    pub fn project_swap_cost(&self, instrument: &str, position_value: Decimal) -> Decimal {
        let annual_rate = dec(self.config.swap_rate(instrument));
        position_value * annual_rate / Decimal::from(365)
    }

    /// Runs the sizing cascade for a proposal.
    ///
    /// Steps, each monotone non-increasing on the risk amount:
    /// 1. base risk from the per-trade percent of equity (scaled by the
    ///    session size multiplier, itself capped at 1);
    /// 2. halved below the confidence floor;
    /// 3. scaled by `min(1, |regime score| / 2)`;
    /// 4. divergence penalty when the instrument is flagged, and the
    ///    correlation-break penalty when the core correlation has
    ///    collapsed below the breakdown threshold;
    /// 5. swap-cost reduction when the projected overnight cost breaches
    ///    the floor;
    /// 6. margin utilization capped at exactly the configured fraction of
    ///    equity;
    /// 7. clamped to the remaining daily budget.
    ///
    /// # Errors
    /// `RiskBudgetExhausted` when the daily budget has no room left.
    pub fn size(
        &self,
        proposal: &TradeProposal,
        equity: Decimal,
        session_size_multiplier: f64,
        now: DateTime<Utc>,
    ) -> Result<PositionSizingResult> {
        let mut reasoning: Vec<String> = Vec::new();

        if equity <= Decimal::ZERO {
            return Ok(PositionSizingResult::zero("no equity"));
        }

        let stop_distance = (proposal.entry - proposal.stop).abs();
        if stop_distance.is_zero() {
            warn!(proposal = %proposal.id, "stop distance is zero");
            return Ok(PositionSizingResult::zero("stop distance is zero"));
        }

        // 1. Base risk, session-scaled.
        let per_trade = dec(self.config.max_per_trade_risk_percent / 100.0);
        let mut risk = equity * per_trade;
        let session_multiplier = dec(session_size_multiplier).min(Decimal::ONE);
        if session_multiplier < Decimal::ONE {
            risk *= session_multiplier;
            reasoning.push(format!("session multiplier {session_size_multiplier:.2}"));
        }

        // 2. Confidence.
        if proposal.confidence < self.config.confidence_floor {
            risk *= dec(0.5);
            reasoning.push(format!("low confidence {:.2}: halved", proposal.confidence));
        }

        // 3. Regime strength.
        let regime_adjustment = (proposal.regime.score.abs() / 2.0).min(1.0);
        if regime_adjustment < 1.0 {
            risk *= dec(regime_adjustment);
            reasoning.push(format!("regime adjustment {regime_adjustment:.2}"));
        }

        // 4. Divergence penalty.
        let flagged = self
            .active_divergences
            .lock()
            .expect("divergence set poisoned")
            .contains(&proposal.instrument);
        if flagged {
            risk *= dec(self.config.divergence_penalty);
            reasoning.push(format!(
                "divergence penalty {:.2}",
                self.config.divergence_penalty
            ));
        }

        // An unhealthy core correlation (stable or not) still sizes down,
        // even when the regime engine was willing to score.
        let correlation = proposal.regime.correlation_health.abs();
        if correlation < self.correlation.critical_breakdown {
            risk *= dec(self.config.correlation_break_penalty);
            reasoning.push(format!("correlation breakdown {correlation:.2}"));
        }

        let stop_fraction = stop_distance / proposal.entry;
        let mut position_value = risk / stop_fraction;

        // 5. Swap-cost projection.
        let swap_cost = self.project_swap_cost(&proposal.instrument, position_value);
        if swap_cost < dec(self.config.swap_cost_floor) {
            let factor = dec(self.config.swap_reduction_factor);
            risk *= factor;
            position_value *= factor;
            reasoning.push(format!("swap cost {swap_cost:.2}/day: reduced"));
        }

        // 6. Margin utilization cap, enforced exactly.
        let max_leverage = Decimal::from(self.config.max_leverage);
        let mut margin_required = position_value / max_leverage;
        let margin_cap = equity * dec(self.config.margin_utilization_cap);
        if margin_required > margin_cap {
            let scale = margin_cap / margin_required;
            risk *= scale;
            position_value = margin_cap * max_leverage;
            margin_required = margin_cap;
            reasoning.push(format!("margin cap: scaled by {scale:.4}"));
        }

        // 7. Daily risk budget.
        let max_daily = equity * dec(self.config.max_daily_risk_percent / 100.0);
        let mut ledger = self.ledger.lock().expect("risk ledger poisoned");
        let remaining = ledger.remaining(now, max_daily);
        if remaining.is_zero() {
            return Err(SentinelError::RiskBudgetExhausted {
                remaining: remaining.round_dp(2).to_string(),
            });
        }
        if risk > remaining {
            let scale = remaining / risk;
            risk = remaining;
            position_value *= scale;
            margin_required = position_value / max_leverage;
            reasoning.push(format!("daily budget: {remaining:.2} remaining"));
        }
        drop(ledger);

        let position_size = position_value / proposal.entry;
        let leverage_used = if margin_required.is_zero() {
            Decimal::ZERO
        } else {
            position_value / margin_required
        };

        info!(
            proposal = %proposal.id,
            risk = %risk.round_dp(2),
            margin = %margin_required.round_dp(2),
            "proposal sized"
        );

        Ok(PositionSizingResult {
            risk_amount: risk,
            position_size,
            margin_required,
            swap_cost,
            leverage_used,
            reasoning: if reasoning.is_empty() {
                "full size".to_string()
            } else {
                reasoning.join(" | ")
            },
        })
    }

    /// Commits sized risk to the daily ledger. The sizer is the ledger's
    /// only writer, and this is called only after a confirmed outcome.
    pub fn commit(&self, now: DateTime<Utc>, risk_amount: Decimal) {
        self.ledger
            .lock()
            .expect("risk ledger poisoned")
            .commit(now, risk_amount);
    }

    /// Risk already committed today.
    pub fn committed_today(&self, now: DateTime<Utc>) -> Decimal {
        self.ledger
            .lock()
            .expect("risk ledger poisoned")
            .committed(now)
    }
}
