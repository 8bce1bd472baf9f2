//! Margin-level evaluation and distance-to-call reporting.
//!
//! A pure function of the account snapshot and total position exposure, so
//! the guard can run independently of any confirmation wait.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sentinel_core::events::{AccountSummary, MarginAction, MarginLevel, MarginStatus};
use tracing::{error, warn};

/// Margin level below which forced reduction is required.
const DANGER_LEVEL: f64 = 1.5;
/// Margin level below which new entries are blocked.
const WARNING_LEVEL: f64 = 1.75;

pub struct LiquidationGuard;

impl LiquidationGuard {
    /// Evaluates margin safety.
    ///
    /// `margin_level = equity / margin_used`, `+inf` when nothing is on
    /// margin. Below 1.5 is DANGER (forced reduction), below 1.75 WARNING
    /// (block new entries), otherwise SAFE. A SAFE status also reports the
    /// maximum adverse percent move tolerable before the margin level
    /// reaches 1.0, from current exposure and the equity buffer.
    #[must_use]
    pub fn evaluate(
        account: &AccountSummary,
        total_exposure: Decimal,
        at: DateTime<Utc>,
    ) -> MarginStatus {
        let equity: f64 = account.equity.try_into().unwrap_or(0.0);
        let margin_used: f64 = account.margin_used.try_into().unwrap_or(0.0);

        let margin_ratio = if margin_used > 0.0 {
            equity / margin_used
        } else {
            f64::INFINITY
        };

        let (level, action) = if margin_ratio < DANGER_LEVEL {
            (MarginLevel::Danger, MarginAction::ForceReduction)
        } else if margin_ratio < WARNING_LEVEL {
            (MarginLevel::Warning, MarginAction::BlockNewEntries)
        } else {
            (MarginLevel::Safe, MarginAction::None)
        };

        let max_adverse_move_percent = if level == MarginLevel::Safe {
            Some(Self::adverse_move_percent(
                account.equity,
                account.margin_used,
                total_exposure,
            ))
        } else {
            None
        };

        match level {
            MarginLevel::Danger => {
                error!(margin_ratio, "margin DANGER: forced reduction required");
            }
            MarginLevel::Warning => {
                warn!(margin_ratio, "margin WARNING: new entries blocked");
            }
            MarginLevel::Safe => {}
        }

        MarginStatus {
            level,
            margin_ratio,
            action_required: action,
            max_adverse_move_percent,
            equity: account.equity,
            margin_used: account.margin_used,
            timestamp: at,
        }
    }

    /// Percent the market can move against the book before equity falls to
    /// the margin in use (margin level 1.0). No exposure means no
    /// liquidation risk.
    fn adverse_move_percent(equity: Decimal, margin_used: Decimal, exposure: Decimal) -> f64 {
        if exposure <= Decimal::ZERO {
            return 100.0;
        }
        let buffer = equity - margin_used;
        if buffer <= Decimal::ZERO {
            return 0.0;
        }
        let buffer_f: f64 = buffer.try_into().unwrap_or(0.0);
        let exposure_f: f64 = exposure.try_into().unwrap_or(f64::MAX);
        (buffer_f / exposure_f) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account(equity: Decimal, margin_used: Decimal) -> AccountSummary {
        AccountSummary {
            equity,
            margin_used,
            maintenance_margin: margin_used * dec!(0.5),
            timestamp: Utc::now(),
        }
    }

    fn level_for(equity: Decimal, margin_used: Decimal) -> MarginLevel {
        LiquidationGuard::evaluate(&account(equity, margin_used), dec!(100000), Utc::now()).level
    }

    #[test]
    fn level_thresholds_are_boundary_exact() {
        // ratio 1.4 -> DANGER
        assert_eq!(level_for(dec!(14000), dec!(10000)), MarginLevel::Danger);
        // ratio exactly 1.5 -> WARNING, not DANGER
        assert_eq!(level_for(dec!(15000), dec!(10000)), MarginLevel::Warning);
        // ratio 1.6 -> WARNING
        assert_eq!(level_for(dec!(16000), dec!(10000)), MarginLevel::Warning);
        // ratio exactly 1.75 -> SAFE, not WARNING
        assert_eq!(level_for(dec!(17500), dec!(10000)), MarginLevel::Safe);
        // ratio 2.0 -> SAFE
        assert_eq!(level_for(dec!(20000), dec!(10000)), MarginLevel::Safe);
    }

    #[test]
    fn no_margin_in_use_is_infinitely_safe() {
        let status =
            LiquidationGuard::evaluate(&account(dec!(50000), dec!(0)), dec!(0), Utc::now());
        assert_eq!(status.level, MarginLevel::Safe);
        assert!(status.margin_ratio.is_infinite());
        assert_eq!(status.max_adverse_move_percent, Some(100.0));
    }

    #[test]
    fn danger_requires_forced_reduction() {
        let status =
            LiquidationGuard::evaluate(&account(dec!(14000), dec!(10000)), dec!(300000), Utc::now());
        assert_eq!(status.action_required, MarginAction::ForceReduction);
        assert!(status.max_adverse_move_percent.is_none());
    }

    #[test]
    fn warning_blocks_new_entries() {
        let status =
            LiquidationGuard::evaluate(&account(dec!(16000), dec!(10000)), dec!(300000), Utc::now());
        assert_eq!(status.action_required, MarginAction::BlockNewEntries);
    }

    #[test]
    fn safe_reports_distance_to_margin_call() {
        // $30k buffer over $600k exposure: 5% adverse move to level 1.0.
        let status =
            LiquidationGuard::evaluate(&account(dec!(50000), dec!(20000)), dec!(600000), Utc::now());
        assert_eq!(status.level, MarginLevel::Safe);
        let adverse = status.max_adverse_move_percent.unwrap();
        assert!((adverse - 5.0).abs() < 1e-9);
    }
}
