//! Process-scoped daily risk and loss state.
//!
//! Both structures are explicit, injectable state with a defined lifecycle
//! (reset at the GMT day boundary) so they are trivially substitutable in
//! tests. The ledger has a single writer: the risk sizer, after a confirmed
//! proposal. The loss history is written only through the confirmation
//! gate's recording API.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use tracing::info;

/// Running total of risk committed today, reset at GMT midnight.
#[derive(Debug)]
pub struct DailyRiskLedger {
    day: NaiveDate,
    committed: Decimal,
}

impl DailyRiskLedger {
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            day: now.date_naive(),
            committed: Decimal::ZERO,
        }
    }

    fn roll(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.day {
            info!(previous = %self.committed, "daily risk ledger reset");
            self.day = today;
            self.committed = Decimal::ZERO;
        }
    }

    /// Risk committed so far today.
    pub fn committed(&mut self, now: DateTime<Utc>) -> Decimal {
        self.roll(now);
        self.committed
    }

    /// Budget left under the given daily maximum, floored at zero.
    pub fn remaining(&mut self, now: DateTime<Utc>, max_daily: Decimal) -> Decimal {
        self.roll(now);
        (max_daily - self.committed).max(Decimal::ZERO)
    }

    /// Records committed risk. Called only after a confirmed proposal.
    pub fn commit(&mut self, now: DateTime<Utc>, amount: Decimal) {
        self.roll(now);
        self.committed += amount;
        info!(committed = %self.committed, "daily risk committed");
    }
}

/// Rolling buffer of realized losses plus the cumulative daily loss.
#[derive(Debug)]
pub struct LossHistory {
    day: NaiveDate,
    losses: VecDeque<(DateTime<Utc>, Decimal)>,
    daily_loss: Decimal,
}

impl LossHistory {
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            day: now.date_naive(),
            losses: VecDeque::new(),
            daily_loss: Decimal::ZERO,
        }
    }

    fn roll(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.day {
            info!(
                losses = self.losses.len(),
                total = %self.daily_loss,
                "daily loss stats reset"
            );
            self.day = today;
            self.losses.clear();
            self.daily_loss = Decimal::ZERO;
        }
    }

    /// Records a realized loss (positive magnitude).
    pub fn record_loss(&mut self, now: DateTime<Utc>, amount: Decimal) {
        self.roll(now);
        self.losses.push_back((now, amount.abs()));
        self.daily_loss += amount.abs();
    }

    /// Number of losses within the trailing window.
    pub fn recent_count(&mut self, now: DateTime<Utc>, window_minutes: i64) -> usize {
        self.roll(now);
        let cutoff = now - Duration::minutes(window_minutes);
        while let Some((ts, _)) = self.losses.front() {
            if *ts < cutoff {
                self.losses.pop_front();
            } else {
                break;
            }
        }
        self.losses.len()
    }

    /// Cumulative loss recorded today.
    pub fn daily_loss(&mut self, now: DateTime<Utc>) -> Decimal {
        self.roll(now);
        self.daily_loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn ledger_accumulates_within_a_day() {
        let mut ledger = DailyRiskLedger::new(at(16, 9));
        ledger.commit(at(16, 10), dec!(900));
        ledger.commit(at(16, 14), dec!(300));
        assert_eq!(ledger.committed(at(16, 15)), dec!(1200));
        assert_eq!(ledger.remaining(at(16, 15), dec!(1500)), dec!(300));
    }

    #[test]
    fn ledger_remaining_floors_at_zero() {
        let mut ledger = DailyRiskLedger::new(at(16, 9));
        ledger.commit(at(16, 10), dec!(2000));
        assert_eq!(ledger.remaining(at(16, 11), dec!(1500)), Decimal::ZERO);
    }

    #[test]
    fn ledger_resets_at_gmt_midnight() {
        let mut ledger = DailyRiskLedger::new(at(16, 9));
        ledger.commit(at(16, 10), dec!(900));
        assert_eq!(ledger.committed(at(17, 0)), Decimal::ZERO);
        assert_eq!(ledger.remaining(at(17, 0), dec!(1500)), dec!(1500));
    }

    #[test]
    fn loss_history_counts_only_trailing_window() {
        let mut history = LossHistory::new(at(16, 9));
        history.record_loss(at(16, 9), dec!(100));
        history.record_loss(at(16, 10), dec!(50));
        history.record_loss(
            Utc.with_ymd_and_hms(2025, 6, 16, 10, 30, 0).unwrap(),
            dec!(75),
        );
        // At 10:45, the 09:00 loss is outside a 60-minute window.
        let now = Utc.with_ymd_and_hms(2025, 6, 16, 10, 45, 0).unwrap();
        assert_eq!(history.recent_count(now, 60), 2);
    }

    #[test]
    fn loss_history_daily_total_uses_absolute_amounts() {
        let mut history = LossHistory::new(at(16, 9));
        history.record_loss(at(16, 9), dec!(-120));
        history.record_loss(at(16, 10), dec!(80));
        assert_eq!(history.daily_loss(at(16, 11)), dec!(200));
    }

    #[test]
    fn loss_history_resets_on_new_day() {
        let mut history = LossHistory::new(at(16, 9));
        history.record_loss(at(16, 9), dec!(100));
        assert_eq!(history.daily_loss(at(17, 1)), Decimal::ZERO);
        assert_eq!(history.recent_count(at(17, 1), 60), 0);
    }
}
