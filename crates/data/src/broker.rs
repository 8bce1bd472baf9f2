//! Simulated broker account for paper sessions.
//!
//! Makes zero calls to any real broker; account state lives in memory and
//! is only read by the decision pipeline.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sentinel_core::error::Result;
use sentinel_core::events::{AccountSummary, OpenPosition};
use sentinel_core::traits::BrokerAccount;
use std::sync::Mutex;
use tracing::info;

struct AccountState {
    equity: Decimal,
    margin_used: Decimal,
    positions: Vec<OpenPosition>,
}

/// In-memory account implementing the read-only broker contract.
pub struct SimulatedBrokerAccount {
    state: Mutex<AccountState>,
}

impl SimulatedBrokerAccount {
    #[must_use]
    pub fn new(initial_capital: Decimal) -> Self {
        info!(%initial_capital, "simulated broker account initialized");
        Self {
            state: Mutex::new(AccountState {
                equity: initial_capital,
                margin_used: Decimal::ZERO,
                positions: Vec::new(),
            }),
        }
    }

    /// Replaces the open position set and the margin tied up by it.
    pub fn set_positions(&self, positions: Vec<OpenPosition>, margin_used: Decimal) {
        let mut state = self.state.lock().expect("account state poisoned");
        state.positions = positions;
        state.margin_used = margin_used;
    }

    /// Adjusts equity by a realized profit or loss.
    pub fn apply_pnl(&self, pnl: Decimal) {
        let mut state = self.state.lock().expect("account state poisoned");
        state.equity += pnl;
    }
}

#[async_trait]
impl BrokerAccount for SimulatedBrokerAccount {
    async fn get_account_summary(&self) -> Result<AccountSummary> {
        let state = self.state.lock().expect("account state poisoned");
        let unrealized: Decimal = state.positions.iter().map(|p| p.unrealized_pnl).sum();
        Ok(AccountSummary {
            equity: state.equity + unrealized,
            margin_used: state.margin_used,
            maintenance_margin: state.margin_used * Decimal::new(5, 1),
            timestamp: Utc::now(),
        })
    }

    async fn get_equity(&self) -> Result<Decimal> {
        let state = self.state.lock().expect("account state poisoned");
        let unrealized: Decimal = state.positions.iter().map(|p| p.unrealized_pnl).sum();
        Ok(state.equity + unrealized)
    }

    async fn get_positions(&self) -> Result<Vec<OpenPosition>> {
        let state = self.state.lock().expect("account state poisoned");
        Ok(state.positions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn fresh_account_has_no_margin_in_use() {
        let broker = SimulatedBrokerAccount::new(dec!(100000));
        let summary = broker.get_account_summary().await.unwrap();
        assert_eq!(summary.equity, dec!(100000));
        assert_eq!(summary.margin_used, Decimal::ZERO);
    }

    #[tokio::test]
    async fn equity_reflects_unrealized_pnl() {
        let broker = SimulatedBrokerAccount::new(dec!(50000));
        broker.set_positions(
            vec![OpenPosition {
                symbol: "US500".to_string(),
                quantity: dec!(2),
                entry_price: dec!(4500),
                current_price: dec!(4510),
                unrealized_pnl: dec!(20),
            }],
            dec!(300),
        );
        let summary = broker.get_account_summary().await.unwrap();
        assert_eq!(summary.equity, dec!(50020));
        assert_eq!(summary.margin_used, dec!(300));
        assert_eq!(summary.maintenance_margin, dec!(150));
    }

    #[tokio::test]
    async fn realized_pnl_moves_equity() {
        let broker = SimulatedBrokerAccount::new(dec!(50000));
        broker.apply_pnl(dec!(-250));
        assert_eq!(broker.get_equity().await.unwrap(), dec!(49750));
    }
}
