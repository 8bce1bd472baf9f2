//! Bounded-time human confirmation gate.
//!
//! Every proposal passes through a per-proposal state machine:
//! PENDING -> CONFIRMED | REJECTED | TIMED_OUT. Entering PENDING announces
//! the proposal on the alert bus and arms a deadline; a timeout is treated
//! exactly like a rejection downstream. Even a human "yes" must clear the
//! trader-readiness check, and a readiness failure raises its own
//! critical alert. Terminal outcomes are never retried.

use crate::publisher::AlertPublisher;
use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use sentinel_core::config::{ExecutionConfig, RiskConfig, SentinelConfig};
use sentinel_core::events::{
    AlertMessage, ConfirmationOutcome, GateDecision, PositionSizingResult, Severity, TradeProposal,
};
use sentinel_risk::LossHistory;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

type PendingMap = Arc<Mutex<HashMap<String, tokio::sync::oneshot::Sender<bool>>>>;

/// External event channel into the gate. A chat bot or web endpoint calls
/// `respond` when the human answers.
#[derive(Clone)]
pub struct ResponseHandle {
    pending: PendingMap,
}

impl ResponseHandle {
    /// Delivers a human response for a pending proposal. Returns false when
    /// the proposal is unknown or already resolved.
    pub fn respond(&self, proposal_id: &str, approved: bool) -> bool {
        let sender = self
            .pending
            .lock()
            .expect("pending map poisoned")
            .remove(proposal_id);
        match sender {
            Some(tx) => tx.send(approved).is_ok(),
            None => false,
        }
    }
}

/// Human-approval state machine guarding every proposal.
pub struct ConfirmationGate {
    execution: ExecutionConfig,
    risk: RiskConfig,
    publisher: AlertPublisher,
    pending: PendingMap,
    losses: Mutex<LossHistory>,
}

impl ConfirmationGate {
    #[must_use]
    pub fn new(config: &SentinelConfig, publisher: AlertPublisher, losses: LossHistory) -> Self {
        Self {
            execution: config.execution.clone(),
            risk: config.risk.clone(),
            publisher,
            pending: Arc::new(Mutex::new(HashMap::new())),
            losses: Mutex::new(losses),
        }
    }

    /// Channel for delivering human responses.
    #[must_use]
    pub fn response_handle(&self) -> ResponseHandle {
        ResponseHandle {
            pending: Arc::clone(&self.pending),
        }
    }

    /// Runs one proposal through the gate. Cancel-safe: the pending entry
    /// is removed on every exit path, so an aborted wait leaks nothing.
    pub async fn decide(
        &self,
        proposal: &TradeProposal,
        sizing: &PositionSizingResult,
        equity: Decimal,
    ) -> ConfirmationOutcome {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.pending
            .lock()
            .expect("pending map poisoned")
            .insert(proposal.id.clone(), tx);

        if let Err(e) = self.publisher.publish(self.proposal_alert(proposal, sizing)).await {
            warn!(error = %e, "proposal alert publish failed");
        }

        let wait = Duration::from_secs(self.execution.confirmation_timeout_secs);
        let response = tokio::time::timeout(wait, rx).await;
        self.pending
            .lock()
            .expect("pending map poisoned")
            .remove(&proposal.id);

        let (decision, reason) = match response {
            Err(_) => {
                info!(proposal = %proposal.id, "confirmation timed out");
                (
                    GateDecision::TimedOut,
                    format!(
                        "no response within {}s",
                        self.execution.confirmation_timeout_secs
                    ),
                )
            }
            Ok(Err(_)) => (
                GateDecision::TimedOut,
                "responder dropped before answering".to_string(),
            ),
            Ok(Ok(false)) => (GateDecision::Rejected, "declined by trader".to_string()),
            Ok(Ok(true)) => match self.check_readiness(Utc::now(), equity) {
                Ok(()) => (GateDecision::Confirmed, "confirmed by trader".to_string()),
                Err(reason) => {
                    let alert = AlertMessage::new(Severity::P0, "TRADING SUSPENDED")
                        .field("proposal", proposal.id.clone())
                        .field("reason", reason.clone());
                    if let Err(e) = self.publisher.publish(alert).await {
                        warn!(error = %e, "readiness alert publish failed");
                    }
                    (GateDecision::Rejected, reason)
                }
            },
        };

        info!(proposal = %proposal.id, decision = ?decision, reason = %reason, "gate resolved");
        ConfirmationOutcome {
            proposal_id: proposal.id.clone(),
            decision,
            reason,
            timestamp: Utc::now(),
        }
    }

    /// Trader-readiness rules. A failure overrides a human confirmation.
    pub(crate) fn check_readiness(
        &self,
        now: DateTime<Utc>,
        equity: Decimal,
    ) -> std::result::Result<(), String> {
        let mut losses = self.losses.lock().expect("loss history poisoned");

        let recent = losses.recent_count(now, self.execution.loss_window_minutes);
        if recent >= self.execution.recent_loss_limit {
            return Err(format!(
                "{recent} losses in the last {} minutes",
                self.execution.loss_window_minutes
            ));
        }

        let daily_loss = losses.daily_loss(now);
        let daily_limit = equity
            * Decimal::from_str(&(self.risk.max_daily_risk_percent / 100.0).to_string())
                .unwrap_or(Decimal::ZERO);
        let suspension_level = daily_limit
            * Decimal::from_str(&self.execution.daily_loss_ratio.to_string())
                .unwrap_or(Decimal::ONE);
        if daily_loss > suspension_level {
            return Err(format!(
                "daily loss {} over {} suspension level",
                daily_loss.round_dp(2),
                suspension_level.round_dp(2)
            ));
        }

        let hour = now.hour();
        let start = self.execution.blackout_start_hour;
        let end = self.execution.blackout_end_hour;
        if start != end && hour >= start && hour < end {
            return Err(format!("low-liquidity blackout window {start:02}:00-{end:02}:00"));
        }

        Ok(())
    }

    /// Records a realized trade result. Only losses enter the buffer; this
    /// is the loss history's sole writer.
    pub fn record_trade_result(&self, now: DateTime<Utc>, pnl: Decimal) {
        if pnl < Decimal::ZERO {
            self.losses
                .lock()
                .expect("loss history poisoned")
                .record_loss(now, pnl.abs());
            info!(pnl = %pnl, "loss recorded");
        }
    }

    fn proposal_alert(
        &self,
        proposal: &TradeProposal,
        sizing: &PositionSizingResult,
    ) -> AlertMessage {
        AlertMessage::new(
            Severity::P1,
            format!(
                "{:?} {} signal, confirmation required",
                proposal.direction, proposal.instrument
            ),
        )
        .field("proposal", proposal.id.clone())
        .field("entry", proposal.entry.round_dp(2).to_string())
        .field("stop", proposal.stop.round_dp(2).to_string())
        .field("target", proposal.target.round_dp(2).to_string())
        .field("confidence", format!("{:.0}%", proposal.confidence * 100.0))
        .field("risk", sizing.risk_amount.round_dp(2).to_string())
        .field("margin", sizing.margin_required.round_dp(2).to_string())
        .require_ack(self.execution.alert_ack_timeout_secs)
    }
}
