//! The sequential decision tick loop.
//!
//! One tick runs the full synchronous decision path: session check, regime
//! analysis, divergence scan, signal assembly, margin gate, sizing, and the
//! confirmation gate. Ticks never overlap. Margin monitoring runs on its
//! own task so it is never serialized behind a confirmation wait, and
//! post-confirmation watchers are independent cancellable tasks.

use crate::monitor::{spawn_correlation_watcher, spawn_margin_monitor};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sentinel_core::config::SentinelConfig;
use sentinel_core::error::SentinelError;
use sentinel_core::events::{
    AlertMessage, ConfirmationOutcome, MarginLevel, PositionSizingResult, RegimeStatus, Severity,
};
use sentinel_core::session::SessionClock;
use sentinel_core::traits::{BrokerAccount, DataFeed, NewsCalendar};
use sentinel_execution::{AlertPublisher, ConfirmationGate};
use sentinel_risk::{LiquidationGuard, RiskSizer};
use sentinel_signals::{CorrelationMonitor, DivergenceEngine, RegimeEngine};
use sentinel_strategy::SignalAssembler;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What one tick of the control loop did.
#[derive(Debug)]
pub enum TickOutcome {
    /// No proposal this tick, with the stage that ended it.
    Skipped(&'static str),
    /// A proposal went through the confirmation gate.
    Resolved {
        outcome: ConfirmationOutcome,
        sizing: PositionSizingResult,
    },
}

/// Owns every pipeline component and advances them one tick at a time.
pub struct TickEngine {
    config: SentinelConfig,
    clock: SessionClock,
    broker: Arc<dyn BrokerAccount>,
    regime: RegimeEngine,
    divergence: DivergenceEngine,
    assembler: SignalAssembler,
    monitor: Arc<CorrelationMonitor>,
    sizer: Arc<RiskSizer>,
    gate: Arc<ConfirmationGate>,
    publisher: AlertPublisher,
    tick_seq: u64,
    active_divergences: HashSet<String>,
    watchers: Vec<JoinHandle<()>>,
}

impl TickEngine {
    #[must_use]
    pub fn new(
        config: SentinelConfig,
        feed: Arc<dyn DataFeed>,
        broker: Arc<dyn BrokerAccount>,
        calendar: Arc<dyn NewsCalendar>,
        sizer: Arc<RiskSizer>,
        gate: Arc<ConfirmationGate>,
        publisher: AlertPublisher,
    ) -> Self {
        let clock = SessionClock::new(config.sessions.clone());
        let regime = RegimeEngine::new(&config, Arc::clone(&feed));
        let divergence = DivergenceEngine::new(&config, Arc::clone(&feed), calendar);
        let assembler = SignalAssembler::new(&config, Arc::clone(&feed));
        let monitor = Arc::new(CorrelationMonitor::new(&config, Arc::clone(&feed)));

        Self {
            config,
            clock,
            broker,
            regime,
            divergence,
            assembler,
            monitor,
            sizer,
            gate,
            publisher,
            tick_seq: 0,
            active_divergences: HashSet::new(),
            watchers: Vec::new(),
        }
    }

    /// Runs the loop until a fatal error. Recoverable pipeline conditions
    /// are absorbed tick by tick; anything unclassified publishes a P0 and
    /// halts rather than continuing in a possibly corrupt state.
    pub async fn run(mut self) -> Result<()> {
        let margin_task = spawn_margin_monitor(
            Arc::clone(&self.broker),
            self.publisher.clone(),
            Duration::from_secs(self.config.system.margin_monitor_interval_secs),
        );

        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.config.system.tick_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            interval_secs = self.config.system.tick_interval_secs,
            "tick engine started"
        );

        loop {
            ticker.tick().await;
            match self.run_tick(Utc::now()).await {
                Ok(outcome) => debug!(outcome = ?outcome, "tick complete"),
                Err(e) => {
                    let alert = AlertMessage::new(Severity::P0, "FATAL: control loop halted")
                        .field("error", format!("{e:#}"));
                    if let Err(publish_err) = self.publisher.publish(alert).await {
                        warn!(error = %publish_err, "fatal alert publish failed");
                    }
                    margin_task.abort();
                    for watcher in &self.watchers {
                        watcher.abort();
                    }
                    return Err(e).context("tick loop aborted");
                }
            }
        }
    }

    /// One decision tick. Public so a paper session or test can drive the
    /// pipeline without the interval loop.
    ///
    /// # Errors
    /// Only fatal (unclassified) errors; every recoverable condition from
    /// the taxonomy resolves to a `TickOutcome`.
    pub async fn run_tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome> {
        self.tick_seq += 1;
        let session = self.clock.session_at(now);
        let multipliers = self.clock.multipliers(session);
        debug!(tick = self.tick_seq, session = %session, "tick started");

        let regime = self.regime.analyze(session, multipliers).await;
        self.publish_status(&regime).await;

        if regime.status != RegimeStatus::Ok {
            info!(status = ?regime.status, "no proposal: regime not trustworthy");
            return Ok(TickOutcome::Skipped("regime"));
        }

        if !self.clock.allows_new_positions(now) {
            debug!(session = %session, "session forbids new entries");
            return Ok(TickOutcome::Skipped("session"));
        }

        let divergences = self.divergence.scan().await;
        self.sync_divergence_flags(&divergences);

        let proposal = match self.assembler.assemble(self.tick_seq, &regime, &divergences).await {
            Ok(Some(proposal)) => proposal,
            Ok(None) => return Ok(TickOutcome::Skipped("no setup")),
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "assembly failed, retrying next tick");
                return Ok(TickOutcome::Skipped("assembly"));
            }
            Err(e) => return Err(e.into()),
        };

        let account = match self.broker.get_account_summary().await {
            Ok(account) => account,
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "account fetch failed");
                return Ok(TickOutcome::Skipped("account"));
            }
            Err(e) => return Err(e.into()),
        };
        let positions = self.broker.get_positions().await.unwrap_or_default();
        let exposure = positions.iter().map(sentinel_core::events::OpenPosition::exposure).sum();

        let margin = LiquidationGuard::evaluate(&account, exposure, now);
        if margin.level != MarginLevel::Safe {
            warn!(level = %margin.level, ratio = margin.margin_ratio, "entry blocked by margin");
            return Ok(TickOutcome::Skipped("margin"));
        }

        let sizing = match self.sizer.size(
            &proposal,
            account.equity,
            multipliers.position_size,
            now,
        ) {
            Ok(sizing) => sizing,
            Err(SentinelError::RiskBudgetExhausted { remaining }) => {
                info!(remaining = %remaining, "daily risk budget exhausted");
                return Ok(TickOutcome::Skipped("risk budget"));
            }
            Err(e) => return Err(e.into()),
        };
        if sizing.risk_amount.is_zero() {
            info!(reason = %sizing.reasoning, "sized to zero, proposal dropped");
            return Ok(TickOutcome::Skipped("zero size"));
        }

        let outcome = self.gate.decide(&proposal, &sizing, account.equity).await;
        if outcome.is_confirmed() {
            self.sizer.commit(now, sizing.risk_amount);
            let advisory = AlertMessage::new(
                Severity::P2,
                format!(
                    "{:?} {} confirmed, forward to execution",
                    proposal.direction, proposal.instrument
                ),
            )
            .field("proposal", proposal.id.clone())
            .field("size", sizing.position_size.round_dp(2).to_string())
            .field("risk", sizing.risk_amount.round_dp(2).to_string())
            .field("reductions", sizing.reasoning.clone());
            if let Err(e) = self.publisher.publish(advisory).await {
                warn!(error = %e, "advisory publish failed");
            }

            self.watchers.retain(|w| !w.is_finished());
            self.watchers.push(spawn_correlation_watcher(
                Arc::clone(&self.monitor),
                self.publisher.clone(),
                self.config.instruments.equity_index.clone(),
                self.config.instruments.carry_pair.clone(),
                self.config.correlation.critical_breakdown,
                Duration::from_secs(self.config.system.margin_monitor_interval_secs),
            ));
        }

        Ok(TickOutcome::Resolved { outcome, sizing })
    }

    /// Keeps the sizer's active-divergence flags in step with this tick's
    /// accepted signals.
    fn sync_divergence_flags(&mut self, divergences: &[sentinel_core::events::DivergenceSignal]) {
        let current: HashSet<String> = divergences
            .iter()
            .map(|signal| signal.instrument.clone())
            .collect();
        for instrument in current.difference(&self.active_divergences) {
            self.sizer.mark_divergence(instrument);
        }
        for instrument in self.active_divergences.difference(&current) {
            self.sizer.clear_divergence(instrument);
        }
        self.active_divergences = current;
    }

    async fn publish_status(&self, regime: &sentinel_core::events::RegimeClassification) {
        if self.config.system.status_every_ticks == 0
            || self.tick_seq % self.config.system.status_every_ticks != 0
        {
            return;
        }
        let alert = AlertMessage::new(Severity::P3, "status")
            .field("session", regime.session.to_string())
            .field("regime", format!("{:?}", regime.regime_type))
            .field("score", format!("{:.2}", regime.score))
            .field("correlation", format!("{:.2}", regime.correlation_health))
            .field("vix", format!("{:.1}", regime.vix_level));
        if let Err(e) = self.publisher.publish(alert).await {
            warn!(error = %e, "status publish failed");
        }
    }
}
