//! Background monitors that must never block the tick loop.

use rust_decimal::Decimal;
use sentinel_core::events::{AlertMessage, MarginLevel, OpenPosition, Severity};
use sentinel_core::traits::BrokerAccount;
use sentinel_execution::AlertPublisher;
use sentinel_risk::LiquidationGuard;
use sentinel_signals::CorrelationMonitor;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How many interval checks a post-trade watcher runs before retiring.
const WATCHER_MAX_CHECKS: u32 = 60;

/// Spawns the independent margin monitor. Runs on its own cadence so a
/// confirmation wait in the tick loop never delays a margin emergency.
pub fn spawn_margin_monitor(
    broker: Arc<dyn BrokerAccount>,
    publisher: AlertPublisher,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last_level = MarginLevel::Safe;

        loop {
            ticker.tick().await;
            let account = match broker.get_account_summary().await {
                Ok(account) => account,
                Err(e) => {
                    warn!(error = %e, "margin monitor account fetch failed");
                    continue;
                }
            };
            let exposure: Decimal = broker
                .get_positions()
                .await
                .unwrap_or_default()
                .iter()
                .map(OpenPosition::exposure)
                .sum();

            let status = LiquidationGuard::evaluate(&account, exposure, account.timestamp);
            match status.level {
                MarginLevel::Danger => {
                    let alert = AlertMessage::new(Severity::P0, "MARGIN DANGER: reduce positions now")
                        .field("margin_level", format!("{:.2}", status.margin_ratio))
                        .field("equity", status.equity.round_dp(2).to_string())
                        .field("margin_used", status.margin_used.round_dp(2).to_string());
                    if let Err(e) = publisher.publish(alert).await {
                        warn!(error = %e, "margin alert publish failed");
                    }
                }
                MarginLevel::Warning if last_level == MarginLevel::Safe => {
                    let alert = AlertMessage::new(Severity::P2, "margin warning: new entries blocked")
                        .field("margin_level", format!("{:.2}", status.margin_ratio));
                    if let Err(e) = publisher.publish(alert).await {
                        warn!(error = %e, "margin alert publish failed");
                    }
                }
                _ => {}
            }
            last_level = status.level;
        }
    })
}

/// Spawns a bounded, cancellable watcher over the core pair of an open
/// advisory position. Fires a P0 when the correlation the trade was built
/// on breaks down, then retires.
pub fn spawn_correlation_watcher(
    monitor: Arc<CorrelationMonitor>,
    publisher: AlertPublisher,
    instrument1: String,
    instrument2: String,
    critical_breakdown: f64,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        for _ in 0..WATCHER_MAX_CHECKS {
            ticker.tick().await;
            let health = match monitor.check_pair(&instrument1, &instrument2).await {
                Ok(health) => health,
                Err(e) => {
                    warn!(error = %e, "watcher pair check failed");
                    continue;
                }
            };
            debug!(
                pair = %format!("{instrument1}/{instrument2}"),
                correlation = health.reading.value,
                "watcher check"
            );

            if health.reading.is_valid() && health.reading.value.abs() <= critical_breakdown {
                let alert = AlertMessage::new(Severity::P0, "correlation breakdown on open position")
                    .field("pair", format!("{instrument1}/{instrument2}"))
                    .field("correlation", format!("{:.2}", health.reading.value))
                    .field("action", "review and reduce the position".to_string());
                if let Err(e) = publisher.publish(alert).await {
                    warn!(error = %e, "breakdown alert publish failed");
                }
                return;
            }
        }
    })
}
