//! Severity-tagged alert fan-out with rate limiting.
//!
//! Alerts flow through a bounded queue into a worker task that delivers to
//! every configured channel. P0 alerts are rate limited with a sliding
//! window; exceeding the limit delays delivery until the window frees, it
//! never drops a critical alert.

use sentinel_core::config::ExecutionConfig;
use sentinel_core::error::{Result, SentinelError};
use sentinel_core::events::{AlertMessage, Severity};
use sentinel_core::traits::AlertChannel;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, warn};

/// Sliding-window counter for one severity tier.
#[derive(Debug)]
pub(crate) struct RateWindow {
    limit: usize,
    window: Duration,
    sent: VecDeque<Instant>,
}

impl RateWindow {
    pub(crate) fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            sent: VecDeque::new(),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.sent.front() {
            if now.duration_since(*front) >= self.window {
                self.sent.pop_front();
            } else {
                break;
            }
        }
    }

    /// How long delivery must wait before the window has room, if at all.
    pub(crate) fn delay_needed(&mut self, now: Instant) -> Option<Duration> {
        self.prune(now);
        if self.limit == 0 || self.sent.len() < self.limit {
            return None;
        }
        let oldest = *self.sent.front()?;
        Some(self.window.saturating_sub(now.duration_since(oldest)))
    }

    pub(crate) fn record(&mut self, now: Instant) {
        self.prune(now);
        self.sent.push_back(now);
    }
}

/// Handle used by pipeline components to enqueue alerts.
#[derive(Clone)]
pub struct AlertPublisher {
    tx: mpsc::Sender<AlertMessage>,
}

impl AlertPublisher {
    /// Enqueues an alert for delivery.
    ///
    /// # Errors
    /// `ChannelError` if the worker has shut down.
    pub async fn publish(&self, alert: AlertMessage) -> Result<()> {
        self.tx
            .send(alert)
            .await
            .map_err(|_| SentinelError::ChannelError("alert worker stopped".to_string()))
    }
}

/// Owns the queue consumer side and the configured channels.
pub struct AlertWorker {
    rx: mpsc::Receiver<AlertMessage>,
    channels: Vec<Arc<dyn AlertChannel>>,
    p0_window: RateWindow,
}

impl AlertWorker {
    /// Builds the publisher/worker pair over a bounded queue.
    #[must_use]
    pub fn new(
        config: &ExecutionConfig,
        channels: Vec<Arc<dyn AlertChannel>>,
    ) -> (AlertPublisher, Self) {
        let (tx, rx) = mpsc::channel(config.alert_queue_size.max(1));
        let worker = Self {
            rx,
            channels,
            p0_window: RateWindow::new(
                config.p0_rate_limit,
                Duration::from_secs(config.p0_rate_window_secs),
            ),
        };
        (AlertPublisher { tx }, worker)
    }

    /// Drains the queue until every publisher handle is dropped.
    pub async fn run(mut self) {
        while let Some(alert) = self.rx.recv().await {
            if alert.severity == Severity::P0 {
                if let Some(delay) = self.p0_window.delay_needed(Instant::now()) {
                    warn!(delay_secs = delay.as_secs(), "P0 rate limit hit, delaying delivery");
                    tokio::time::sleep(delay).await;
                }
                self.p0_window.record(Instant::now());
            }

            let rendered = alert.render();
            for channel in &self.channels {
                if let Err(e) = channel.deliver(&rendered).await {
                    error!(channel = channel.name(), error = %e, "alert delivery failed");
                }
            }
        }
    }

    /// Runs the worker on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
