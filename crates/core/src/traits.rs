use crate::error::Result;
use crate::events::{AccountSummary, Bar, BarInterval, NewsEvent, OpenPosition, Quote};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Market data source. The pipeline never branches on provider identity,
/// only on this interface.
#[async_trait]
pub trait DataFeed: Send + Sync {
    async fn get_quote(&self, symbol: &str) -> Result<Quote>;

    /// Returns exactly `bars` bars in chronological order, or fails with
    /// `DataUnavailable` / `InsufficientHistory`. Implementations must never
    /// silently return a partial series.
    async fn get_history(&self, symbol: &str, bars: usize, interval: BarInterval)
        -> Result<Vec<Bar>>;
}

/// Broker account telemetry. Read-only from the core's perspective.
#[async_trait]
pub trait BrokerAccount: Send + Sync {
    async fn get_account_summary(&self) -> Result<AccountSummary>;
    async fn get_equity(&self) -> Result<Decimal>;
    async fn get_positions(&self) -> Result<Vec<OpenPosition>>;
}

/// One outbound alert transport (console, webhook, chat bridge).
#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &str;
    async fn deliver(&self, rendered: &str) -> Result<()>;
}

/// Scheduled economic news source, consumed by the news rejection filter.
#[async_trait]
pub trait NewsCalendar: Send + Sync {
    /// Events within `[now - minutes_back, now + minutes_ahead]`.
    async fn get_events(&self, minutes_back: i64, minutes_ahead: i64) -> Result<Vec<NewsEvent>>;
}
