pub mod config;
pub mod config_loader;
pub mod error;
pub mod events;
pub mod session;
pub mod traits;

pub use config::SentinelConfig;
pub use config_loader::ConfigLoader;
pub use error::SentinelError;
pub use events::{
    AccountSummary, AlertMessage, Bar, BarInterval, ConfirmationOutcome, CorrelationHealth,
    CorrelationReading, DivergenceKind, DivergenceSignal, GateDecision, MarginAction, MarginLevel,
    MarginStatus, NewsEvent, NewsImpact, OpenPosition, PositionSizingResult, Quote,
    RegimeClassification, RegimeStatus, RegimeType, Severity, TradeDirection, TradeProposal,
};
pub use session::{SessionClock, TradingSession};
pub use traits::{AlertChannel, BrokerAccount, DataFeed, NewsCalendar};
