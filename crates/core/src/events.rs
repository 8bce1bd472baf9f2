use crate::session::TradingSession;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single OHLCV bar for one instrument.
///
/// Bars are owned by the tick that fetched them and discarded when the tick
/// completes; no component retains bar history across ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Bar interval supported by the data feed contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarInterval {
    OneMinute,
    FiveMinutes,
}

impl BarInterval {
    /// Interval length in minutes.
    #[must_use]
    pub const fn minutes(self) -> i64 {
        match self {
            Self::OneMinute => 1,
            Self::FiveMinutes => 5,
        }
    }
}

/// A current market quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Rolling correlation between two return series.
///
/// An invalid reading (fewer aligned points than the lookback requires) is
/// exactly `{0.0, 0.0}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationReading {
    /// Pearson correlation over the lookback window, in [-1, 1].
    pub value: f64,
    /// Standard deviation of a short rolling correlation, >= 0.
    pub volatility: f64,
}

impl CorrelationReading {
    /// The degenerate reading returned when too few aligned points exist.
    pub const INVALID: Self = Self {
        value: 0.0,
        volatility: 0.0,
    };

    /// True when the reading was computed from sufficient aligned data.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

/// Correlation health grading used for sizing and status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationHealth {
    Healthy,
    Warning,
    Critical,
    Broken,
}

/// Market risk-appetite regime, ordered risk-on to risk-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeType {
    StrongRiskOn,
    WeakRiskOn,
    Neutral,
    WeakRiskOff,
    StrongRiskOff,
}

impl RegimeType {
    /// True for the two strong buckets that can drive a regime-only proposal.
    #[must_use]
    pub const fn is_strong(self) -> bool {
        matches!(self, Self::StrongRiskOn | Self::StrongRiskOff)
    }

    /// True for either risk-on bucket.
    #[must_use]
    pub const fn is_risk_on(self) -> bool {
        matches!(self, Self::StrongRiskOn | Self::WeakRiskOn)
    }

    /// True for either risk-off bucket.
    #[must_use]
    pub const fn is_risk_off(self) -> bool {
        matches!(self, Self::StrongRiskOff | Self::WeakRiskOff)
    }
}

/// Outcome status of a regime analysis tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegimeStatus {
    /// Scored classification produced.
    Ok,
    /// A required series fetch failed; no further computation was done.
    DataError,
    /// Correlation volatility breached the limit; classification withheld.
    Unreliable,
}

/// Result of one regime analysis. Created once per tick, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeClassification {
    pub status: RegimeStatus,
    pub regime_type: RegimeType,
    pub score: f64,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Core-pair correlation at analysis time.
    pub correlation_health: f64,
    pub vix_level: f64,
    /// Movement threshold (percent) actually used for gauge scoring.
    pub threshold_used: f64,
    pub session: TradingSession,
    pub timestamp: DateTime<Utc>,
}

impl RegimeClassification {
    /// Builds a terminal `DataError` classification.
    #[must_use]
    pub fn data_error(session: TradingSession, timestamp: DateTime<Utc>) -> Self {
        Self {
            status: RegimeStatus::DataError,
            regime_type: RegimeType::Neutral,
            score: 0.0,
            confidence: 0.0,
            correlation_health: 0.0,
            vix_level: 0.0,
            threshold_used: 0.0,
            session,
            timestamp,
        }
    }

    /// Builds a terminal `Unreliable` classification.
    #[must_use]
    pub fn unreliable(
        session: TradingSession,
        correlation: f64,
        vix_level: f64,
        threshold: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            status: RegimeStatus::Unreliable,
            regime_type: RegimeType::Neutral,
            score: 0.0,
            confidence: 0.0,
            correlation_health: correlation,
            vix_level,
            threshold_used: threshold,
            session,
            timestamp,
        }
    }
}

/// Direction of a detected divergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceKind {
    Bullish,
    Bearish,
}

/// A validated price/correlation divergence.
///
/// Raw signals that fail a rejection filter are dropped, not retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivergenceSignal {
    pub kind: DivergenceKind,
    pub instrument: String,
    /// Relative size of the core instrument's extrema delta, >= 0.
    pub magnitude: f64,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Pair correlation at detection time.
    pub correlation: f64,
    pub timestamp: DateTime<Utc>,
}

/// Trade direction of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    Buy,
    Sell,
}

/// An advisory trade proposal awaiting human confirmation.
///
/// Immutable once handed to the risk sizer. The id is unique per
/// tick + instrument and deterministic given identical inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeProposal {
    pub id: String,
    pub direction: TradeDirection,
    pub instrument: String,
    pub entry: Decimal,
    pub stop: Decimal,
    pub target: Decimal,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub regime: RegimeClassification,
    pub divergence: Option<DivergenceSignal>,
    pub timestamp: DateTime<Utc>,
}

/// Output of the leverage-aware sizing cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSizingResult {
    /// Dollar amount at risk. Never exceeds the per-trade cap or the
    /// remaining daily budget.
    pub risk_amount: Decimal,
    /// Number of contracts.
    pub position_size: Decimal,
    pub margin_required: Decimal,
    /// Projected daily overnight cost (negative = cost to trader).
    pub swap_cost: Decimal,
    /// Position value over margin required.
    pub leverage_used: Decimal,
    /// Every reduction the cascade applied, for the advisory alert.
    pub reasoning: String,
}

impl PositionSizingResult {
    /// A zero-sized result with the reason the cascade aborted.
    #[must_use]
    pub fn zero(reason: impl Into<String>) -> Self {
        Self {
            risk_amount: Decimal::ZERO,
            position_size: Decimal::ZERO,
            margin_required: Decimal::ZERO,
            swap_cost: Decimal::ZERO,
            leverage_used: Decimal::ZERO,
            reasoning: reason.into(),
        }
    }
}

/// Margin safety level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginLevel {
    Safe,
    /// Block new entries, keep existing positions.
    Warning,
    /// Forced reduction required.
    Danger,
}

impl std::fmt::Display for MarginLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Safe => write!(f, "SAFE"),
            Self::Warning => write!(f, "WARNING"),
            Self::Danger => write!(f, "DANGER"),
        }
    }
}

/// Action the margin level demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginAction {
    None,
    BlockNewEntries,
    ForceReduction,
}

/// Current margin safety evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginStatus {
    pub level: MarginLevel,
    /// Equity over margin used; `f64::INFINITY` when nothing is on margin.
    pub margin_ratio: f64,
    pub action_required: MarginAction,
    /// When SAFE: percent the market can move adversely before margin level
    /// reaches 1.0.
    pub max_adverse_move_percent: Option<f64>,
    pub equity: Decimal,
    pub margin_used: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Terminal decision of the confirmation gate for one proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateDecision {
    Confirmed,
    Rejected,
    /// No human response within the window. Treated as Rejected downstream.
    TimedOut,
}

/// One-per-proposal confirmation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationOutcome {
    pub proposal_id: String,
    pub decision: GateDecision,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl ConfirmationOutcome {
    /// True only for an explicit, readiness-cleared confirmation.
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        matches!(self.decision, GateDecision::Confirmed)
    }
}

/// Alert severity tiers.
///
/// P0 forces action, P1 is a signal requiring time-bounded confirmation,
/// P2 is informational, P3 is status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    P0,
    P1,
    P2,
    P3,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::P0 => write!(f, "P0"),
            Self::P1 => write!(f, "P1"),
            Self::P2 => write!(f, "P2"),
            Self::P3 => write!(f, "P3"),
        }
    }
}

/// An outbound alert. Every alert carries a severity tag; P1 alerts carry
/// an acknowledgment requirement and timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMessage {
    pub severity: Severity,
    pub header: String,
    /// Ordered key/value detail lines.
    pub fields: Vec<(String, String)>,
    pub requires_ack: bool,
    pub ack_timeout_secs: u64,
    pub timestamp: DateTime<Utc>,
}

impl AlertMessage {
    /// Creates an alert with no acknowledgment requirement.
    #[must_use]
    pub fn new(severity: Severity, header: impl Into<String>) -> Self {
        Self {
            severity,
            header: header.into(),
            fields: Vec::new(),
            requires_ack: false,
            ack_timeout_secs: 0,
            timestamp: Utc::now(),
        }
    }

    /// Adds a detail line.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Marks the alert as requiring acknowledgment within `timeout_secs`.
    #[must_use]
    pub fn require_ack(mut self, timeout_secs: u64) -> Self {
        self.requires_ack = true;
        self.ack_timeout_secs = timeout_secs;
        self
    }

    /// Renders the alert for a text channel.
    #[must_use]
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("[{}] {}", self.severity, self.header),
            format!("Time: {}", self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")),
        ];
        for (key, value) in &self.fields {
            lines.push(format!("{key}: {value}"));
        }
        if self.requires_ack {
            lines.push(format!(
                "CONFIRMATION REQUIRED within {}s",
                self.ack_timeout_secs
            ));
        }
        lines.join("\n")
    }
}

/// Impact level of a scheduled news event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsImpact {
    Low,
    Medium,
    High,
}

/// A scheduled economic news event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsEvent {
    pub timestamp: DateTime<Utc>,
    pub impact: NewsImpact,
    pub title: String,
}

/// Broker account snapshot. Read-only from the core's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    pub equity: Decimal,
    pub margin_used: Decimal,
    pub maintenance_margin: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// An open position as reported by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    pub symbol: String,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub unrealized_pnl: Decimal,
}

impl OpenPosition {
    /// Absolute market value of the position.
    #[must_use]
    pub fn exposure(&self) -> Decimal {
        (self.quantity * self.current_price).abs()
    }
}
