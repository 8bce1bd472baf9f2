//! Trading session classification and session-specific parameter scaling.
//!
//! Sessions are fixed GMT windows; the multipliers applied inside each
//! window come from configuration. The clock also owns the GMT day boundary
//! used to reset daily risk state.

use crate::config::{SessionMultipliers, SessionsConfig};
use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// GMT trading session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingSession {
    /// 00:00-08:00 GMT.
    Asian,
    /// 08:00-13:00 GMT.
    European,
    /// 13:00-16:00 GMT. The optimal trading window.
    UsOverlap,
    /// 16:00-21:00 GMT.
    UsOnly,
    /// 21:00-00:00 GMT. No new positions.
    Closed,
}

impl std::fmt::Display for TradingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asian => write!(f, "ASIAN"),
            Self::European => write!(f, "EUROPEAN"),
            Self::UsOverlap => write!(f, "US_OVERLAP"),
            Self::UsOnly => write!(f, "US_ONLY"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Classifies wall-clock time into a session and hands out the session's
/// parameter multipliers.
#[derive(Debug, Clone)]
pub struct SessionClock {
    config: SessionsConfig,
}

impl SessionClock {
    #[must_use]
    pub const fn new(config: SessionsConfig) -> Self {
        Self { config }
    }

    /// Session containing the given instant.
    #[must_use]
    pub fn session_at(&self, at: DateTime<Utc>) -> TradingSession {
        match at.hour() {
            0..=7 => TradingSession::Asian,
            8..=12 => TradingSession::European,
            13..=15 => TradingSession::UsOverlap,
            16..=20 => TradingSession::UsOnly,
            _ => TradingSession::Closed,
        }
    }

    /// Session containing the current instant.
    #[must_use]
    pub fn current_session(&self) -> TradingSession {
        self.session_at(Utc::now())
    }

    /// Multipliers configured for the given session.
    #[must_use]
    pub const fn multipliers(&self, session: TradingSession) -> SessionMultipliers {
        match session {
            TradingSession::Asian => self.config.asian,
            TradingSession::European => self.config.european,
            TradingSession::UsOverlap => self.config.us_overlap,
            TradingSession::UsOnly => self.config.us_only,
            TradingSession::Closed => self.config.closed,
        }
    }

    /// Whether new positions may be opened at the given instant.
    ///
    /// Closed session forbids entries outright; the final minutes of the
    /// late US session are also blocked so positions can be flattened before
    /// liquidity dries up.
    #[must_use]
    pub fn allows_new_positions(&self, at: DateTime<Utc>) -> bool {
        match self.session_at(at) {
            TradingSession::Closed => false,
            TradingSession::UsOnly => !self.closure_required(at),
            _ => true,
        }
    }

    /// Whether open positions must be flattened at the given instant.
    #[must_use]
    pub fn closure_required(&self, at: DateTime<Utc>) -> bool {
        let session = self.session_at(at);
        if session == TradingSession::Closed {
            return true;
        }
        let cutoff = NaiveTime::from_hms_opt(20, 55, 0).expect("valid time");
        session == TradingSession::UsOnly && at.time() >= cutoff
    }

    /// The GMT day containing the given instant. Daily risk state resets
    /// when this value changes.
    #[must_use]
    pub fn day_key(&self, at: DateTime<Utc>) -> NaiveDate {
        at.date_naive()
    }
}
