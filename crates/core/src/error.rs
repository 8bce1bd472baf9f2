//! Error types for the sentinel decision pipeline.
//!
//! Every failure mode the tick loop knows how to survive is a named variant
//! here. Anything else that reaches the loop is treated as fatal: reported at
//! the highest severity and the loop halts.

use thiserror::Error;

/// Errors produced by the decision pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum SentinelError {
    /// A data feed fetch failed. The regime tick short-circuits to
    /// `DataError` and retries next tick.
    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable {
        /// Instrument symbol that could not be fetched.
        symbol: String,
        /// Underlying cause.
        reason: String,
    },

    /// A feed returned fewer bars than requested. Feeds must never silently
    /// return partial series, so this is surfaced as its own variant.
    #[error("insufficient history for {symbol}: requested {requested}, got {got}")]
    InsufficientHistory {
        /// Instrument symbol.
        symbol: String,
        /// Number of bars requested.
        requested: usize,
        /// Number of bars actually available.
        got: usize,
    },

    /// Correlation volatility breached the configured limit.
    #[error("regime unreliable: correlation volatility {volatility:.3} over limit")]
    UnreliableRegime {
        /// Observed correlation volatility.
        volatility: f64,
    },

    /// A divergence signal was dropped by one of the rejection filters.
    #[error("divergence rejected by {filter} filter")]
    FilterRejected {
        /// Name of the filter that caused rejection.
        filter: &'static str,
    },

    /// The daily risk budget has no room left for this proposal.
    #[error("daily risk budget exhausted: {remaining} remaining")]
    RiskBudgetExhausted {
        /// Budget remaining at the time of the request (as a display string).
        remaining: String,
    },

    /// Margin level is WARNING or DANGER; new entries are blocked.
    #[error("margin unsafe: {level}")]
    MarginUnsafe {
        /// The margin level that blocked the entry.
        level: String,
    },

    /// No human response arrived within the confirmation window.
    #[error("confirmation timed out for proposal {proposal_id}")]
    ConfirmationTimeout {
        /// Proposal that timed out.
        proposal_id: String,
    },

    /// The trader-readiness check overrode a human confirmation.
    #[error("readiness rejected: {reason}")]
    ReadinessRejected {
        /// Which readiness rule failed.
        reason: String,
    },

    /// An alert channel failed to deliver.
    #[error("alert channel error: {0}")]
    ChannelError(String),

    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SentinelError {
    /// Creates a data-unavailable error.
    pub fn data_unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// Creates an insufficient-history error.
    pub fn insufficient_history(symbol: impl Into<String>, requested: usize, got: usize) -> Self {
        Self::InsufficientHistory {
            symbol: symbol.into(),
            requested,
            got,
        }
    }

    /// Returns true if the tick loop may log this error and continue.
    ///
    /// Everything in this taxonomy is recoverable; the variants exist so the
    /// loop can tell a survivable fault from an unknown one arriving through
    /// `anyhow`, which must halt the system instead.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DataUnavailable { .. }
                | Self::InsufficientHistory { .. }
                | Self::UnreliableRegime { .. }
                | Self::FilterRejected { .. }
                | Self::RiskBudgetExhausted { .. }
                | Self::MarginUnsafe { .. }
                | Self::ConfirmationTimeout { .. }
                | Self::ReadinessRejected { .. }
                | Self::ChannelError(_)
        )
    }
}

/// Result type alias for sentinel operations.
pub type Result<T> = std::result::Result<T, SentinelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_unavailable_display_names_symbol() {
        let err = SentinelError::data_unavailable("US500", "feed offline");
        assert!(err.to_string().contains("US500"));
        assert!(err.to_string().contains("feed offline"));
    }

    #[test]
    fn insufficient_history_display_has_counts() {
        let err = SentinelError::insufficient_history("VIX", 30, 12);
        assert!(err.to_string().contains("30"));
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn taxonomy_is_recoverable() {
        assert!(SentinelError::data_unavailable("US500", "x").is_recoverable());
        assert!(SentinelError::UnreliableRegime { volatility: 0.2 }.is_recoverable());
        assert!(SentinelError::FilterRejected { filter: "news" }.is_recoverable());
        assert!(SentinelError::RiskBudgetExhausted {
            remaining: "0".to_string()
        }
        .is_recoverable());
        assert!(SentinelError::ConfirmationTimeout {
            proposal_id: "1-US500".to_string()
        }
        .is_recoverable());
    }

    #[test]
    fn configuration_error_is_not_recoverable() {
        let err = SentinelError::Configuration("missing instruments".to_string());
        assert!(!err.is_recoverable());
    }
}
