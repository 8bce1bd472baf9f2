pub mod correlation;
pub mod divergence;
pub mod regime;

#[cfg(test)]
pub(crate) mod testutil;

pub use correlation::{
    assess_health, correlation_reading, pair_correlation, CorrelationMonitor, PairHealth,
};
pub use divergence::DivergenceEngine;
pub use regime::{classify_score, RegimeEngine};
