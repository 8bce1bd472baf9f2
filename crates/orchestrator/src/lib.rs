pub mod engine;
pub mod monitor;

pub use engine::{TickEngine, TickOutcome};
pub use monitor::{spawn_correlation_watcher, spawn_margin_monitor};
