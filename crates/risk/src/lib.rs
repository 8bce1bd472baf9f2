pub mod ledger;
pub mod liquidation;
pub mod sizer;

pub use ledger::{DailyRiskLedger, LossHistory};
pub use liquidation::LiquidationGuard;
pub use sizer::RiskSizer;
