pub mod broker;
pub mod calendar;
pub mod synthetic;

pub use broker::SimulatedBrokerAccount;
pub use calendar::StaticNewsCalendar;
pub use synthetic::{Scenario, SyntheticDataFeed};
