pub mod channels;
pub mod confirmation;
pub mod publisher;

pub use channels::{ConsoleChannel, WebhookChannel};
pub use confirmation::{ConfirmationGate, ResponseHandle};
pub use publisher::{AlertPublisher, AlertWorker};
