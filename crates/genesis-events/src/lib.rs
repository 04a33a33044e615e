pub mod bus;
pub mod dispatcher;
pub mod error;

pub use bus::{EventBus, Subscriber};
pub use dispatcher::Dispatcher;
pub use error::EventError;
