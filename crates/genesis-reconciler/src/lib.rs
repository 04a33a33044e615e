pub mod cascade;
pub mod error;
pub mod fanout;
pub mod report;
pub mod worker;

pub use cascade::{cascade_delete, has_remaining_children};
pub use error::ReconcileError;
pub use fanout::{fan_out, resolve_node_ids};
pub use report::{Change, ReconcileReport};
pub use worker::ReconcileWorker;
