pub mod entity;
pub mod error;
pub mod memory;
pub mod redb_store;
pub mod store;

pub use entity::{EventKind, OutboxEvent, ScanFilter, StoredEntity};
pub use error::StoreError;
pub use memory::InMemoryResourceStore;
pub use redb_store::RedbResourceStore;
pub use store::{now, ResourceStore, StatusDiscriminant};
