//! Conversation state store implementations for gencache.

pub mod in_memory;
pub mod noop;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStateStore;
pub use noop::NoopStateStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStateStore;
