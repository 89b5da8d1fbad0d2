//! Persistence layer: key/value stores behind the intro preference and seen-flags.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod preferences;
pub mod traits;

pub use libsql_backend::{LibSqlStore, open_durable_store};
pub use memory::MemoryStore;
pub use preferences::{PreferenceStore, storage_keys};
pub use traits::KeyValueStore;
