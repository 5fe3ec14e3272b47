//! corpus-store - Index persistence
//!
//! Adapters behind [`IndexStore`]: a single JSON file (the default), a
//! SQLite database with normalized document/chunk tables, and an in-memory
//! store for tests. All of them save and load the whole index at once, and
//! all of them report missing or corrupt data as "no index".

mod json;
mod memory;
mod schema;
mod sqlite;

pub use json::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

// Re-export schema for testing/migrations
pub use schema::{SCHEMA, SCHEMA_VERSION};

use corpus_core::{IndexStore, Result, StoreBackendKind, StoreConfig};

/// Open the store selected by the `[store]` config section.
pub fn store_from_config(config: &StoreConfig) -> Result<Box<dyn IndexStore>> {
    match config.backend {
        StoreBackendKind::Json => Ok(Box::new(JsonFileStore::new(&config.path))),
        StoreBackendKind::Sqlite => Ok(Box::new(SqliteStore::open(&config.path)?)),
    }
}
