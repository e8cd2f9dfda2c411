// GroupQ Infrastructure - SQLite Adapter
// Implements: GroupedQueue (broker), ProcessedStore (audit trail)

mod connection;
mod error;
mod grouped_queue;
mod migration;
mod processed_store;

pub use connection::{create_pool, database_url};
pub use grouped_queue::SqliteGroupedQueue;
pub use migration::run_migrations;
pub use processed_store::SqliteProcessedStore;

// Re-exported so callers can hold a pool without depending on sqlx directly
pub use sqlx::SqlitePool;
