// Port Layer - Interfaces for external dependencies

pub mod grouped_queue;
pub mod id_provider; // For deterministic testing
pub mod memory_queue;
pub mod processed_store;
pub mod time_provider;

// Re-exports
pub use grouped_queue::{EnqueueRecord, GroupedQueue};
pub use id_provider::IdProvider;
pub use memory_queue::InMemoryGroupedQueue;
pub use processed_store::{ProcessedRecord, ProcessedStore};
pub use time_provider::TimeProvider;
