// Domain Layer - Pure dispatch rules and entities

pub mod error;
pub mod group;
pub mod job;
pub mod queue;

// Re-exports
pub use error::DomainError;
pub use group::{payload_identifier, resolve_group_id};
pub use job::{GroupId, Job, JobId, JobPayload, JobState, NewJob};
pub use queue::{CategoryStatus, PerCategory, QueueCategory, QueueConfig, QueueCounts};
