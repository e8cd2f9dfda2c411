// Application Layer - Use Cases and Dispatch Logic

pub mod dispatch;
pub mod handler;
pub mod ingestion;
pub mod recovery;
pub mod truncation;
pub mod worker;

// Re-exports
pub use dispatch::{DispatchService, QueueBinding, QueueRegistry};
pub use handler::{Handler, HandlerFactory, HandlerRegistry, JobHandler, StandardHandlerFactory};
pub use ingestion::{IngestionSequencer, SubmitOptions};
pub use recovery::RecoveryService;
pub use worker::{PoolCloseReport, PoolSettings, WorkerPool, WorkerPools};
