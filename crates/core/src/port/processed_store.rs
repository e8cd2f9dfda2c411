// Processed Record Store Port (audit trail of handled jobs)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{GroupId, JobId, QueueCategory};
use crate::error::Result;

/// One row per job a handler processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub job_id: JobId,
    pub group_id: GroupId,
    pub category: QueueCategory,
    pub instance_id: Option<String>,
    pub customer_id: Option<String>,
    pub message_type: Option<String>,
    /// Handler-specific body (message content, import/export parameters)
    pub details: serde_json::Value,
    pub sent_at: Option<i64>,
    pub processed_at: i64, // epoch ms
    pub process_host_id: String,
}

/// Append-only store; a failed write fails the job that produced it
#[async_trait]
pub trait ProcessedStore: Send + Sync {
    async fn record_processed(&self, record: &ProcessedRecord) -> Result<()>;

    /// Records of one group in the order they were written
    async fn list_by_group(&self, group_id: &str) -> Result<Vec<ProcessedRecord>>;
}

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// Vec-backed store for tests and the in-memory broker mode
    #[derive(Default)]
    pub struct InMemoryProcessedStore {
        records: Mutex<Vec<ProcessedRecord>>,
    }

    impl InMemoryProcessedStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn all(&self) -> Vec<ProcessedRecord> {
            self.records
                .lock()
                .map(|records| records.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl ProcessedStore for InMemoryProcessedStore {
        async fn record_processed(&self, record: &ProcessedRecord) -> Result<()> {
            self.records
                .lock()
                .map_err(|_| AppError::Database("processed store lock poisoned".to_string()))?
                .push(record.clone());
            Ok(())
        }

        async fn list_by_group(&self, group_id: &str) -> Result<Vec<ProcessedRecord>> {
            let records = self
                .records
                .lock()
                .map_err(|_| AppError::Database("processed store lock poisoned".to_string()))?;
            Ok(records
                .iter()
                .filter(|r| r.group_id == group_id)
                .cloned()
                .collect())
        }
    }
}
