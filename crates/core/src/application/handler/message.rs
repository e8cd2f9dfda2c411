// Message handler: records each processed message, then simulates delivery

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::JobHandler;
use crate::domain::group::{CUSTOMER_ID_FIELD, INSTANCE_ID_FIELD};
use crate::domain::{payload_identifier, Job, QueueCategory};
use crate::error::Result;
use crate::port::{ProcessedRecord, ProcessedStore, TimeProvider};

/// Payload field carrying the message body
const MESSAGE_FIELD: &str = "message";
const UNKNOWN_MESSAGE_TYPE: &str = "unknown";

pub struct MessageHandler {
    store: Arc<dyn ProcessedStore>,
    time_provider: Arc<dyn TimeProvider>,
    host_id: String,
    work_duration: Duration,
}

impl MessageHandler {
    pub fn new(
        store: Arc<dyn ProcessedStore>,
        time_provider: Arc<dyn TimeProvider>,
        host_id: String,
        work_duration: Duration,
    ) -> Self {
        Self {
            store,
            time_provider,
            host_id,
            work_duration,
        }
    }

    fn build_record(&self, job: &Job) -> ProcessedRecord {
        let message = job
            .payload
            .field(MESSAGE_FIELD)
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let message_type = message
            .get("type")
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or(UNKNOWN_MESSAGE_TYPE)
            .to_string();

        ProcessedRecord {
            job_id: job.id.clone(),
            group_id: job.group_id.clone(),
            category: QueueCategory::Message,
            instance_id: payload_identifier(&job.payload, INSTANCE_ID_FIELD),
            customer_id: payload_identifier(&job.payload, CUSTOMER_ID_FIELD),
            message_type: Some(message_type),
            details: message,
            sent_at: job.sent_at,
            processed_at: self.time_provider.now_millis(),
            process_host_id: self.host_id.clone(),
        }
    }
}

#[async_trait]
impl JobHandler for MessageHandler {
    fn category(&self) -> QueueCategory {
        QueueCategory::Message
    }

    async fn process(&self, job: &Job) -> Result<()> {
        let record = self.build_record(job);
        self.store.record_processed(&record).await?;
        info!(
            job_id = %job.id,
            group_id = %job.group_id,
            message_type = record.message_type.as_deref().unwrap_or(UNKNOWN_MESSAGE_TYPE),
            "Message recorded"
        );

        tokio::time::sleep(self.work_duration).await;
        Ok(())
    }
}
