// Export handler

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

use super::JobHandler;
use crate::domain::{Job, QueueCategory};
use crate::error::{AppError, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportRequest {
    export_type: String,
    format: Option<String>,
    #[serde(default)]
    filters: Option<serde_json::Value>,
}

pub struct ExportHandler {
    work_duration: Duration,
}

impl ExportHandler {
    pub fn new(work_duration: Duration) -> Self {
        Self { work_duration }
    }
}

#[async_trait]
impl JobHandler for ExportHandler {
    fn category(&self) -> QueueCategory {
        QueueCategory::Export
    }

    async fn process(&self, job: &Job) -> Result<()> {
        let request: ExportRequest = serde_json::from_value(job.payload.as_value().clone())
            .map_err(|e| AppError::HandlerProcessing(format!("invalid export payload: {e}")))?;
        if request.export_type.is_empty() {
            return Err(AppError::HandlerProcessing(
                "exportType must not be empty".to_string(),
            ));
        }

        info!(
            job_id = %job.id,
            group_id = %job.group_id,
            export_type = %request.export_type,
            format = request.format.as_deref().unwrap_or("default"),
            filtered = request.filters.is_some(),
            "Processing export"
        );
        tokio::time::sleep(self.work_duration).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobPayload, NewJob};
    use serde_json::json;

    fn export_job(payload: serde_json::Value) -> Job {
        Job::new(NewJob {
            id: "exp-1".to_string(),
            category: QueueCategory::Export,
            group_id: "i1".to_string(),
            payload: JobPayload::new(payload),
            order_key: 1,
            seq: 1,
            enqueued_at: 0,
            delay_ms: None,
            timeout_ms: None,
            sent_at: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_export_requires_non_empty_type() {
        let handler = ExportHandler::new(Duration::ZERO);
        for payload in [json!({"instanceId": "i1"}), json!({"exportType": ""})] {
            let err = handler.process(&export_job(payload)).await.unwrap_err();
            assert!(matches!(err, AppError::HandlerProcessing(_)));
        }
    }

    #[tokio::test]
    async fn test_export_accepts_format_and_filters() {
        let handler = ExportHandler::new(Duration::ZERO);
        handler
            .process(&export_job(json!({
                "instanceId": "i1",
                "exportType": "contacts",
                "format": "xlsx",
                "filters": {"tag": "vip"},
            })))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_export_rejects_wrongly_typed_field() {
        let handler = ExportHandler::new(Duration::ZERO);
        let err = handler
            .process(&export_job(json!({"exportType": 7})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::HandlerProcessing(msg) if msg.contains("invalid export payload")));
    }
}
