// Import handler

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

use super::JobHandler;
use crate::domain::{Job, QueueCategory};
use crate::error::{AppError, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportRequest {
    import_type: String,
    file_url: Option<String>,
    file_path: Option<String>,
    #[serde(default)]
    options: Option<serde_json::Value>,
}

pub struct ImportHandler {
    work_duration: Duration,
}

impl ImportHandler {
    pub fn new(work_duration: Duration) -> Self {
        Self { work_duration }
    }
}

#[async_trait]
impl JobHandler for ImportHandler {
    fn category(&self) -> QueueCategory {
        QueueCategory::Import
    }

    async fn process(&self, job: &Job) -> Result<()> {
        let request: ImportRequest = serde_json::from_value(job.payload.as_value().clone())
            .map_err(|e| AppError::HandlerProcessing(format!("invalid import payload: {e}")))?;
        if request.import_type.is_empty() {
            return Err(AppError::HandlerProcessing(
                "importType must not be empty".to_string(),
            ));
        }

        info!(
            job_id = %job.id,
            group_id = %job.group_id,
            import_type = %request.import_type,
            file_url = ?request.file_url,
            file_path = ?request.file_path,
            has_options = request.options.is_some(),
            "Processing import"
        );
        tokio::time::sleep(self.work_duration).await;
        Ok(())
    }
}
