//! RPC Method Handlers
//!
//! Parses wire types and forwards to the dispatch service.

use crate::error::to_rpc_error;
use crate::types::{
    HandlersResponse, JobRequest, JobResponse, StatusAllResponse, StatusRequest, StatusResponse,
    SubmitRequest, SubmitResponse,
};
use groupq_core::application::{DispatchService, SubmitOptions};
use groupq_core::domain::QueueCategory;
use groupq_core::error::AppError;
use groupq_core::port::TimeProvider;
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use tracing::debug;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    dispatch: Arc<DispatchService>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RpcHandler {
    pub fn new(dispatch: Arc<DispatchService>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            dispatch,
            time_provider,
        }
    }

    /// queue.submit.v1
    pub async fn submit(&self, params: SubmitRequest) -> Result<SubmitResponse, ErrorObjectOwned> {
        let category = parse_category(&params.category)?;
        let options = SubmitOptions {
            order_key: params.order_key,
            delay_ms: params.delay_ms,
            group_id: params.group_id,
            timeout_ms: params.timeout_ms,
            sent_at: Some(self.time_provider.now_millis()),
        };

        let job = self
            .dispatch
            .submit_job(category, params.payload, options)
            .await
            .map_err(to_rpc_error)?;

        debug!(category = %category, job_id = %job.id, group_id = %job.group_id, "Job submitted via RPC");
        Ok(SubmitResponse::from(job))
    }

    /// queue.status.v1
    pub async fn status(&self, params: StatusRequest) -> Result<StatusResponse, ErrorObjectOwned> {
        let category = parse_category(&params.category)?;
        let status = self
            .dispatch
            .get_counts(category)
            .await
            .map_err(to_rpc_error)?;
        Ok(StatusResponse::from(status))
    }

    /// queue.status_all.v1
    pub async fn status_all(&self) -> Result<StatusAllResponse, ErrorObjectOwned> {
        let statuses = self.dispatch.get_all_counts().await.map_err(to_rpc_error)?;
        Ok(StatusAllResponse {
            queues: statuses.into_iter().map(StatusResponse::from).collect(),
        })
    }

    /// queue.handlers.v1
    pub fn handlers(&self) -> HandlersResponse {
        HandlersResponse {
            instantiated: self
                .dispatch
                .instantiated_handlers()
                .into_iter()
                .map(|c| c.as_str().to_string())
                .collect(),
        }
    }

    /// queue.job.v1
    pub async fn job(&self, params: JobRequest) -> Result<JobResponse, ErrorObjectOwned> {
        let category = parse_category(&params.category)?;
        let job = self
            .dispatch
            .find_job(category, &params.job_id)
            .await
            .map_err(to_rpc_error)?
            .ok_or_else(|| to_rpc_error(AppError::NotFound(format!("job {}", params.job_id))))?;
        Ok(JobResponse::from(job))
    }
}

fn parse_category(raw: &str) -> Result<QueueCategory, ErrorObjectOwned> {
    raw.parse::<QueueCategory>().map_err(to_rpc_error)
}
