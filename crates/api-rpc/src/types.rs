//! RPC Request/Response Types
//!
//! JSON-RPC method parameters and results. Categories travel as strings and
//! are parsed by the handler.

use groupq_core::domain::{CategoryStatus, Job, QueueCounts};
use serde::{Deserialize, Serialize};

/// queue.submit.v1 - Submit a job to a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub category: String,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub order_key: Option<i64>,
    #[serde(default)]
    pub delay_ms: Option<i64>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub category: String,
    pub group_id: String,
    pub state: String,
    pub order_key: i64,
    pub sent_at: Option<i64>,
}

impl From<Job> for SubmitResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            category: job.category.as_str().to_string(),
            group_id: job.group_id,
            state: job.state.as_str().to_string(),
            order_key: job.order_key,
            sent_at: job.sent_at,
        }
    }
}

/// queue.status.v1 - Counts of one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRequest {
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub category: String,
    pub name: String,
    pub concurrency: usize,
    pub counts: QueueCounts,
}

impl From<CategoryStatus> for StatusResponse {
    fn from(status: CategoryStatus) -> Self {
        Self {
            category: status.category.as_str().to_string(),
            name: status.display_name,
            concurrency: status.concurrency,
            counts: status.counts,
        }
    }
}

/// queue.status_all.v1 - Counts of every category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusAllResponse {
    pub queues: Vec<StatusResponse>,
}

/// queue.handlers.v1 - Handlers built so far
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlersResponse {
    pub instantiated: Vec<String>,
}

/// queue.job.v1 - Look up one job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub category: String,
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    pub job_id: String,
    pub group_id: String,
    pub state: String,
    pub order_key: i64,
    pub enqueued_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub failure_reason: Option<String>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            group_id: job.group_id,
            state: job.state.as_str().to_string(),
            order_key: job.order_key,
            enqueued_at: job.enqueued_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
            failure_reason: job.failure_reason,
        }
    }
}
