// Job Domain Model

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::error::{DomainError, Result};
use crate::domain::QueueCategory;

/// Job ID (broker-assigned, unique within a category)
pub type JobId = String;

/// Group key: jobs sharing it are processed one at a time, in order key order
pub type GroupId = String;

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

impl JobState {
    /// Waiting or delayed: not yet handed to a worker slot
    pub fn is_pending(&self) -> bool {
        matches!(self, JobState::Waiting | JobState::Delayed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "WAITING",
            JobState::Delayed => "DELAYED",
            JobState::Active => "ACTIVE",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "WAITING" => Ok(JobState::Waiting),
            "DELAYED" => Ok(JobState::Delayed),
            "ACTIVE" => Ok(JobState::Active),
            "COMPLETED" => Ok(JobState::Completed),
            "FAILED" => Ok(JobState::Failed),
            other => Err(DomainError::InvalidState(other.to_string())),
        }
    }
}

/// Job Payload (JSON serializable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }

    /// Top-level field lookup (None for non-object payloads)
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.as_object().and_then(|map| map.get(key))
    }

    /// Set a top-level field (ignored for non-object payloads)
    pub fn set_field(&mut self, key: &str, value: serde_json::Value) {
        if let Some(map) = self.0.as_object_mut() {
            map.insert(key.to_string(), value);
        }
    }
}

/// Job Entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub category: QueueCategory,
    pub group_id: GroupId,
    pub payload: JobPayload,

    /// Intra-group processing order (epoch ms unless the caller supplies one)
    pub order_key: i64,
    /// Broker enqueue sequence, breaks order key ties
    pub seq: i64,
    pub state: JobState,

    pub enqueued_at: i64, // epoch ms
    pub delay_ms: Option<i64>,
    /// Earliest activation time (enqueued_at + delay)
    pub ready_at: i64,
    /// In-slot truncation wait before the handler runs
    pub timeout_ms: Option<i64>,
    /// When the submission was sent
    pub sent_at: Option<i64>,

    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub failure_reason: Option<String>,
}

/// Fields fixed at enqueue time
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: JobId,
    pub category: QueueCategory,
    pub group_id: GroupId,
    pub payload: JobPayload,
    pub order_key: i64,
    pub seq: i64,
    pub enqueued_at: i64,
    pub delay_ms: Option<i64>,
    pub timeout_ms: Option<i64>,
    pub sent_at: Option<i64>,
}

impl Job {
    /// Create a pending job; positive delays start out `Delayed`
    pub fn new(new: NewJob) -> Result<Self> {
        if new.group_id.trim().is_empty() {
            return Err(DomainError::ValidationError(format!(
                "job {} has an empty group id",
                new.id
            )));
        }

        let delay = new.delay_ms.filter(|d| *d > 0);
        let state = if delay.is_some() {
            JobState::Delayed
        } else {
            JobState::Waiting
        };

        let ready_at = new
            .enqueued_at
            .checked_add(delay.unwrap_or(0))
            .ok_or_else(|| {
                DomainError::ValidationError(format!(
                    "job {} delay of {}ms overflows the clock",
                    new.id,
                    delay.unwrap_or(0)
                ))
            })?;

        Ok(Self {
            id: new.id,
            category: new.category,
            group_id: new.group_id,
            payload: new.payload,
            order_key: new.order_key,
            seq: new.seq,
            state,
            enqueued_at: new.enqueued_at,
            delay_ms: new.delay_ms,
            ready_at,
            timeout_ms: new.timeout_ms,
            sent_at: new.sent_at,
            started_at: None,
            finished_at: None,
            failure_reason: None,
        })
    }

    /// Ready to be activated at `now_millis`
    pub fn is_ready(&self, now_millis: i64) -> bool {
        self.state.is_pending() && self.ready_at <= now_millis
    }

    /// State as observed at `now_millis` (a delayed job whose delay elapsed is waiting)
    pub fn state_at(&self, now_millis: i64) -> JobState {
        match self.state {
            JobState::Delayed | JobState::Waiting if self.ready_at <= now_millis => {
                JobState::Waiting
            }
            JobState::Waiting | JobState::Delayed => JobState::Delayed,
            other => other,
        }
    }

    /// Intra-group ordering key
    pub fn sort_key(&self) -> (i64, i64) {
        (self.order_key, self.seq)
    }

    /// Transition to Active with explicit timestamp
    pub fn activate(&mut self, now_millis: i64) -> Result<()> {
        if !self.state.is_pending() {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Active.to_string(),
            });
        }
        self.state = JobState::Active;
        self.started_at = Some(now_millis);
        Ok(())
    }

    /// Transition to Completed with explicit timestamp
    pub fn complete(&mut self, now_millis: i64) -> Result<()> {
        self.finish(JobState::Completed, now_millis)
    }

    /// Transition to Failed with explicit timestamp and reason
    pub fn fail(&mut self, now_millis: i64, reason: impl Into<String>) -> Result<()> {
        self.finish(JobState::Failed, now_millis)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    fn finish(&mut self, to: JobState, now_millis: i64) -> Result<()> {
        if self.state != JobState::Active {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        self.finished_at = Some(now_millis);
        Ok(())
    }
}
