// SQLite GroupedQueue Implementation
// Every transition is one statement, so it is atomic even across processes sharing the file

use async_trait::async_trait;
use groupq_core::domain::{
    Job, JobId, JobPayload, JobState, NewJob, QueueCategory, QueueConfig, QueueCounts,
};
use groupq_core::error::{AppError, Result};
use groupq_core::port::{EnqueueRecord, GroupedQueue, IdProvider, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

use crate::error::broker_error;

pub struct SqliteGroupedQueue {
    pool: SqlitePool,
    category: QueueCategory,
    keep_completed: usize,
    keep_failed: usize,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
}

impl SqliteGroupedQueue {
    pub fn new(
        pool: SqlitePool,
        config: &QueueConfig,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            pool,
            category: config.category,
            keep_completed: config.keep_completed,
            keep_failed: config.keep_failed,
            time_provider,
            id_provider,
        }
    }

    async fn finish(&self, id: &JobId, to: JobState, reason: Option<&str>) -> Result<Job> {
        let now = self.time_provider.now_millis();

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE queue_jobs
            SET state = ?, finished_at = ?, failure_reason = ?
            WHERE category = ? AND id = ? AND state = 'ACTIVE'
            RETURNING *
            "#,
        )
        .bind(to.as_str())
        .bind(now)
        .bind(reason)
        .bind(self.category.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(broker_error)?;

        let Some(row) = row else {
            return Err(match self.find_by_id(id).await? {
                Some(job) => AppError::InvalidState(format!(
                    "job {id} is {} and cannot be finished",
                    job.state
                )),
                None => AppError::NotFound(format!("job {id} in queue \"{}\"", self.category)),
            });
        };

        let keep = match to {
            JobState::Failed => self.keep_failed,
            _ => self.keep_completed,
        };
        self.evict_finished(to, keep).await?;
        row.into_job()
    }

    /// Drop the oldest finished jobs of `state` beyond `keep`
    async fn evict_finished(&self, state: JobState, keep: usize) -> Result<()> {
        let evicted = sqlx::query(
            r#"
            DELETE FROM queue_jobs
            WHERE category = ? AND state = ? AND seq NOT IN (
                SELECT seq FROM queue_jobs
                WHERE category = ? AND state = ?
                ORDER BY finished_at DESC, seq DESC
                LIMIT ?
            )
            "#,
        )
        .bind(self.category.as_str())
        .bind(state.as_str())
        .bind(self.category.as_str())
        .bind(state.as_str())
        .bind(keep as i64)
        .execute(&self.pool)
        .await
        .map_err(broker_error)?
        .rows_affected();

        if evicted > 0 {
            debug!(category = %self.category, state = %state, evicted, "Evicted finished jobs");
        }
        Ok(())
    }
}

#[async_trait]
impl GroupedQueue for SqliteGroupedQueue {
    fn category(&self) -> QueueCategory {
        self.category
    }

    async fn enqueue(&self, record: EnqueueRecord) -> Result<Job> {
        let now = self.time_provider.now_millis();
        // Validates the group and derives state/ready_at; seq comes from the table
        let job = Job::new(NewJob {
            id: self.id_provider.generate_id(),
            category: self.category,
            group_id: record.group_id,
            payload: record.payload,
            order_key: record.order_key,
            seq: 0,
            enqueued_at: now,
            delay_ms: record.delay_ms,
            timeout_ms: record.timeout_ms,
            sent_at: record.sent_at,
        })?;

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO queue_jobs (
                id, category, group_id, payload, order_key, state,
                enqueued_at, delay_ms, ready_at, timeout_ms, sent_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&job.id)
        .bind(self.category.as_str())
        .bind(&job.group_id)
        .bind(job.payload.as_value().to_string())
        .bind(job.order_key)
        .bind(job.state.as_str())
        .bind(job.enqueued_at)
        .bind(job.delay_ms)
        .bind(job.ready_at)
        .bind(job.timeout_ms)
        .bind(job.sent_at)
        .fetch_one(&self.pool)
        .await
        .map_err(broker_error)?;

        row.into_job()
    }

    async fn next_eligible(&self) -> Result<Option<Job>> {
        let now = self.time_provider.now_millis();

        // Eligible: ready, group idle, and no earlier pending job in the group
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE queue_jobs
            SET state = 'ACTIVE', started_at = ?
            WHERE seq = (
                SELECT j.seq FROM queue_jobs j
                WHERE j.category = ?
                  AND j.state IN ('WAITING', 'DELAYED')
                  AND j.ready_at <= ?
                  AND NOT EXISTS (
                      SELECT 1 FROM queue_jobs a
                      WHERE a.category = j.category
                        AND a.group_id = j.group_id
                        AND a.state = 'ACTIVE'
                  )
                  AND NOT EXISTS (
                      SELECT 1 FROM queue_jobs p
                      WHERE p.category = j.category
                        AND p.group_id = j.group_id
                        AND p.state IN ('WAITING', 'DELAYED')
                        AND (p.order_key < j.order_key
                             OR (p.order_key = j.order_key AND p.seq < j.seq))
                  )
                ORDER BY j.order_key ASC, j.seq ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(self.category.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(broker_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn mark_completed(&self, id: &JobId) -> Result<Job> {
        self.finish(id, JobState::Completed, None).await
    }

    async fn mark_failed(&self, id: &JobId, reason: &str) -> Result<Job> {
        self.finish(id, JobState::Failed, Some(reason)).await
    }

    async fn counts(&self) -> Result<QueueCounts> {
        let now = self.time_provider.now_millis();
        let (waiting, delayed, active, completed, failed): (i64, i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COALESCE(SUM(CASE WHEN state IN ('WAITING', 'DELAYED') AND ready_at <= ? THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN state IN ('WAITING', 'DELAYED') AND ready_at > ? THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN state = 'ACTIVE' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN state = 'COMPLETED' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN state = 'FAILED' THEN 1 ELSE 0 END), 0)
                FROM queue_jobs
                WHERE category = ?
                "#,
            )
            .bind(now)
            .bind(now)
            .bind(self.category.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(broker_error)?;

        Ok(QueueCounts {
            waiting: waiting as u64,
            active: active as u64,
            completed: completed as u64,
            failed: failed as u64,
            delayed: delayed as u64,
        })
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM queue_jobs WHERE category = ? AND id = ?",
        )
        .bind(self.category.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(broker_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn active_jobs(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM queue_jobs WHERE category = ? AND state = 'ACTIVE' ORDER BY seq ASC",
        )
        .bind(self.category.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(broker_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    seq: i64,
    id: String,
    category: String,
    group_id: String,
    payload: String,
    order_key: i64,
    state: String,
    enqueued_at: i64,
    delay_ms: Option<i64>,
    ready_at: i64,
    timeout_ms: Option<i64>,
    sent_at: Option<i64>,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    failure_reason: Option<String>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let category: QueueCategory = self.category.parse()?;
        let state: JobState = self.state.parse()?;
        let payload: serde_json::Value = serde_json::from_str(&self.payload)?;

        Ok(Job {
            id: self.id,
            category,
            group_id: self.group_id,
            payload: JobPayload::new(payload),
            order_key: self.order_key,
            seq: self.seq,
            state,
            enqueued_at: self.enqueued_at,
            delay_ms: self.delay_ms,
            ready_at: self.ready_at,
            timeout_ms: self.timeout_ms,
            sent_at: self.sent_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            failure_reason: self.failure_reason,
        })
    }
}
