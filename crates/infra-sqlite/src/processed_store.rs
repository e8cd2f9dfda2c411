// SQLite ProcessedStore Implementation

use async_trait::async_trait;
use groupq_core::domain::QueueCategory;
use groupq_core::error::Result;
use groupq_core::port::{ProcessedRecord, ProcessedStore};
use sqlx::SqlitePool;

use crate::error::storage_error;

pub struct SqliteProcessedStore {
    pool: SqlitePool,
}

impl SqliteProcessedStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessedStore for SqliteProcessedStore {
    async fn record_processed(&self, record: &ProcessedRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO processed_records (
                job_id, group_id, category, instance_id, customer_id,
                message_type, details, sent_at, processed_at, process_host_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.job_id)
        .bind(&record.group_id)
        .bind(record.category.as_str())
        .bind(&record.instance_id)
        .bind(&record.customer_id)
        .bind(&record.message_type)
        .bind(record.details.to_string())
        .bind(record.sent_at)
        .bind(record.processed_at)
        .bind(&record.process_host_id)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn list_by_group(&self, group_id: &str) -> Result<Vec<ProcessedRecord>> {
        let rows = sqlx::query_as::<_, ProcessedRow>(
            r#"
            SELECT job_id, group_id, category, instance_id, customer_id,
                   message_type, details, sent_at, processed_at, process_host_id
            FROM processed_records
            WHERE group_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.into_iter().map(ProcessedRow::into_record).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProcessedRow {
    job_id: String,
    group_id: String,
    category: String,
    instance_id: Option<String>,
    customer_id: Option<String>,
    message_type: Option<String>,
    details: String,
    sent_at: Option<i64>,
    processed_at: i64,
    process_host_id: String,
}

impl ProcessedRow {
    fn into_record(self) -> Result<ProcessedRecord> {
        let category: QueueCategory = self.category.parse()?;
        Ok(ProcessedRecord {
            job_id: self.job_id,
            group_id: self.group_id,
            category,
            instance_id: self.instance_id,
            customer_id: self.customer_id,
            message_type: self.message_type,
            details: serde_json::from_str(&self.details)?,
            sent_at: self.sent_at,
            processed_at: self.processed_at,
            process_host_id: self.process_host_id,
        })
    }
}
