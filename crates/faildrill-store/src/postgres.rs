use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use faildrill_core::{KeySource, LoadTestError, LoadTestResult, ReferenceKey, WriteError, WriteSink};
use sqlx::PgPool;
use tracing::debug;

use crate::config::WriteTarget;
use crate::error::{classify_write_error, StoreError};

/// PostgreSQL-backed reference key source and write sink.
pub struct PgWriteStore {
    pool: PgPool,
    key_query: String,
    insert_query: String,
    description: String,
}

impl PgWriteStore {
    /// Creates a store over an existing pool. `description` should not carry
    /// credentials.
    pub fn new(
        pool: PgPool,
        target: &WriteTarget,
        description: impl Into<String>,
    ) -> Result<Self, StoreError> {
        target.validate()?;
        Ok(Self {
            pool,
            key_query: target.key_query(),
            insert_query: target.insert_query(),
            description: description.into(),
        })
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl KeySource for PgWriteStore {
    async fn load_reference_keys(&self) -> LoadTestResult<Vec<ReferenceKey>> {
        sqlx::query_scalar::<_, i64>(&self.key_query)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| LoadTestError::setup(format!("failed to load reference keys: {}", err)))
    }
}

#[async_trait]
impl WriteSink for PgWriteStore {
    async fn write_one(&self, worker_id: usize, key: ReferenceKey) -> Result<(), WriteError> {
        // One checkout per write; the connection goes back to the pool (or is
        // dropped if broken) as soon as the transaction ends either way.
        let mut tx = self.pool.begin().await.map_err(classify_write_error)?;

        let notes = format!(
            "Failover test at {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
        );
        sqlx::query(&self.insert_query)
            .bind(format!("LoadTest-Worker{}", worker_id))
            .bind(format!("worker{}@loadtest.example.com", worker_id))
            .bind(notes)
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(classify_write_error)?;

        tx.commit().await.map_err(classify_write_error)?;
        debug!(worker_id, key, "Inserted synthetic record");
        Ok(())
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}
