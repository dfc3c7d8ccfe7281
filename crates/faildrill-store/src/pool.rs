use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::PostgresConfig;
use crate::error::StoreError;

/// Extra connections kept above the worker count for setup queries and churn.
const POOL_HEADROOM: u32 = 5;

/// Creates a PostgreSQL connection pool sized for `workers` concurrent writers.
///
/// Connections are health-checked before each checkout and recycled after an
/// hour, so a session broken by a failover is discarded rather than reused.
pub async fn create_pg_pool(config: &PostgresConfig, workers: usize) -> Result<PgPool, StoreError> {
    let options = config.connect_options()?;
    let max_connections = u32::try_from(workers)
        .unwrap_or(u32::MAX)
        .saturating_add(POOL_HEADROOM);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(config.connect_timeout)
        .test_before_acquire(true)
        .max_lifetime(Duration::from_secs(3600))
        .connect_with(options)
        .await?;

    Ok(pool)
}
