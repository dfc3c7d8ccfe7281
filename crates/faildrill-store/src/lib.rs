//! PostgreSQL target store for the faildrill load tester.

mod config;
mod error;
mod pool;
mod postgres;

pub use config::{PostgresConfig, WriteTarget};
pub use error::StoreError;
pub use pool::create_pg_pool;
pub use postgres::PgWriteStore;

/// Connects to the database described by `config` and builds a store for `target`.
pub async fn connect(
    config: &PostgresConfig,
    target: &WriteTarget,
    workers: usize,
) -> Result<PgWriteStore, StoreError> {
    target.validate()?;
    let pool = create_pg_pool(config, workers).await?;
    PgWriteStore::new(pool, target, config.describe())
}
