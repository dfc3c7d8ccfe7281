use async_trait::async_trait;

use crate::error::{LoadTestResult, WriteError};

/// Identifier of an existing row that synthetic writes must reference.
pub type ReferenceKey = i64;

/// Source of the reference key pool, queried once before workers start.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Returns every valid reference key. An empty result is a setup error
    /// raised by the driver, not by the source.
    async fn load_reference_keys(&self) -> LoadTestResult<Vec<ReferenceKey>>;
}

/// Write-capable target store under test.
#[async_trait]
pub trait WriteSink: Send + Sync {
    /// Opens a bounded-lifetime session, inserts one synthetic record that
    /// references `key`, commits and releases the session.
    ///
    /// Any failure along that sequence is returned as a [`WriteError`] and
    /// recorded as a failed attempt; the session is never reused after an error.
    async fn write_one(&self, worker_id: usize, key: ReferenceKey) -> Result<(), WriteError>;

    /// Short human-readable description of the target, without credentials.
    fn describe(&self) -> String;
}
