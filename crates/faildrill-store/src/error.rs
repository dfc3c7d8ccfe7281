use faildrill_core::{LoadTestError, WriteError};
use thiserror::Error;

/// Errors raised while preparing the PostgreSQL target.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error("invalid POSTGRES_PORT '{0}'")]
    InvalidPort(String),

    #[error("invalid POSTGRES_SSL mode '{0}'")]
    InvalidSslMode(String),

    #[error("invalid SQL identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl From<StoreError> for LoadTestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingEnv(_)
            | StoreError::InvalidPort(_)
            | StoreError::InvalidSslMode(_)
            | StoreError::InvalidIdentifier(_) => LoadTestError::InvalidConfig(err.to_string()),
            StoreError::Sqlx(_) => LoadTestError::setup(err.to_string()),
        }
    }
}

/// Classify a failed write step into the per-attempt error recorded by the driver.
pub(crate) fn classify_write_error(err: sqlx::Error) -> WriteError {
    match err {
        sqlx::Error::Database(db_err) => WriteError::Database(db_err.message().to_string()),
        sqlx::Error::PoolTimedOut => {
            WriteError::Connection("timed out waiting for a database connection".to_string())
        }
        sqlx::Error::PoolClosed => WriteError::Connection("connection pool closed".to_string()),
        sqlx::Error::Io(e) => WriteError::Connection(e.to_string()),
        sqlx::Error::Tls(e) => WriteError::Connection(format!("TLS error: {}", e)),
        sqlx::Error::Protocol(message) => WriteError::Connection(message),
        other => WriteError::Database(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn transport_failures_are_connection_errors() {
        let refused = sqlx::Error::Io(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert_eq!(
            classify_write_error(refused),
            WriteError::Connection("connection refused".to_string())
        );
        assert!(matches!(
            classify_write_error(sqlx::Error::PoolTimedOut),
            WriteError::Connection(_)
        ));
    }

    #[test]
    fn row_not_found_is_a_database_error() {
        assert!(matches!(
            classify_write_error(sqlx::Error::RowNotFound),
            WriteError::Database(_)
        ));
    }

    #[test]
    fn converts_into_setup_errors() {
        let err: LoadTestError = StoreError::MissingEnv("POSTGRES_HOST").into();
        assert!(err.is_setup());
        assert!(err.to_string().contains("POSTGRES_HOST"));

        let err: LoadTestError = StoreError::Sqlx(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, LoadTestError::Setup { .. }));
    }
}
