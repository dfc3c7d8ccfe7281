//! Connection and schema settings for the PostgreSQL target.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::error::StoreError;

const DEFAULT_PORT: u16 = 5432;

/// Connection settings read from the `POSTGRES_*` environment variables.
#[derive(Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    /// libpq-style `sslmode` (`disable`, `prefer`, `require`, `verify-full`, ...).
    pub ssl_mode: Option<String>,
    /// Bound on opening a session, including waiting for a pooled connection.
    pub connect_timeout: Duration,
    /// Server-side `statement_timeout` applied to every session.
    pub statement_timeout: Duration,
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout", &self.connect_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .finish()
    }
}

impl PostgresConfig {
    /// Read settings from the process environment.
    ///
    /// Required: `POSTGRES_HOST`, `POSTGRES_DATABASE`, `POSTGRES_USERNAME`,
    /// `POSTGRES_PASSWORD`. Optional: `POSTGRES_PORT` (5432), `POSTGRES_SSL`.
    pub fn from_env() -> Result<Self, StoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StoreError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or(StoreError::MissingEnv(key))
        };

        let port = match lookup("POSTGRES_PORT").filter(|p| !p.is_empty()) {
            Some(raw) => raw
                .parse()
                .map_err(|_| StoreError::InvalidPort(raw.clone()))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            host: required("POSTGRES_HOST")?,
            port,
            database: required("POSTGRES_DATABASE")?,
            username: required("POSTGRES_USERNAME")?,
            password: required("POSTGRES_PASSWORD")?,
            ssl_mode: lookup("POSTGRES_SSL").filter(|s| !s.is_empty()),
            connect_timeout: Duration::from_secs(10),
            statement_timeout: Duration::from_millis(5_000),
        })
    }

    /// Build sqlx connect options.
    pub fn connect_options(&self) -> Result<PgConnectOptions, StoreError> {
        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .password(&self.password)
            .application_name("faildrill")
            .options([(
                "statement_timeout",
                self.statement_timeout.as_millis().to_string(),
            )]);

        if let Some(mode) = &self.ssl_mode {
            let mode =
                PgSslMode::from_str(mode).map_err(|_| StoreError::InvalidSslMode(mode.clone()))?;
            options = options.ssl_mode(mode);
        }

        Ok(options)
    }

    /// Connection target without credentials, for banners and logs.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "postgres://{}@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }
}

/// Tables and columns used by the synthetic write.
///
/// Identifiers are interpolated into SQL, so they are validated up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteTarget {
    /// Table holding the valid reference keys.
    pub key_table: String,
    /// Key column in `key_table`.
    pub key_column: String,
    /// Table receiving synthetic rows.
    pub target_table: String,
    /// Column in `target_table` referencing `key_table.key_column`.
    pub target_key_column: String,
}

impl Default for WriteTarget {
    fn default() -> Self {
        Self {
            key_table: "cruise".to_string(),
            key_column: "id".to_string(),
            target_table: "inforequest".to_string(),
            target_key_column: "cruise_id".to_string(),
        }
    }
}

impl WriteTarget {
    pub fn validate(&self) -> Result<(), StoreError> {
        for ident in [
            &self.key_table,
            &self.key_column,
            &self.target_table,
            &self.target_key_column,
        ] {
            validate_identifier(ident)?;
        }
        Ok(())
    }

    pub(crate) fn key_query(&self) -> String {
        format!(
            "SELECT {col}::bigint FROM {table} WHERE {col} IS NOT NULL",
            col = self.key_column,
            table = self.key_table
        )
    }

    pub(crate) fn insert_query(&self) -> String {
        format!(
            "INSERT INTO {} (name, email, notes, {}) VALUES ($1, $2, $3, $4)",
            self.target_table, self.target_key_column
        )
    }
}

/// Accepts plain or schema-qualified identifiers: `[A-Za-z_][A-Za-z0-9_]*`,
/// optionally joined by a single `.`.
fn validate_identifier(ident: &str) -> Result<(), StoreError> {
    let parts: Vec<&str> = ident.split('.').collect();
    let valid = parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(ident.to_string()))
    }
}
