//! Database abstraction layer for noteql.
//!
//! Provides a trait-based interface over the SQL-speaking store, allowing
//! different backends to be used interchangeably by sessions.

mod mock;
mod postgres;
mod sqlite;
mod types;

pub use mock::{ExecutedStatement, MockDatabaseClient};
pub use postgres::PostgresClient;
pub use sqlite::SqliteClient;
pub use types::{ColumnInfo, QueryOutput, Record, Row, Value};

use crate::error::{NqlError, Result};
use crate::template::ParamStyle;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Postgres,
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a backend from a URL scheme or backend name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Detects the backend from a connection URL.
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme)
            .ok_or_else(|| NqlError::config(format!("Invalid connection URL '{}'", redact_url(url))))?;

        Self::parse(scheme).ok_or_else(|| {
            NqlError::config(format!(
                "Unsupported scheme '{scheme}'. Expected 'postgres', 'postgresql' or 'sqlite'"
            ))
        })
    }

    /// Placeholder convention this backend expects for bound parameters.
    pub fn param_style(&self) -> ParamStyle {
        match self {
            Self::Postgres => ParamStyle::Dollar,
            Self::Sqlite => ParamStyle::QMark,
        }
    }
}

/// Opens a client for the backend named by the URL scheme.
///
/// This is the central factory function for database connections.
pub async fn connect(url: &str) -> Result<Arc<dyn DatabaseClient>> {
    match DatabaseBackend::from_url(url)? {
        DatabaseBackend::Postgres => {
            let client = PostgresClient::connect(url).await?;
            Ok(Arc::new(client))
        }
        DatabaseBackend::Sqlite => {
            let client = SqliteClient::connect(url).await?;
            Ok(Arc::new(client))
        }
    }
}

/// Returns the URL with any password removed, for logs and display.
pub fn redact_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(None);
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}

/// Trait defining the interface for database clients.
///
/// All operations are async and return Results with NqlError. Driver
/// failures are passed through as [`NqlError::Backend`].
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// The backend this client talks to.
    fn backend(&self) -> DatabaseBackend;

    /// Placeholder style used when rendering templates for this client.
    fn param_style(&self) -> ParamStyle {
        self.backend().param_style()
    }

    /// Runs one statement inside its own transaction.
    ///
    /// When `schema` is given, the search path is set for the duration of
    /// that transaction only.
    async fn execute(&self, sql: &str, params: &[Value], schema: Option<&str>)
        -> Result<QueryOutput>;

    /// Creates `schema` if missing, dropping it first when `drop_first` is set.
    async fn create_schema(&self, schema: &str, drop_first: bool) -> Result<()>;

    /// Closes the underlying pool.
    async fn close(&self) -> Result<()>;
}
