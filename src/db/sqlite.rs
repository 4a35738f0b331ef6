//! SQLite database client implementation.
//!
//! In-memory URLs (`sqlite::memory:` and the bare `sqlite://`) get a pool
//! pinned to a single connection, otherwise every new connection would see
//! a fresh, empty database.

use crate::db::{ColumnInfo, DatabaseBackend, DatabaseClient, QueryOutput, Row, Value};
use crate::error::{NqlError, Result};
use crate::frame::Frame;
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{
    Column as SqlxColumn, Executor, Row as SqlxRow, Sqlite, Statement, TypeInfo, ValueRef,
};
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

type SqliteQuery<'q> = Query<'q, Sqlite, <Sqlite as sqlx::Database>::Arguments<'q>>;

/// SQLite database client.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
}

impl SqliteClient {
    /// Opens the database named by `url`, creating the file if needed.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = if is_memory_url(url) {
            debug!("Opening private in-memory SQLite database");
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
                .await?
        } else {
            let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        Ok(Self { pool })
    }
}

/// Returns true for URLs that name an in-memory database.
fn is_memory_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    rest.is_empty() || rest.starts_with(":memory:")
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Sqlite
    }

    async fn execute(
        &self,
        sql: &str,
        params: &[Value],
        schema: Option<&str>,
    ) -> Result<QueryOutput> {
        if let Some(schema) = schema {
            return Err(NqlError::config(format!(
                "SQLite has no search path; cannot scope statements to schema '{schema}'"
            )));
        }

        let start = Instant::now();
        let mut tx = self.pool.begin().await?;

        let statement = (&mut *tx).prepare(sql).await?;

        let output = if statement.columns().is_empty() {
            let result = bind_params(sqlx::query(sql), params)
                .execute(&mut *tx)
                .await?;
            QueryOutput::Done {
                rows_affected: result.rows_affected(),
            }
        } else {
            let columns: Vec<ColumnInfo> = statement
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect();

            let mut rows = Vec::new();
            {
                let mut stream = bind_params(sqlx::query(sql), params).fetch(&mut *tx);
                while let Some(row) = stream.try_next().await? {
                    rows.push(convert_row(&row));
                }
            }

            QueryOutput::Rows(
                Frame::with_data(columns, rows).with_execution_time(start.elapsed()),
            )
        };

        tx.commit().await?;
        Ok(output)
    }

    async fn create_schema(&self, schema: &str, _drop_first: bool) -> Result<()> {
        Err(NqlError::config(format!(
            "SQLite does not support schemas; remove schema '{schema}' from the session"
        )))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Binds every parameter in order.
fn bind_params<'q>(mut query: SqliteQuery<'q>, params: &[Value]) -> SqliteQuery<'q> {
    for value in params {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            Value::String(s) => query.bind(s.clone()),
            Value::Bytes(b) => query.bind(b.clone()),
            Value::List(_) | Value::Record(_) => query.bind(value.to_json_string()),
        };
    }
    query
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Row {
    (0..row.columns().len())
        .map(|i| convert_value(row, i))
        .collect()
}

/// Decodes by the storage class of the stored value rather than the declared
/// column type, since expression columns have no declared type.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_uppercase(),
        Err(_) => return Value::Null,
    };

    match type_name.as_str() {
        "INTEGER" | "INT8" => row
            .try_get_unchecked::<i64, _>(index)
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "BOOLEAN" => row
            .try_get_unchecked::<bool, _>(index)
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "REAL" => row
            .try_get_unchecked::<f64, _>(index)
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        _ => row
            .try_get_unchecked::<String, _>(index)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}
