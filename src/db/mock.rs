//! Mock database client for testing.
//!
//! Records every statement it receives so tests can assert on what the
//! executor sent, and answers row-returning statements with a canned frame.

use super::{ColumnInfo, DatabaseBackend, DatabaseClient, QueryOutput, Value};
use crate::error::Result;
use crate::frame::Frame;
use async_trait::async_trait;
use std::sync::Mutex;

/// A statement as received by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub params: Vec<Value>,
    pub schema: Option<String>,
}

/// A mock database client that returns predefined results.
pub struct MockDatabaseClient {
    frame: Frame,
    fail_on: Option<String>,
    executed: Mutex<Vec<ExecutedStatement>>,
}

impl MockDatabaseClient {
    /// Creates a mock answering SELECTs with a one-column, one-row frame.
    pub fn new() -> Self {
        Self::with_frame(Frame::with_data(
            vec![ColumnInfo::new("result", "TEXT")],
            vec![vec![Value::from("mock")]],
        ))
    }

    /// Creates a mock answering SELECTs with the given frame.
    pub fn with_frame(frame: Frame) -> Self {
        Self {
            frame,
            fail_on: None,
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Makes every statement containing `pattern` fail with a driver error.
    pub fn failing_on(mut self, pattern: impl Into<String>) -> Self {
        self.fail_on = Some(pattern.into());
        self
    }

    /// Statements received so far, in order.
    pub fn executed(&self) -> Vec<ExecutedStatement> {
        self.executed
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Sqlite
    }

    async fn execute(
        &self,
        sql: &str,
        params: &[Value],
        schema: Option<&str>,
    ) -> Result<QueryOutput> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(ExecutedStatement {
                sql: sql.to_string(),
                params: params.to_vec(),
                schema: schema.map(String::from),
            });
        }

        if let Some(pattern) = &self.fail_on {
            if sql.contains(pattern.as_str()) {
                return Err(sqlx::Error::Protocol(format!("mock failure on '{pattern}'")).into());
            }
        }

        let sql_upper = sql.trim_start().to_uppercase();
        if sql_upper.starts_with("SELECT") || sql_upper.starts_with("WITH") {
            Ok(QueryOutput::Rows(self.frame.clone()))
        } else {
            Ok(QueryOutput::Done { rows_affected: 0 })
        }
    }

    async fn create_schema(&self, schema: &str, drop_first: bool) -> Result<()> {
        if drop_first {
            self.execute(&format!("DROP SCHEMA {schema}"), &[], None)
                .await?;
        }
        self.execute(&format!("CREATE SCHEMA {schema}"), &[], None)
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
