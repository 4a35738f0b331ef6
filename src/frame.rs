//! In-memory tabular results and their projections.
//!
//! A [`Frame`] is materialized once per executed block; every assign form
//! (`COL`, `ROW`, `RECORDS`, ...) is a pure projection of that one frame.

use serde::Serialize;
use std::time::Duration;

use crate::db::{ColumnInfo, Record, Row, Value};

/// Ordered columns plus rows of cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frame {
    /// Column metadata, in result order.
    pub columns: Vec<ColumnInfo>,

    /// Rows of data.
    pub rows: Vec<Row>,

    /// Time taken to execute the query that produced this frame.
    #[serde(skip)]
    pub execution_time: Duration,
}

impl Frame {
    /// Creates an empty frame with no columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a frame with the given columns and rows.
    pub fn with_data(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            execution_time: Duration::ZERO,
        }
    }

    /// Sets the execution time.
    pub fn with_execution_time(mut self, duration: Duration) -> Self {
        self.execution_time = duration;
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the frame has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names, in order (`HEADINGS`).
    pub fn headings(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Values of the first column (`COL`).
    pub fn col(&self) -> Vec<Value> {
        self.column(0)
    }

    /// Values of the column at `index`; empty when out of range.
    pub fn column(&self, index: usize) -> Vec<Value> {
        if index >= self.columns.len() {
            return Vec::new();
        }
        self.rows
            .iter()
            .map(|row| row.get(index).cloned().unwrap_or_default())
            .collect()
    }

    /// Every column as a list of its values (`COLS`).
    pub fn cols(&self) -> Vec<Vec<Value>> {
        (0..self.columns.len()).map(|i| self.column(i)).collect()
    }

    /// The first row (`ROW`).
    pub fn row(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// First cell of the first row (`CELL`).
    pub fn cell(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    /// The first row keyed by column name (`RECORD`).
    pub fn record(&self) -> Option<Record> {
        self.rows.first().map(|row| self.to_record(row))
    }

    /// Every row keyed by column name (`RECORDS`).
    pub fn records(&self) -> Vec<Record> {
        self.rows.iter().map(|row| self.to_record(row)).collect()
    }

    fn to_record(&self, row: &Row) -> Record {
        self.columns
            .iter()
            .zip(row.iter())
            .map(|(col, value)| (col.name.clone(), value.clone()))
            .collect()
    }

    /// Returns a copy holding at most `limit` rows, for display previews.
    pub fn head(&self, limit: usize) -> Frame {
        Frame {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(limit).cloned().collect(),
            execution_time: self.execution_time,
        }
    }

    /// Returns a truncation warning when a preview of `limit` rows hides data.
    pub fn truncation_warning(&self, limit: usize) -> Option<String> {
        if self.rows.len() > limit {
            Some(format!(
                "Result truncated: showing {} of {} rows",
                limit,
                self.rows.len()
            ))
        } else {
            None
        }
    }
}
