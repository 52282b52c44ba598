use crate::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A SQL statement to execute.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub sql: String,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }
}

/// A single row of query results, positionally aligned with the result columns.
pub type Row = Vec<Value>;

/// A row addressed by column name. Insertion order follows the column order.
pub type Record = IndexMap<String, Value>;

/// Metadata for a result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Column name as returned by the database.
    pub name: String,

    /// Database-specific type name (e.g., "varchar", "INTEGER", "TEXT").
    pub type_name: String,

    /// Whether the column allows NULL values.
    pub nullable: bool,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable,
        }
    }
}

/// Execution statistics reported by the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStats {
    /// Wall-clock time taken to execute the statement.
    pub duration: Duration,

    pub rows_affected: Option<u64>,
    pub rows_read: Option<u64>,
    pub rows_written: Option<u64>,

    /// Row id of the last inserted row (SQLite-family backends).
    pub last_insert_rowid: Option<i64>,
}

/// Result of executing a SQL statement.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Metadata for each column in the result set.
    pub columns: Vec<ColumnMeta>,

    /// Row data, where each row contains values matching `columns` order.
    pub rows: Vec<Row>,

    pub stats: QueryStats,
}

impl QueryResult {
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            stats: QueryStats::default(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_stats(mut self, stats: QueryStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Convert the row at `index` into a name-addressed record.
    pub fn record(&self, index: usize) -> Option<Record> {
        let row = self.rows.get(index)?;

        Some(
            self.columns
                .iter()
                .zip(row.iter())
                .map(|(column, value)| (column.name.clone(), value.clone()))
                .collect(),
        )
    }

    pub fn first_record(&self) -> Option<Record> {
        self.record(0)
    }
}
