//! Execution seam
//!
//! Trait-based abstraction over the database backends the compiled queries
//! run against. The crate ships a SQLite implementation; server backends
//! plug in externally through the same trait.

pub mod sqlite;

pub use sqlite::SqliteAdapter;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Universal result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// One physical connection to a backend
///
/// One connection serves one logical unit of work at a time; callers
/// serialize access per connection. Pooling and retry policy live outside;
/// `reconnect` re-establishes the native handle from the last-known options
/// when the connection is found dead.
pub trait Adapter {
    /// Execute a query that returns rows
    fn query(&self, sql: &str) -> AdapterResult<QueryResult>;

    /// Execute a statement that modifies data
    fn execute(&self, sql: &str) -> AdapterResult<ExecResult>;

    /// Test the connection is alive
    fn test_connection(&self) -> AdapterResult<()>;

    /// Re-establish the native handle using the last-known options
    fn reconnect(&mut self) -> AdapterResult<()>;
}

/// Result from a SELECT-type query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Index of a result column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Metadata about a result column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub col_type: String,
}

/// Result from an INSERT/UPDATE/DELETE-type statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResult {
    pub affected_rows: u64,
    pub last_insert_id: Option<i64>,
}

/// Database adapter errors
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("Internal error: {0}")]
    Internal(String),
}
