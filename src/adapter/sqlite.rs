//! SQLite adapter
//!
//! Implements [`Adapter`] for SQLite using rusqlite + r2d2 connection
//! pooling. The database file path comes from `ConnectionOptions.database`
//! (or the `path` extra); `:memory:` opens an in-memory database.

use base64::Engine;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::descriptor::ConnectionOptions;

use super::{Adapter, AdapterError, AdapterResult, ColumnMeta, ExecResult, QueryResult};

type DbPool = Pool<SqliteConnectionManager>;
type DbConn = PooledConnection<SqliteConnectionManager>;

pub struct SqliteAdapter {
    pool: DbPool,
    options: ConnectionOptions,
}

impl SqliteAdapter {
    pub fn new(options: ConnectionOptions) -> AdapterResult<Self> {
        let pool = Self::build_pool(&options)?;
        Ok(Self { pool, options })
    }

    pub fn in_memory() -> AdapterResult<Self> {
        Self::new(ConnectionOptions::new(":memory:"))
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    fn build_pool(options: &ConnectionOptions) -> AdapterResult<DbPool> {
        let path = options
            .extra("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&options.database));

        let (manager, max_size) = if path == Path::new(":memory:") {
            (SqliteConnectionManager::memory(), 1)
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            (SqliteConnectionManager::file(&path), 10)
        };

        Pool::builder()
            .max_size(max_size)
            .build(manager)
            .map_err(|e| AdapterError::Connection(e.to_string()))
    }

    fn get_conn(&self) -> AdapterResult<DbConn> {
        self.pool
            .get()
            .map_err(|e| AdapterError::Connection(e.to_string()))
    }

    /// Convert a rusqlite ValueRef to a serde_json Value; blobs become
    /// base64 text so the retrieval pipeline can round-trip them
    fn value_ref_to_json(val: rusqlite::types::ValueRef<'_>) -> Value {
        match val {
            rusqlite::types::ValueRef::Null => Value::Null,
            rusqlite::types::ValueRef::Integer(i) => json!(i),
            rusqlite::types::ValueRef::Real(f) => json!(f),
            rusqlite::types::ValueRef::Text(t) => {
                json!(String::from_utf8_lossy(t).to_string())
            }
            rusqlite::types::ValueRef::Blob(b) => {
                json!(base64::engine::general_purpose::STANDARD.encode(b))
            }
        }
    }
}

impl Adapter for SqliteAdapter {
    fn query(&self, sql: &str) -> AdapterResult<QueryResult> {
        let conn = self.get_conn()?;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| AdapterError::Query(e.to_string()))?;

        let column_names: Vec<String> =
            stmt.column_names().iter().map(|s| s.to_string()).collect();
        let columns: Vec<ColumnMeta> = column_names
            .iter()
            .map(|name| ColumnMeta {
                name: name.clone(),
                col_type: String::from("TEXT"), // SQLite is dynamically typed
            })
            .collect();

        let rows: Vec<Vec<Value>> = stmt
            .query_map([], |row| {
                let mut vals = Vec::with_capacity(column_names.len());
                for i in 0..column_names.len() {
                    let val = row.get_ref(i).unwrap_or(rusqlite::types::ValueRef::Null);
                    vals.push(Self::value_ref_to_json(val));
                }
                Ok(vals)
            })
            .map_err(|e| AdapterError::Query(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(QueryResult { columns, rows })
    }

    fn execute(&self, sql: &str) -> AdapterResult<ExecResult> {
        let conn = self.get_conn()?;
        let affected = conn
            .execute(sql, [])
            .map_err(|e| AdapterError::Query(e.to_string()))?;
        Ok(ExecResult {
            affected_rows: affected as u64,
            last_insert_id: Some(conn.last_insert_rowid()),
        })
    }

    fn test_connection(&self) -> AdapterResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch("SELECT 1")
            .map_err(|e| AdapterError::Connection(e.to_string()))
    }

    fn reconnect(&mut self) -> AdapterResult<()> {
        self.pool = Self::build_pool(&self.options)?;
        self.test_connection()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_and_execute() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter
            .execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        let res = adapter
            .execute("INSERT INTO users (name) VALUES ('Alice')")
            .unwrap();
        assert_eq!(res.affected_rows, 1);
        assert_eq!(res.last_insert_id, Some(1));

        let rows = adapter.query("SELECT id, name FROM users").unwrap();
        assert_eq!(rows.columns.len(), 2);
        assert_eq!(rows.rows.len(), 1);
        assert_eq!(rows.rows[0][1], json!("Alice"));
    }

    #[test]
    fn test_reconnect_rebuilds_pool() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite");
        let options = ConnectionOptions::new(path.to_str().unwrap());
        let mut adapter = SqliteAdapter::new(options).unwrap();
        adapter.execute("CREATE TABLE t (x INTEGER)").unwrap();

        adapter.reconnect().unwrap();
        // file-backed data survives the pool rebuild
        let rows = adapter.query("SELECT COUNT(1) FROM t").unwrap();
        assert_eq!(rows.rows[0][0], json!(0));
    }
}
