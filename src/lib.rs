//! SpanDB - Multi-backend query compilation and schema-catalog layer
//!
//! Compiles backend-agnostic query descriptors into the native query form of
//! five relational dialects (MySQL, PostgreSQL, SQLite, SQL Server, Oracle)
//! or into find/aggregation documents for an embedded document store,
//! executes them through a narrow adapter seam, and materializes typed rows
//! back. A checksum-validated schema catalog keeps table/column/relation
//! metadata cheap to access; a nested-savepoint transaction manager wraps
//! mutating operations per connection.
//!
//! Execution is synchronous: one connection serves one logical unit of work
//! at a time. Compilation-time faults (wrong descriptor shapes) surface as
//! errors; execution-time faults are caught at the boundary and turned into
//! [`status::OpStatus`] objects.

pub mod adapter;
pub mod catalog;
pub mod descriptor;
pub mod dialect;
pub mod docstore;
pub mod retrieve;
pub mod status;
pub mod txn;

pub use adapter::{Adapter, AdapterError, SqliteAdapter};
pub use catalog::{CacheStore, MemoryCache, SchemaCatalog};
pub use descriptor::{
    Cell, Column, Condition, ConnectionOptions, DataType, Filter, FilterGroup, FilterValue,
    QuerySpec, Relation, Sorting, SortingGroup, Table,
};
pub use dialect::{
    MsSqlDialect, MySqlDialect, OracleDialect, PostgresDialect, QueryDialect, SqliteDialect,
};
pub use retrieve::{retrieve, retrieve_count, Row, RowOrigin, RowSet, RowState};
pub use status::OpStatus;
pub use txn::{NoopTransactions, Transactions};
