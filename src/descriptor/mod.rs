//! Backend-agnostic query descriptors
//!
//! Value types describing a logical query: columns, tables, join relations,
//! filters, sorting and pagination. Descriptors are built by an external
//! ORM/query-builder layer and consumed by the dialect compilers.

pub mod column;
pub mod filter;
pub mod options;
pub mod query;
pub mod relation;
pub mod sorting;
pub mod table;
pub mod value;

pub use column::{Column, DataType};
pub use filter::{BoolOperand, Condition, Filter, FilterGroup, FilterNode};
pub use options::ConnectionOptions;
pub use query::QuerySpec;
pub use relation::{JoinKind, Relation};
pub use sorting::{SortDirection, Sorting, SortingGroup};
pub use table::Table;
pub use value::{Cell, FilterValue};
