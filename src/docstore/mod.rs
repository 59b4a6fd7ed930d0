//! Document-store pipeline
//!
//! The structurally parallel path to the relational dialects: the same
//! descriptors compile into find/aggregation documents instead of SQL text,
//! executed against an embedded JSON document collection. The document
//! store's transaction manager is [`crate::txn::NoopTransactions`].

pub mod collection;
pub mod document;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod save;

pub use collection::Collection;
pub use document::Document;
pub use error::{DocStoreError, Result};
pub use pipeline::{compile, execute, execute_count, CompiledDocQuery, FindOptions};
pub use save::{cell_to_json, save_rows, IDENTITY_FIELD};
