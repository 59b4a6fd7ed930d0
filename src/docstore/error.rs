//! Document store error types

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocStoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Collection already exists: {0}")]
    CollectionAlreadyExists(String),

    #[error("Invalid collection name: {0}")]
    InvalidCollectionName(String),

    #[error("Document ID already exists: {0}")]
    DuplicateId(String),

    #[error("Query error: {0}")]
    Query(String),
}

pub type Result<T> = std::result::Result<T, DocStoreError>;
