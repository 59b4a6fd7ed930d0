//! Collection management for the document store
//!
//! A collection is a directory of JSON documents, one file per document.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde_json::Value;

use super::document::Document;
use super::error::{DocStoreError, Result};

/// A document collection (the document-store analog of a table)
pub struct Collection {
    pub name: String,
    path: PathBuf,
}

impl Collection {
    /// Open an existing collection
    pub fn open(base_path: &Path, name: &str) -> Result<Self> {
        let path = base_path.join(name);
        if !path.exists() {
            return Err(DocStoreError::CollectionNotFound(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            path,
        })
    }

    /// Create a new collection
    pub fn create(base_path: &Path, name: &str) -> Result<Self> {
        validate_collection_name(name)?;
        let path = base_path.join(name);
        if path.exists() {
            return Err(DocStoreError::CollectionAlreadyExists(name.to_string()));
        }
        fs::create_dir_all(&path)?;
        Ok(Self {
            name: name.to_string(),
            path,
        })
    }

    /// Open a collection, creating it when missing
    pub fn open_or_create(base_path: &Path, name: &str) -> Result<Self> {
        match Self::open(base_path, name) {
            Ok(col) => Ok(col),
            Err(DocStoreError::CollectionNotFound(_)) => Self::create(base_path, name),
            Err(e) => Err(e),
        }
    }

    /// Insert a document, returning its identity
    pub fn insert(&self, doc: Document) -> Result<String> {
        let doc_path = self.doc_path(&doc.id);
        if doc_path.exists() {
            return Err(DocStoreError::DuplicateId(doc.id));
        }
        let content = serde_json::to_string_pretty(&doc)?;
        fs::write(doc_path, content)?;
        Ok(doc.id)
    }

    /// Get a document by identity
    pub fn get(&self, id: &str) -> Result<Document> {
        let doc_path = self.doc_path(id);
        if !doc_path.exists() {
            return Err(DocStoreError::DocumentNotFound(id.to_string()));
        }
        let content = fs::read_to_string(doc_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Merge fields into an existing document (partial update)
    pub fn update_fields(&self, id: &str, fields: &serde_json::Map<String, Value>) -> Result<Document> {
        let mut doc = self.get(id)?;
        doc.merge(fields);
        let content = serde_json::to_string_pretty(&doc)?;
        fs::write(self.doc_path(id), content)?;
        Ok(doc)
    }

    /// Delete a document by identity
    pub fn delete(&self, id: &str) -> Result<()> {
        let doc_path = self.doc_path(id);
        if !doc_path.exists() {
            return Err(DocStoreError::DocumentNotFound(id.to_string()));
        }
        fs::remove_file(doc_path)?;
        Ok(())
    }

    /// All documents, ordered by identity
    pub fn all(&self) -> Result<Vec<Document>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(stem) = path.file_stem() {
                    let name = stem.to_string_lossy();
                    if !name.starts_with('_') {
                        ids.push(name.to_string());
                    }
                }
            }
        }
        ids.sort();

        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            docs.push(self.get(&id)?);
        }
        Ok(docs)
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.all()?.len())
    }

    /// The document store records no DDL timestamps; callers get the epoch
    /// sentinel
    pub fn last_changed(&self) -> NaiveDateTime {
        crate::catalog::epoch()
    }

    /// Drop this collection
    pub fn drop(self) -> Result<()> {
        fs::remove_dir_all(&self.path)?;
        Ok(())
    }

    fn doc_path(&self, id: &str) -> PathBuf {
        self.path.join(format!("{}.json", id))
    }
}

fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DocStoreError::InvalidCollectionName(
            "name cannot be empty".to_string(),
        ));
    }
    if name.starts_with('_') {
        return Err(DocStoreError::InvalidCollectionName(
            "name cannot start with underscore".to_string(),
        ));
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(DocStoreError::InvalidCollectionName(
            "name must be alphanumeric".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_collection_crud() {
        let dir = tempdir().unwrap();
        let col = Collection::create(dir.path(), "users").unwrap();

        let doc = Document::new(json!({"name": "Alice", "age": 30}));
        let id = col.insert(doc).unwrap();

        let retrieved = col.get(&id).unwrap();
        assert_eq!(retrieved.get("name"), Some(&json!("Alice")));

        let mut fields = serde_json::Map::new();
        fields.insert("age".to_string(), json!(31));
        col.update_fields(&id, &fields).unwrap();
        let updated = col.get(&id).unwrap();
        assert_eq!(updated.get("age"), Some(&json!(31)));
        assert_eq!(updated.get("name"), Some(&json!("Alice")));

        col.delete(&id).unwrap();
        assert!(col.get(&id).is_err());
    }

    #[test]
    fn test_invalid_collection_names() {
        let dir = tempdir().unwrap();
        assert!(Collection::create(dir.path(), "").is_err());
        assert!(Collection::create(dir.path(), "_system").is_err());
        assert!(Collection::create(dir.path(), "has space").is_err());
    }

    #[test]
    fn test_last_changed_is_epoch() {
        let dir = tempdir().unwrap();
        let col = Collection::create(dir.path(), "events").unwrap();
        assert_eq!(col.last_changed(), crate::catalog::epoch());
    }
}
