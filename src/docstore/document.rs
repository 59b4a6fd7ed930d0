//! Document representation for the document store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A stored document with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document identity
    #[serde(rename = "_id")]
    pub id: String,

    /// Creation timestamp
    #[serde(rename = "_created_at")]
    pub created_at: DateTime<Utc>,

    /// Last modified timestamp
    #[serde(rename = "_modified_at")]
    pub modified_at: DateTime<Utc>,

    /// The actual document data
    #[serde(flatten)]
    pub data: Value,
}

impl Document {
    /// Create a new document with a generated identity
    pub fn new(data: Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            modified_at: now,
            data,
        }
    }

    /// Create a document with a specific identity
    pub fn with_id(id: String, data: Value) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            modified_at: now,
            data,
        }
    }

    /// Replace the document data
    pub fn update(&mut self, data: Value) {
        self.data = data;
        self.modified_at = Utc::now();
    }

    /// Merge fields into the document data
    pub fn merge(&mut self, fields: &serde_json::Map<String, Value>) {
        if let Value::Object(ref mut map) = self.data {
            for (k, v) in fields {
                map.insert(k.clone(), v.clone());
            }
            self.modified_at = Utc::now();
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        if field == "_id" {
            return None; // callers read `id` directly
        }
        self.data.get(field)
    }

    /// Data plus the identity under `_id`, the shape filters match against
    pub fn flattened(&self) -> Value {
        let mut data = self.data.clone();
        if let Value::Object(ref mut map) = data {
            map.insert("_id".to_string(), Value::String(self.id.clone()));
        }
        data
    }
}
