//! Introspected schema metadata and checksums

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::descriptor::DataType;

/// Introspected table metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaTable {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// Source table this synonym/alias clones its metadata from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synonym_of: Option<String>,
}

impl SchemaTable {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            comment: None,
            collation: None,
            synonym_of: None,
        }
    }
}

/// Introspected column metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub table: String,
    pub name: String,
    pub native_type: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub foreign_key: bool,
    #[serde(default)]
    pub indexed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub ordinal: u32,
}

/// Introspected foreign-key relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRelation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    pub parent_table: String,
    pub parent_column: String,
    pub child_table: String,
    pub child_column: String,
}

/// Checksum pair for one table: structure vs column definitions
///
/// The two are tracked independently so a comment change does not force a
/// field re-fetch and vice versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableChecksums {
    pub table_checksum: String,
    pub fields_checksum: String,
}

/// Cached entry for one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedTable {
    pub checksums: TableChecksums,
    pub meta: SchemaTable,
}

/// Whole-schema cache payload, stored under `<schema>..tables`
///
/// Entries for tables dropped from the backend are never removed; the map
/// only grows (known limitation of the source design, reproduced).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TablesCache {
    pub tables: BTreeMap<String, CachedTable>,
}

/// SHA-256 over the given parts, base64-encoded
pub fn checksum(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    let result = hasher.finalize();
    base64::engine::general_purpose::STANDARD.encode(result)
}

/// Map a backend's native type name onto a logical data type
pub fn map_native_type(native: &str) -> DataType {
    let t = native.to_lowercase();
    if t.contains("point") {
        DataType::GeoPoint
    } else if t.contains("polygon") {
        DataType::GeoPolygon
    } else if t.contains("geometry") || t.contains("geography") {
        DataType::GeoShape
    } else if t.contains("json") {
        DataType::Json
    } else if t.contains("bool") || t == "tinyint(1)" {
        DataType::Boolean
    } else if t.contains("int") || t == "serial" || t == "bigserial" {
        DataType::Integer
    } else if t.contains("char") && !t.contains("varchar") && !t.contains("nvarchar") {
        DataType::Char
    } else if t.contains("timestamp") || t.contains("datetime") {
        DataType::DateTime
    } else if t.starts_with("date") {
        DataType::Date
    } else if t.starts_with("time") {
        DataType::Time
    } else if t.contains("blob") || t.contains("binary") || t == "bytea" || t == "raw" {
        DataType::Blob
    } else if t.contains("real")
        || t.contains("float")
        || t.contains("double")
        || t.contains("decimal")
        || t.contains("numeric")
        || t == "number"
    {
        DataType::Float
    } else if t.ends_with("[]") || t.starts_with("array") {
        DataType::Array
    } else if t.contains("text") || t.contains("varchar") || t.contains("clob") || t == "string" {
        DataType::String
    } else {
        DataType::Object
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_sensitivity() {
        // any change in a column's type, name or nullability changes the sum
        let base = checksum(&["id|integer|0", "name|varchar(50)|1"]);
        assert_ne!(base, checksum(&["id|integer|0", "name|varchar(60)|1"]));
        assert_ne!(base, checksum(&["id|integer|0", "label|varchar(50)|1"]));
        assert_ne!(base, checksum(&["id|integer|0", "name|varchar(50)|0"]));
        // identical snapshots agree
        assert_eq!(base, checksum(&["id|integer|0", "name|varchar(50)|1"]));
    }

    #[test]
    fn test_checksum_respects_part_boundaries() {
        assert_ne!(checksum(&["ab", "c"]), checksum(&["a", "bc"]));
    }

    #[test]
    fn test_native_type_mapping() {
        assert_eq!(map_native_type("INTEGER"), DataType::Integer);
        assert_eq!(map_native_type("VARCHAR(50)"), DataType::String);
        assert_eq!(map_native_type("tinyint(1)"), DataType::Boolean);
        assert_eq!(map_native_type("TIMESTAMPTZ"), DataType::DateTime);
        assert_eq!(map_native_type("date"), DataType::Date);
        assert_eq!(map_native_type("time"), DataType::Time);
        assert_eq!(map_native_type("jsonb"), DataType::Json);
        assert_eq!(map_native_type("text[]"), DataType::Array);
        assert_eq!(map_native_type("sdo_geometry"), DataType::GeoShape);
        assert_eq!(map_native_type("whatever"), DataType::Object);
    }
}
