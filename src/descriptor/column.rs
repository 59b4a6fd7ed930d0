//! Column descriptors and logical data types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical data type of a column, independent of any backend's native types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Integer,
    Float,
    String,
    Char,
    Date,
    DateTime,
    Time,
    Blob,
    Boolean,
    Json,
    Array,
    GeoPoint,
    GeoPolygon,
    GeoShape,
    Object,
}

impl DataType {
    /// Whether values of this type carry a date component
    pub fn is_dated(&self) -> bool {
        matches!(self, DataType::Date | DataType::DateTime)
    }

    /// Whether this is one of the geography types
    pub fn is_geo(&self) -> bool {
        matches!(
            self,
            DataType::GeoPoint | DataType::GeoPolygon | DataType::GeoShape
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::String => "string",
            DataType::Char => "char",
            DataType::Date => "date",
            DataType::DateTime => "datetime",
            DataType::Time => "time",
            DataType::Blob => "blob",
            DataType::Boolean => "boolean",
            DataType::Json => "json",
            DataType::Array => "array",
            DataType::GeoPoint => "geopoint",
            DataType::GeoPolygon => "geopolygon",
            DataType::GeoShape => "geoshape",
            DataType::Object => "object",
        };
        write!(f, "{}", s)
    }
}

/// A column descriptor
///
/// `tag` is the logical name the ORM layer addresses the column by; `name`
/// is the native column identifier. If `expression` is set, `name` holds a
/// raw expression string instead of an identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub tag: String,
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,

    /// Alias of the owning table, used to qualify the identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_alias: Option<String>,

    /// Source timezone for date/datetime/time columns (e.g. "UTC")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub key: bool,
    #[serde(default)]
    pub expression: bool,
    #[serde(default)]
    pub multilingual: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub aggregate: bool,
    #[serde(default)]
    pub computed: bool,
    #[serde(default = "default_true")]
    pub saveable: bool,
}

fn default_true() -> bool {
    true
}

impl Column {
    /// Create a column with the same logical and native name
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            tag: name.to_string(),
            name: name.to_string(),
            data_type,
            table_alias: None,
            timezone: None,
            active: true,
            key: false,
            expression: false,
            multilingual: false,
            auto_increment: false,
            aggregate: false,
            computed: false,
            saveable: true,
        }
    }

    /// Create a column whose logical tag differs from its native name
    pub fn tagged(tag: &str, name: &str, data_type: DataType) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::new(name, data_type)
        }
    }

    /// Create an expression column; `expr` is emitted verbatim
    pub fn expr(tag: &str, expr: &str) -> Self {
        Self {
            expression: true,
            saveable: false,
            ..Self::tagged(tag, expr, DataType::String)
        }
    }

    /// Qualify the column with a table alias
    pub fn on(mut self, table_alias: &str) -> Self {
        self.table_alias = Some(table_alias.to_string());
        self
    }

    /// Set the source timezone
    pub fn with_timezone(mut self, tz: &str) -> Self {
        self.timezone = Some(tz.to_string());
        self
    }

    /// Mark as a primary key column
    pub fn primary_key(mut self) -> Self {
        self.key = true;
        self
    }

    /// Mark as an aggregate column (kept out of GROUP BY lists)
    pub fn as_aggregate(mut self) -> Self {
        self.aggregate = true;
        self
    }

    /// Native identifier, qualified with the table alias when one is set
    ///
    /// Expression columns return the raw expression unqualified.
    pub fn qualified_name(&self) -> String {
        if self.expression {
            return self.name.clone();
        }
        match &self.table_alias {
            Some(alias) => format!("{}.{}", alias, self.name),
            None => self.name.clone(),
        }
    }
}
