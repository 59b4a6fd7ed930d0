//! Table descriptors

use serde::{Deserialize, Serialize};

use super::column::{Column, DataType};

/// Suffix of the implicit translation table joined for multilingual tables
pub const TRANSLATION_SUFFIX: &str = "Tr";

/// Native column holding the language code in translation tables
pub const LANGUAGE_CODE_COLUMN: &str = "language_code";

/// A table descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Owning schema/connection name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Drives an implicit join to the `<name>Tr` translation table
    #[serde(default)]
    pub multilingual: bool,
}

impl Table {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            alias: None,
            schema: None,
            columns: Vec::new(),
            multilingual: false,
        }
    }

    pub fn aliased(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn in_schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string());
        self
    }

    pub fn multilingual(mut self) -> Self {
        self.multilingual = true;
        self
    }

    /// Add a column, qualifying it with this table's effective alias
    pub fn with_column(mut self, mut column: Column) -> Self {
        if column.table_alias.is_none() && !column.expression {
            column.table_alias = Some(self.effective_alias().to_string());
        }
        self.columns.push(column);
        self
    }

    pub fn with_columns(self, columns: Vec<Column>) -> Self {
        columns.into_iter().fold(self, Table::with_column)
    }

    /// Alias if set, table name otherwise
    pub fn effective_alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Name of the implicit translation table
    pub fn translation_table(&self) -> String {
        format!("{}{}", self.name, TRANSLATION_SUFFIX)
    }

    /// Key columns of this table
    pub fn key_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.key)
    }

    pub fn column(&self, tag: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.tag == tag)
    }

    /// Identity key for join-set membership checks: `schema.table.alias`
    pub fn join_key(&self) -> String {
        format!(
            "{}.{}.{}",
            self.schema.as_deref().unwrap_or(""),
            self.name,
            self.effective_alias()
        )
    }

    /// Shorthand for a table with a single integer primary key `id`
    pub fn with_id_key(self) -> Self {
        self.with_column(Column::new("id", DataType::Integer).primary_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_alias() {
        let t = Table::new("users");
        assert_eq!(t.effective_alias(), "users");
        let t = Table::new("users").aliased("u");
        assert_eq!(t.effective_alias(), "u");
    }

    #[test]
    fn test_column_qualification() {
        let t = Table::new("users")
            .aliased("u")
            .with_column(Column::new("name", DataType::String));
        assert_eq!(t.columns[0].table_alias.as_deref(), Some("u"));
    }

    #[test]
    fn test_translation_table_name() {
        let t = Table::new("products").multilingual();
        assert_eq!(t.translation_table(), "productsTr");
    }
}
