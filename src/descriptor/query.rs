//! Assembled retrieval request

use serde::{Deserialize, Serialize};

use super::column::Column;
use super::filter::FilterGroup;
use super::relation::Relation;
use super::sorting::SortingGroup;
use super::table::Table;

/// Everything a dialect needs to assemble one retrieval or count query
///
/// The join root is the parent of the first relation, or the first table
/// when no relations exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub tables: Vec<Table>,
    #[serde(default)]
    pub relations: Vec<Relation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterGroup>,
    #[serde(default)]
    pub grouping: Vec<Column>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub having: Option<FilterGroup>,
    #[serde(default)]
    pub sorting: SortingGroup,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
    /// Language code for implicit multilingual joins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl QuerySpec {
    pub fn from_table(table: Table) -> Self {
        Self {
            tables: vec![table],
            relations: Vec::new(),
            filters: None,
            grouping: Vec::new(),
            having: None,
            sorting: SortingGroup::new(),
            limit: None,
            offset: 0,
            language: None,
        }
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn with_filters(mut self, filters: FilterGroup) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn group_by(mut self, column: Column) -> Self {
        self.grouping.push(column);
        self
    }

    pub fn with_having(mut self, having: FilterGroup) -> Self {
        self.having = Some(having);
        self
    }

    pub fn with_sorting(mut self, sorting: SortingGroup) -> Self {
        self.sorting = sorting;
        self
    }

    pub fn paginate(mut self, limit: u64, offset: u64) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    pub fn in_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    /// The table the FROM clause starts at
    pub fn root_table(&self) -> Option<&Table> {
        match self.relations.first() {
            Some(rel) => Some(&rel.parent),
            None => self.tables.first(),
        }
    }

    /// Columns projected by a retrieval query: every active column of every
    /// table, in declaration order
    pub fn projected_columns(&self) -> impl Iterator<Item = &Column> {
        self.tables
            .iter()
            .flat_map(|t| t.columns.iter())
            .filter(|c| c.active)
    }

    /// Whether any projected column is an expression
    pub fn has_expression_columns(&self) -> bool {
        self.projected_columns().any(|c| c.expression)
    }
}
