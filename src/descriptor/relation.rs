//! Join relations between tables

use serde::{Deserialize, Serialize};

use super::column::Column;
use super::filter::FilterGroup;
use super::table::Table;

/// Join kind of a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
        }
    }
}

/// A join relation between a parent and a child table
///
/// Relations form a join forest rooted at whichever table no relation names
/// as child; cycles are not supported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub parent: Table,
    pub child: Table,
    pub kind: JoinKind,
    /// (parent column, child column) equality pairs
    pub links: Vec<(Column, Column)>,
    /// Extra criteria AND-ed onto the join condition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criteria: Option<FilterGroup>,
}

impl Relation {
    pub fn new(parent: Table, child: Table, kind: JoinKind) -> Self {
        Self {
            parent,
            child,
            kind,
            links: Vec::new(),
            criteria: None,
        }
    }

    /// Link a parent column to a child column
    pub fn link(mut self, parent_column: &str, child_column: &str) -> Self {
        let p = self
            .parent
            .column(parent_column)
            .cloned()
            .unwrap_or_else(|| {
                let mut c = Column::new(parent_column, super::DataType::Integer);
                c.table_alias = Some(self.parent.effective_alias().to_string());
                c
            });
        let c = self.child.column(child_column).cloned().unwrap_or_else(|| {
            let mut c = Column::new(child_column, super::DataType::Integer);
            c.table_alias = Some(self.child.effective_alias().to_string());
            c
        });
        self.links.push((p, c));
        self
    }

    pub fn with_criteria(mut self, criteria: FilterGroup) -> Self {
        self.criteria = Some(criteria);
        self
    }
}
