//! Sorting descriptors

use serde::{Deserialize, Serialize};
use std::fmt;

use super::column::Column;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => write!(f, "ASC"),
            SortDirection::Descending => write!(f, "DESC"),
        }
    }
}

/// A single sort key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sorting {
    pub column: Column,
    #[serde(default)]
    pub direction: SortDirection,
}

impl Sorting {
    pub fn asc(column: Column) -> Self {
        Self {
            column,
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(column: Column) -> Self {
        Self {
            column,
            direction: SortDirection::Descending,
        }
    }
}

/// Ordered multi-key sort; compiled in input order, never reordered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SortingGroup {
    pub items: Vec<Sorting>,
}

impl SortingGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(sorting: Sorting) -> Self {
        Self {
            items: vec![sorting],
        }
    }

    pub fn with(mut self, sorting: Sorting) -> Self {
        self.items.push(sorting);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
