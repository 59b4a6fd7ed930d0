//! Filter conditions and boolean filter groups

use serde::{Deserialize, Serialize};

use super::column::Column;
use super::value::FilterValue;

/// Condition codes a filter can carry
///
/// Not every backend can express every code; dialects compile conditions
/// they cannot express into a tautologically-false fragment (fail closed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Equals,
    NotEqual,
    Contains,
    NotContain,
    StartsWith,
    NotStartWith,
    EndsWith,
    NotEndWith,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    IsEmpty,
    IsNull,
    NotEmpty,
    NotNull,
    InList,
    NotInList,
    InSet,
    NotInSet,
    Between,
    /// Backend-specific template; `{field}` is replaced by the compiled
    /// column expression
    Custom(String),
}

impl Condition {
    /// Parse a wire condition code. Unknown codes yield `None`; the caller
    /// decides whether to reject the filter or drop it.
    pub fn parse(code: &str) -> Option<Self> {
        let cond = match code {
            "equals" | "eq" => Condition::Equals,
            "not_equal" | "neq" => Condition::NotEqual,
            "contains" => Condition::Contains,
            "not_contain" => Condition::NotContain,
            "starts_with" => Condition::StartsWith,
            "not_start_with" => Condition::NotStartWith,
            "ends_with" => Condition::EndsWith,
            "not_end_with" => Condition::NotEndWith,
            "greater_than" | "gt" => Condition::GreaterThan,
            "less_than" | "lt" => Condition::LessThan,
            "greater_or_equal" | "gte" => Condition::GreaterOrEqual,
            "less_or_equal" | "lte" => Condition::LessOrEqual,
            "is_empty" => Condition::IsEmpty,
            "is_null" => Condition::IsNull,
            "not_empty" => Condition::NotEmpty,
            "not_null" => Condition::NotNull,
            "in_list" | "in" => Condition::InList,
            "not_in_list" | "not_in" => Condition::NotInList,
            "in_set" => Condition::InSet,
            "not_in_set" => Condition::NotInSet,
            "between" => Condition::Between,
            _ => return None,
        };
        Some(cond)
    }

    /// Whether the condition consumes no value operand
    pub fn is_unary(&self) -> bool {
        matches!(
            self,
            Condition::IsEmpty | Condition::IsNull | Condition::NotEmpty | Condition::NotNull
        )
    }
}

/// A single filter condition on a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: Column,
    pub condition: Condition,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(column: Column, condition: Condition, value: impl Into<FilterValue>) -> Self {
        Self {
            column,
            condition,
            value: value.into(),
        }
    }

    pub fn eq(column: Column, value: impl Into<FilterValue>) -> Self {
        Self::new(column, Condition::Equals, value)
    }

    pub fn contains(column: Column, value: &str) -> Self {
        Self::new(column, Condition::Contains, value)
    }

    pub fn is_null(column: Column) -> Self {
        Self::new(column, Condition::IsNull, FilterValue::Null)
    }

    pub fn not_null(column: Column) -> Self {
        Self::new(column, Condition::NotNull, FilterValue::Null)
    }
}

/// Boolean operand joining the items of a filter group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BoolOperand {
    And,
    Or,
}

impl BoolOperand {
    pub fn as_sql(&self) -> &'static str {
        match self {
            BoolOperand::And => "AND",
            BoolOperand::Or => "OR",
        }
    }
}

/// An item inside a filter group: a leaf filter or a nested group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterNode {
    Leaf(Filter),
    Group(FilterGroup),
}

impl From<Filter> for FilterNode {
    fn from(f: Filter) -> Self {
        FilterNode::Leaf(f)
    }
}

impl From<FilterGroup> for FilterNode {
    fn from(g: FilterGroup) -> Self {
        FilterNode::Group(g)
    }
}

/// An ordered list of filters/groups joined by one boolean operand
///
/// Compiles to a fully parenthesized boolean expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub operand: BoolOperand,
    pub items: Vec<FilterNode>,
}

impl FilterGroup {
    pub fn new(operand: BoolOperand) -> Self {
        Self {
            operand,
            items: Vec::new(),
        }
    }

    pub fn all(items: Vec<FilterNode>) -> Self {
        Self {
            operand: BoolOperand::And,
            items,
        }
    }

    pub fn any(items: Vec<FilterNode>) -> Self {
        Self {
            operand: BoolOperand::Or,
            items,
        }
    }

    pub fn push(&mut self, item: impl Into<FilterNode>) -> &mut Self {
        self.items.push(item.into());
        self
    }

    pub fn with(mut self, item: impl Into<FilterNode>) -> Self {
        self.items.push(item.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DataType;

    #[test]
    fn test_condition_parse() {
        assert_eq!(Condition::parse("equals"), Some(Condition::Equals));
        assert_eq!(Condition::parse("in_set"), Some(Condition::InSet));
        assert_eq!(Condition::parse("frobnicate"), None);
    }

    #[test]
    fn test_group_building() {
        let status = Column::new("status", DataType::String);
        let group = FilterGroup::any(vec![
            Filter::eq(status.clone(), "A").into(),
            Filter::eq(status, "B").into(),
        ]);
        assert_eq!(group.items.len(), 2);
        assert_eq!(group.operand, BoolOperand::Or);
    }
}
