//! Filter values and typed result cells

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::column::Column;

/// The value side of a filter condition
///
/// One case per value kind; dialect compilers match exhaustively instead of
/// probing runtime types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    /// Inclusive range, used with `Condition::Between`
    Range(Box<FilterValue>, Box<FilterValue>),
    List(Vec<FilterValue>),
    /// Reference to another column, compiled as a raw identifier
    Column(Column),
    /// Raw expression marker, emitted verbatim
    Expr(String),
}

impl FilterValue {
    pub fn text(s: &str) -> Self {
        FilterValue::Text(s.to_string())
    }

    pub fn list_of_ints(values: &[i64]) -> Self {
        FilterValue::List(values.iter().copied().map(FilterValue::Int).collect())
    }

    pub fn list_of_texts(values: &[&str]) -> Self {
        FilterValue::List(values.iter().map(|v| FilterValue::text(v)).collect())
    }

    pub fn range(lo: FilterValue, hi: FilterValue) -> Self {
        FilterValue::Range(Box::new(lo), Box::new(hi))
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Int(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        FilterValue::Float(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Text(v.to_string())
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        FilterValue::Bool(v)
    }
}

/// A typed value materialized from a backend row
///
/// The retrieval pipeline coerces native values into this form according to
/// the column's [`DataType`](super::DataType).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Blob(Vec<u8>),
    Json(serde_json::Value),
    List(Vec<Cell>),
    Geo { lat: f64, lng: f64 },
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Text content, if this cell is textual
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_value_conversions() {
        assert_eq!(FilterValue::from(18), FilterValue::Int(18));
        assert_eq!(FilterValue::from("anne"), FilterValue::text("anne"));
        assert_eq!(
            FilterValue::list_of_ints(&[1, 2]),
            FilterValue::List(vec![FilterValue::Int(1), FilterValue::Int(2)])
        );
    }
}
