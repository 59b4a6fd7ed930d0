//! Filter compilation and matching for the document store
//!
//! Conditions compile onto operator documents (`$ne`, `$regex`, `$gt`, …);
//! the matcher interprets the same documents in-process. Regex patterns are
//! restricted to the anchored-literal subset the compiler emits (`^lit`,
//! `lit$`, bare `lit`).

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::descriptor::{Condition, Filter, FilterGroup, FilterNode, FilterValue};

/// A filter document that can never match any document
pub fn never_match() -> Value {
    json!({"_id": {"$exists": false}})
}

/// Compile a filter or group into a filter document
///
/// An empty group compiles to an empty document (matches everything, the
/// caller's find runs unfiltered). Conditions without a document-store
/// equivalent compile to a never-matching document with a logged notice.
pub fn compile(node: &FilterNode) -> Value {
    match node {
        FilterNode::Leaf(filter) => compile_leaf(filter),
        FilterNode::Group(group) => compile_group(group),
    }
}

pub fn compile_group(group: &FilterGroup) -> Value {
    let parts: Vec<Value> = group.items.iter().map(compile).collect();
    if parts.is_empty() {
        return Value::Object(Map::new());
    }
    if parts.len() == 1 {
        return parts.into_iter().next().unwrap_or_default();
    }
    match group.operand {
        crate::descriptor::BoolOperand::And => json!({"$and": parts}),
        crate::descriptor::BoolOperand::Or => json!({"$or": parts}),
    }
}

fn compile_leaf(filter: &Filter) -> Value {
    let field = filter.column.name.as_str();

    match &filter.condition {
        Condition::Equals => match value_to_json(&filter.value) {
            Some(v) => json!({ field: v }),
            None => degraded(filter),
        },
        Condition::NotEqual => match value_to_json(&filter.value) {
            Some(v) => json!({ field: {"$ne": v} }),
            None => degraded(filter),
        },

        Condition::Contains => regex_doc(field, &filter.value, "", "", false)
            .unwrap_or_else(|| degraded(filter)),
        Condition::NotContain => regex_doc(field, &filter.value, "", "", true)
            .unwrap_or_else(|| degraded(filter)),
        Condition::StartsWith => regex_doc(field, &filter.value, "^", "", false)
            .unwrap_or_else(|| degraded(filter)),
        Condition::NotStartWith => regex_doc(field, &filter.value, "^", "", true)
            .unwrap_or_else(|| degraded(filter)),
        Condition::EndsWith => regex_doc(field, &filter.value, "", "$", false)
            .unwrap_or_else(|| degraded(filter)),
        Condition::NotEndWith => regex_doc(field, &filter.value, "", "$", true)
            .unwrap_or_else(|| degraded(filter)),

        Condition::GreaterThan => compare_doc(field, "$gt", &filter.value)
            .unwrap_or_else(|| degraded(filter)),
        Condition::LessThan => compare_doc(field, "$lt", &filter.value)
            .unwrap_or_else(|| degraded(filter)),
        Condition::GreaterOrEqual => compare_doc(field, "$gte", &filter.value)
            .unwrap_or_else(|| degraded(filter)),
        Condition::LessOrEqual => compare_doc(field, "$lte", &filter.value)
            .unwrap_or_else(|| degraded(filter)),

        Condition::IsEmpty => {
            let empty = json!({ field: "" });
            let null = json!({ field: Value::Null });
            json!({"$or": [empty, null]})
        }
        Condition::NotEmpty => {
            let not_null = json!({ field: {"$ne": Value::Null} });
            let not_empty = json!({ field: {"$ne": ""} });
            let exists = json!({ field: {"$exists": true} });
            json!({"$and": [not_null, not_empty, exists]})
        }
        Condition::IsNull => json!({ field: Value::Null }),
        Condition::NotNull => json!({ field: {"$ne": Value::Null} }),

        Condition::InList => match value_to_json(&filter.value) {
            Some(Value::Array(items)) => json!({ field: {"$in": items} }),
            Some(v) => json!({ field: {"$in": [v]} }),
            None => degraded(filter),
        },
        Condition::NotInList => match value_to_json(&filter.value) {
            Some(Value::Array(items)) => json!({ field: {"$nin": items} }),
            Some(v) => json!({ field: {"$nin": [v]} }),
            None => degraded(filter),
        },

        // arrays are native here: element equality is set membership
        Condition::InSet => match value_to_json(&filter.value) {
            Some(v) => json!({ field: v }),
            None => degraded(filter),
        },
        Condition::NotInSet => match value_to_json(&filter.value) {
            Some(v) => json!({ field: {"$ne": v} }),
            None => degraded(filter),
        },

        Condition::Between => match &filter.value {
            FilterValue::Range(lo, hi) => {
                match (value_to_json(lo), value_to_json(hi)) {
                    (Some(lo), Some(hi)) => json!({ field: {"$gte": lo, "$lte": hi} }),
                    _ => degraded(filter),
                }
            }
            _ => degraded(filter),
        },

        Condition::Custom(_) => degraded(filter),
    }
}

fn degraded(filter: &Filter) -> Value {
    warn!(
        column = %filter.column.tag,
        condition = ?filter.condition,
        "condition has no document-store equivalent; compiled to a never-matching document"
    );
    never_match()
}

fn regex_doc(
    field: &str,
    value: &FilterValue,
    before: &str,
    after: &str,
    negated: bool,
) -> Option<Value> {
    let needle = match value {
        FilterValue::Text(s) => s.clone(),
        FilterValue::Int(i) => i.to_string(),
        FilterValue::Float(f) => f.to_string(),
        _ => return None,
    };
    let pattern = format!("{}{}{}", before, needle, after);
    let doc = if negated {
        json!({ field: {"$not": {"$regex": pattern}} })
    } else {
        json!({ field: {"$regex": pattern} })
    };
    Some(doc)
}

fn compare_doc(field: &str, op: &str, value: &FilterValue) -> Option<Value> {
    let v = value_to_json(value)?;
    Some(json!({ field: { op: v } }))
}

/// Convert a filter value to its document representation; `None` for kinds
/// with no document-store form (column references, raw expressions)
pub fn value_to_json(value: &FilterValue) -> Option<Value> {
    let v = match value {
        FilterValue::Null => Value::Null,
        FilterValue::Bool(b) => json!(b),
        FilterValue::Int(i) => json!(i),
        FilterValue::Float(f) => json!(f),
        FilterValue::Text(s) => json!(s),
        FilterValue::Date(d) => json!(d.format("%Y-%m-%d").to_string()),
        FilterValue::DateTime(dt) => json!(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        FilterValue::Time(t) => json!(t.format("%H:%M:%S").to_string()),
        FilterValue::List(items) => {
            let parts: Option<Vec<Value>> = items.iter().map(value_to_json).collect();
            Value::Array(parts?)
        }
        FilterValue::Range(_, _) | FilterValue::Column(_) | FilterValue::Expr(_) => return None,
    };
    Some(v)
}

// ----- matching -------------------------------------------------------

/// Whether a (flattened) document matches a compiled filter document
pub fn matches(doc: &Value, filter: &Value) -> bool {
    let Value::Object(conditions) = filter else {
        return false;
    };
    conditions.iter().all(|(key, spec)| match key.as_str() {
        "$and" => spec
            .as_array()
            .map(|parts| parts.iter().all(|p| matches(doc, p)))
            .unwrap_or(false),
        "$or" => spec
            .as_array()
            .map(|parts| parts.iter().any(|p| matches(doc, p)))
            .unwrap_or(false),
        field => matches_field(doc.get(field), spec),
    })
}

fn matches_field(actual: Option<&Value>, spec: &Value) -> bool {
    match spec {
        Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => {
            ops.iter().all(|(op, operand)| apply_op(actual, op, operand))
        }
        expected => equals(actual, expected),
    }
}

fn apply_op(actual: Option<&Value>, op: &str, operand: &Value) -> bool {
    match op {
        "$ne" => !equals(actual, operand),
        "$gt" => compare(actual, operand) == Some(std::cmp::Ordering::Greater),
        "$gte" => matches!(
            compare(actual, operand),
            Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        ),
        "$lt" => compare(actual, operand) == Some(std::cmp::Ordering::Less),
        "$lte" => matches!(
            compare(actual, operand),
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        ),
        "$in" => operand
            .as_array()
            .map(|items| items.iter().any(|v| equals(actual, v)))
            .unwrap_or(false),
        "$nin" => operand
            .as_array()
            .map(|items| !items.iter().any(|v| equals(actual, v)))
            .unwrap_or(false),
        "$exists" => operand
            .as_bool()
            .map(|should| actual.is_some() == should)
            .unwrap_or(false),
        "$regex" => match (actual, operand.as_str()) {
            (Some(Value::String(s)), Some(pattern)) => regex_lite(s, pattern),
            _ => false,
        },
        "$not" => !matches_field(actual, operand),
        _ => false,
    }
}

/// Null equality treats a missing field as null; an array field equals a
/// scalar when it contains it (element match)
fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => {
            items.contains(expected)
        }
        Some(v) => v == expected,
    }
}

fn compare(actual: Option<&Value>, expected: &Value) -> Option<std::cmp::Ordering> {
    match (actual?, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => None,
    }
}

/// Anchored-literal regex subset: `^lit`, `lit$`, `^lit$`, bare `lit`
fn regex_lite(haystack: &str, pattern: &str) -> bool {
    let starts = pattern.starts_with('^');
    let ends = pattern.ends_with('$') && pattern.len() > 1;
    let literal = pattern
        .trim_start_matches('^')
        .trim_end_matches('$');
    match (starts, ends) {
        (true, true) => haystack == literal,
        (true, false) => haystack.starts_with(literal),
        (false, true) => haystack.ends_with(literal),
        (false, false) => haystack.contains(literal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Column, DataType};

    fn email_col() -> Column {
        Column::new("email", DataType::String)
    }

    #[test]
    fn test_not_null_compiles_to_ne_null() {
        let f = Filter::not_null(email_col());
        let doc = compile(&f.into());
        assert_eq!(doc, json!({"email": {"$ne": null}}));
    }

    #[test]
    fn test_contains_and_anchors() {
        let f = Filter::contains(Column::new("name", DataType::String), "anne");
        assert_eq!(compile(&f.into()), json!({"name": {"$regex": "anne"}}));

        let f = Filter::new(
            Column::new("name", DataType::String),
            Condition::StartsWith,
            "An",
        );
        assert_eq!(compile(&f.into()), json!({"name": {"$regex": "^An"}}));
    }

    #[test]
    fn test_unsupported_condition_never_matches() {
        let f = Filter::new(
            Column::new("body", DataType::String),
            Condition::Custom("MATCH({field})".into()),
            FilterValue::Null,
        );
        let doc = compile(&f.clone().into());
        assert_eq!(doc, never_match());

        // the degraded document indeed matches nothing
        assert!(!matches(&json!({"_id": "x", "body": "anything"}), &doc));
    }

    #[test]
    fn test_group_compilation() {
        let status = Column::new("status", DataType::String);
        let group = FilterGroup::any(vec![
            Filter::eq(status.clone(), "A").into(),
            Filter::eq(status, "B").into(),
        ]);
        assert_eq!(
            compile_group(&group),
            json!({"$or": [{"status": "A"}, {"status": "B"}]})
        );
    }

    #[test]
    fn test_matcher_null_semantics() {
        let filter = json!({"email": {"$ne": null}});
        assert!(matches(&json!({"email": "a@b.c"}), &filter));
        // missing and explicit null both fail $ne null
        assert!(!matches(&json!({}), &filter));
        assert!(!matches(&json!({"email": null}), &filter));
    }

    #[test]
    fn test_matcher_comparisons_and_lists() {
        let filter = json!({"age": {"$gte": 18, "$lt": 65}});
        assert!(matches(&json!({"age": 40}), &filter));
        assert!(!matches(&json!({"age": 17}), &filter));
        assert!(!matches(&json!({"age": 65}), &filter));

        let filter = json!({"status": {"$in": ["A", "B"]}});
        assert!(matches(&json!({"status": "B"}), &filter));
        assert!(!matches(&json!({"status": "C"}), &filter));
    }

    #[test]
    fn test_matcher_array_element_equality() {
        // set membership compiles to plain equality; arrays match elements
        let f = Filter::new(
            Column::new("tags", DataType::Array),
            Condition::InSet,
            "rust",
        );
        let doc = compile(&f.into());
        assert!(matches(&json!({"tags": ["db", "rust"]}), &doc));
        assert!(!matches(&json!({"tags": ["db"]}), &doc));
    }

    #[test]
    fn test_between_maps_to_gte_lte() {
        let f = Filter::new(
            Column::new("age", DataType::Integer),
            Condition::Between,
            FilterValue::range(FilterValue::Int(18), FilterValue::Int(65)),
        );
        assert_eq!(
            compile(&f.into()),
            json!({"age": {"$gte": 18, "$lte": 65}})
        );
    }
}
