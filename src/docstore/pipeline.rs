//! Query compilation and execution for the document store
//!
//! Mirrors the relational retrieval path: a query spec compiles either into
//! a plain filtered find (the fast path) or, when expression columns,
//! grouping or having are present, into a
//! `$project → $match → $group → $match → $sort → $skip → $limit` pipeline.

use serde_json::{json, Map, Value};

use crate::descriptor::{QuerySpec, SortDirection};

use super::collection::Collection;
use super::error::Result;
use super::filter;

/// A compiled document-store query
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledDocQuery {
    /// Plain filtered find with options; avoids aggregation overhead
    Find {
        filter: Value,
        options: FindOptions,
    },
    /// Aggregation pipeline stages, applied in order
    Pipeline(Vec<Value>),
}

/// Options of a plain find
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindOptions {
    /// (field, direction) pairs; 1 ascending, -1 descending
    pub sort: Vec<(String, i8)>,
    pub skip: u64,
    pub limit: Option<u64>,
}

/// Compile a query spec for the document store
pub fn compile(spec: &QuerySpec) -> CompiledDocQuery {
    let needs_pipeline =
        spec.has_expression_columns() || !spec.grouping.is_empty() || spec.having.is_some();

    let filter_doc = spec
        .filters
        .as_ref()
        .map(filter::compile_group)
        .unwrap_or_else(|| Value::Object(Map::new()));

    if !needs_pipeline {
        return CompiledDocQuery::Find {
            filter: filter_doc,
            options: FindOptions {
                sort: sort_pairs(spec),
                skip: spec.offset,
                limit: spec.limit,
            },
        };
    }

    let mut stages = Vec::new();

    // $project: map native names onto logical tags
    let mut projection = Map::new();
    for column in spec.projected_columns() {
        if column.tag == column.name {
            projection.insert(column.tag.clone(), json!(1));
        } else {
            projection.insert(column.tag.clone(), json!(format!("${}", column.name)));
        }
    }
    if !projection.is_empty() {
        stages.push(json!({"$project": projection}));
    }

    if !filter_doc.as_object().map(Map::is_empty).unwrap_or(true) {
        stages.push(json!({"$match": filter_doc}));
    }

    if !spec.grouping.is_empty() {
        let mut id = Map::new();
        for column in &spec.grouping {
            id.insert(column.tag.clone(), json!(format!("${}", column.tag)));
        }
        let mut group = Map::new();
        group.insert("_id".to_string(), Value::Object(id));
        for column in spec.projected_columns() {
            if spec.grouping.iter().any(|g| g.tag == column.tag) {
                continue;
            }
            group.insert(
                column.tag.clone(),
                json!({"$first": format!("${}", column.tag)}),
            );
        }
        stages.push(json!({"$group": group}));
    }

    if let Some(having) = &spec.having {
        let having_doc = filter::compile_group(having);
        if !having_doc.as_object().map(Map::is_empty).unwrap_or(true) {
            stages.push(json!({"$match": having_doc}));
        }
    }

    let sort = sort_pairs(spec);
    if !sort.is_empty() {
        let mut doc = Map::new();
        for (field, dir) in sort {
            doc.insert(field, json!(dir));
        }
        stages.push(json!({"$sort": doc}));
    }

    if spec.offset > 0 {
        stages.push(json!({"$skip": spec.offset}));
    }
    if let Some(limit) = spec.limit {
        stages.push(json!({"$limit": limit}));
    }

    CompiledDocQuery::Pipeline(stages)
}

fn sort_pairs(spec: &QuerySpec) -> Vec<(String, i8)> {
    spec.sorting
        .items
        .iter()
        .map(|s| {
            let dir = match s.direction {
                SortDirection::Ascending => 1,
                SortDirection::Descending => -1,
            };
            (s.column.name.clone(), dir)
        })
        .collect()
}

/// Execute a compiled query against a collection
pub fn execute(collection: &Collection, query: &CompiledDocQuery) -> Result<Vec<Value>> {
    let docs: Vec<Value> = collection
        .all()?
        .iter()
        .map(|d| d.flattened())
        .collect();
    Ok(match query {
        CompiledDocQuery::Find { filter, options } => run_find(docs, filter, options),
        CompiledDocQuery::Pipeline(stages) => run_pipeline(docs, stages),
    })
}

/// Count the documents a compiled query matches, ignoring pagination
pub fn execute_count(collection: &Collection, query: &CompiledDocQuery) -> Result<u64> {
    let docs: Vec<Value> = collection
        .all()?
        .iter()
        .map(|d| d.flattened())
        .collect();
    let count = match query {
        CompiledDocQuery::Find { filter, .. } => {
            docs.iter().filter(|d| filter::matches(d, filter)).count()
        }
        CompiledDocQuery::Pipeline(stages) => {
            let unpaged: Vec<Value> = stages
                .iter()
                .filter(|s| {
                    s.as_object()
                        .map(|o| !o.contains_key("$skip") && !o.contains_key("$limit"))
                        .unwrap_or(true)
                })
                .cloned()
                .collect();
            run_pipeline(docs, &unpaged).len()
        }
    };
    Ok(count as u64)
}

fn run_find(docs: Vec<Value>, filter_doc: &Value, options: &FindOptions) -> Vec<Value> {
    let mut results: Vec<Value> = docs
        .into_iter()
        .filter(|d| filter::matches(d, filter_doc))
        .collect();
    sort_docs(&mut results, &options.sort);
    paginate(results, options.skip, options.limit)
}

fn run_pipeline(mut docs: Vec<Value>, stages: &[Value]) -> Vec<Value> {
    for stage in stages {
        let Some(stage) = stage.as_object() else {
            continue;
        };
        for (op, arg) in stage {
            docs = match op.as_str() {
                "$project" => docs.into_iter().map(|d| project(&d, arg)).collect(),
                "$match" => docs
                    .into_iter()
                    .filter(|d| filter::matches(d, arg))
                    .collect(),
                "$group" => group(docs, arg),
                "$sort" => {
                    let pairs: Vec<(String, i8)> = arg
                        .as_object()
                        .map(|o| {
                            o.iter()
                                .map(|(k, v)| (k.clone(), v.as_i64().unwrap_or(1) as i8))
                                .collect()
                        })
                        .unwrap_or_default();
                    sort_docs(&mut docs, &pairs);
                    docs
                }
                "$skip" => paginate(docs, arg.as_u64().unwrap_or(0), None),
                "$limit" => paginate(docs, 0, arg.as_u64()),
                _ => docs,
            };
        }
    }
    docs
}

fn project(doc: &Value, projection: &Value) -> Value {
    let Some(projection) = projection.as_object() else {
        return doc.clone();
    };
    let mut out = Map::new();
    for (tag, rule) in projection {
        let value = match rule {
            Value::String(path) if path.starts_with('$') => {
                doc.get(&path[1..]).cloned().unwrap_or(Value::Null)
            }
            _ => doc.get(tag).cloned().unwrap_or(Value::Null),
        };
        out.insert(tag.clone(), value);
    }
    // identity survives projection
    if let Some(id) = doc.get("_id") {
        out.entry("_id".to_string()).or_insert_with(|| id.clone());
    }
    Value::Object(out)
}

/// Group documents by the `_id` document; accumulators support `$first` and
/// `$sum`. Grouped keys are flattened back onto the result documents so
/// having/sort stages can address them directly.
fn group(docs: Vec<Value>, spec: &Value) -> Vec<Value> {
    let Some(spec) = spec.as_object() else {
        return docs;
    };
    let id_spec = spec.get("_id").cloned().unwrap_or(Value::Null);

    let mut buckets: Vec<(String, Map<String, Value>, Vec<Value>)> = Vec::new();
    for doc in docs {
        let key_doc = resolve_id(&doc, &id_spec);
        let key = key_doc.to_string();
        match buckets.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, _, members)) => members.push(doc),
            None => {
                let mut flat = Map::new();
                if let Value::Object(fields) = &key_doc {
                    for (k, v) in fields {
                        flat.insert(k.clone(), v.clone());
                    }
                }
                buckets.push((key, flat, vec![doc]));
            }
        }
    }

    buckets
        .into_iter()
        .map(|(_, mut flat, members)| {
            for (tag, accumulator) in spec.iter().filter(|(k, _)| *k != "_id") {
                let Some(acc) = accumulator.as_object() else {
                    continue;
                };
                if let Some(path) = acc.get("$first").and_then(Value::as_str) {
                    let field = path.trim_start_matches('$');
                    let value = members
                        .first()
                        .and_then(|m| m.get(field))
                        .cloned()
                        .unwrap_or(Value::Null);
                    flat.insert(tag.clone(), value);
                } else if let Some(path) = acc.get("$sum").and_then(Value::as_str) {
                    let field = path.trim_start_matches('$');
                    let sum: f64 = members
                        .iter()
                        .filter_map(|m| m.get(field))
                        .filter_map(Value::as_f64)
                        .sum();
                    flat.insert(tag.clone(), json!(sum));
                }
            }
            Value::Object(flat)
        })
        .collect()
}

fn resolve_id(doc: &Value, id_spec: &Value) -> Value {
    match id_spec {
        Value::Object(fields) => {
            let mut out = Map::new();
            for (tag, path) in fields {
                let value = match path.as_str() {
                    Some(p) if p.starts_with('$') => {
                        doc.get(&p[1..]).cloned().unwrap_or(Value::Null)
                    }
                    _ => path.clone(),
                };
                out.insert(tag.clone(), value);
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn sort_docs(docs: &mut [Value], pairs: &[(String, i8)]) {
    if pairs.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for (field, dir) in pairs {
            let ord = compare_json(a.get(field), b.get(field));
            if ord != std::cmp::Ordering::Equal {
                return if *dir < 0 { ord.reverse() } else { ord };
            }
        }
        std::cmp::Ordering::Equal
    });
}

fn compare_json(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(std::cmp::Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        _ => std::cmp::Ordering::Equal,
    }
}

fn paginate(docs: Vec<Value>, skip: u64, limit: Option<u64>) -> Vec<Value> {
    let iter = docs.into_iter().skip(skip as usize);
    match limit {
        Some(n) => iter.take(n as usize).collect(),
        None => iter.collect(),
    }
}
