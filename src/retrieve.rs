//! Retrieval pipeline
//!
//! Executes compiled queries and coerces native result values into typed
//! [`Cell`]s per column data type. Rows carry their origin tag and a loaded
//! snapshot so the save path can diff modified fields.

use std::collections::BTreeMap;

use base64::Engine;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use crate::adapter::{Adapter, AdapterError};
use crate::descriptor::{Cell, Column, DataType, QuerySpec, Table};
use crate::dialect::{DialectError, QueryDialect};
use crate::status::OpStatus;

#[derive(Error, Debug)]
pub enum RetrieveError {
    #[error("Compile error: {0}")]
    Compile(#[from] DialectError),
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),
}

pub type RetrieveResult<T> = Result<T, RetrieveError>;

/// Where a row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowOrigin {
    /// Materialized from a backend query
    Database,
    /// Newly constructed in memory
    New,
}

/// Lifecycle state driving the save path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowState {
    Unchanged,
    Added,
    Modified,
    Deleted,
}

/// One materialized row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
    pub origin: RowOrigin,
    pub state: RowState,
    values: BTreeMap<String, Cell>,
    /// Snapshot at load time, for field-level diffing
    loaded: BTreeMap<String, Cell>,
}

impl Row {
    /// A newly constructed row, pending insert
    pub fn new() -> Self {
        Self {
            origin: RowOrigin::New,
            state: RowState::Added,
            values: BTreeMap::new(),
            loaded: BTreeMap::new(),
        }
    }

    /// A row materialized from the backend
    pub fn from_database(values: BTreeMap<String, Cell>) -> Self {
        Self {
            origin: RowOrigin::Database,
            state: RowState::Unchanged,
            loaded: values.clone(),
            values,
        }
    }

    pub fn get(&self, tag: &str) -> Option<&Cell> {
        self.values.get(tag)
    }

    /// Set a field, marking the row modified when it was unchanged
    pub fn set(&mut self, tag: &str, cell: Cell) {
        if self.state == RowState::Unchanged && self.values.get(tag) != Some(&cell) {
            self.state = RowState::Modified;
        }
        self.values.insert(tag.to_string(), cell);
    }

    pub fn mark_deleted(&mut self) {
        self.state = RowState::Deleted;
    }

    pub fn values(&self) -> &BTreeMap<String, Cell> {
        &self.values
    }

    /// Value of a field at load time
    pub fn loaded(&self, tag: &str) -> Option<&Cell> {
        self.loaded.get(tag)
    }

    /// Fields whose value differs from the loaded snapshot
    pub fn changed_fields(&self) -> BTreeMap<String, Cell> {
        self.values
            .iter()
            .filter(|(tag, cell)| self.loaded.get(*tag) != Some(cell))
            .map(|(tag, cell)| (tag.clone(), cell.clone()))
            .collect()
    }

    /// Accept the current values as the new loaded snapshot
    pub fn accept(&mut self) {
        self.loaded = self.values.clone();
        self.state = RowState::Unchanged;
    }
}

impl Default for Row {
    fn default() -> Self {
        Self::new()
    }
}

/// A table's row collection; cleared at the start of every retrieval
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowSet {
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }
}

/// Execute a retrieval query and materialize typed rows into `rows`
///
/// The row set is cleared first; returns the number of rows appended.
pub fn retrieve(
    adapter: &dyn Adapter,
    dialect: &dyn QueryDialect,
    spec: &QuerySpec,
    rows: &mut RowSet,
) -> RetrieveResult<usize> {
    rows.clear();

    let sql = dialect.retrieve_query(spec)?;
    let result = adapter.query(&sql)?;

    // result columns are aliased to logical tags by the compiler
    let types: BTreeMap<&str, DataType> = spec
        .projected_columns()
        .map(|c| (c.tag.as_str(), c.data_type))
        .collect();

    for raw in &result.rows {
        let mut values = BTreeMap::new();
        for (idx, meta) in result.columns.iter().enumerate() {
            let data_type = types.get(meta.name.as_str()).copied().unwrap_or(DataType::String);
            let cell = raw
                .get(idx)
                .map(|v| coerce_value(v, data_type, dialect))
                .unwrap_or(Cell::Null);
            values.insert(meta.name.clone(), cell);
        }
        rows.push(Row::from_database(values));
    }

    Ok(rows.len())
}

/// Execute the count variant of a query
pub fn retrieve_count(
    adapter: &dyn Adapter,
    dialect: &dyn QueryDialect,
    spec: &QuerySpec,
) -> RetrieveResult<u64> {
    let sql = dialect.count_query(spec)?;
    let result = adapter.query(&sql)?;
    let count = result
        .rows
        .first()
        .and_then(|row| row.first())
        .and_then(Value::as_u64)
        .unwrap_or(0);
    Ok(count)
}

/// Coerce one native value into a typed cell
///
/// Coercion never errors: values the backend hands back in an unexpected
/// shape degrade to text or null.
pub fn coerce_value(raw: &Value, data_type: DataType, dialect: &dyn QueryDialect) -> Cell {
    if raw.is_null() {
        return Cell::Null;
    }
    match data_type {
        DataType::Integer => match raw {
            Value::Number(n) => n
                .as_i64()
                .map(Cell::Int)
                .or_else(|| n.as_f64().map(|f| Cell::Int(f as i64)))
                .unwrap_or(Cell::Null),
            Value::String(s) => s.parse().map(Cell::Int).unwrap_or(Cell::Null),
            Value::Bool(b) => Cell::Int(*b as i64),
            _ => Cell::Null,
        },
        DataType::Float => match raw {
            Value::Number(n) => n.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
            Value::String(s) => s.parse().map(Cell::Float).unwrap_or(Cell::Null),
            _ => Cell::Null,
        },
        DataType::Boolean => match raw {
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => Cell::Bool(n.as_i64().unwrap_or(0) != 0),
            Value::String(s) => Cell::Bool(s == "1" || s.eq_ignore_ascii_case("true")),
            _ => Cell::Null,
        },
        DataType::Date => match text_of(raw) {
            Some(s) => parse_dated(&s, dialect)
                .map(|dt| Cell::Date(dt.date()))
                .unwrap_or(Cell::Null),
            None => Cell::Null,
        },
        DataType::DateTime => match text_of(raw) {
            Some(s) => parse_dated(&s, dialect).map(Cell::DateTime).unwrap_or(Cell::Null),
            None => Cell::Null,
        },
        DataType::Time => match text_of(raw) {
            Some(s) => parse_time(&s, dialect).map(Cell::Time).unwrap_or(Cell::Null),
            None => Cell::Null,
        },
        DataType::Blob => match raw {
            Value::String(s) => base64::engine::general_purpose::STANDARD
                .decode(s)
                .map(Cell::Blob)
                .unwrap_or(Cell::Null),
            _ => Cell::Null,
        },
        DataType::Json | DataType::Object => match raw {
            Value::String(s) => serde_json::from_str(s)
                .map(Cell::Json)
                .unwrap_or_else(|_| Cell::Json(raw.clone())),
            other => Cell::Json(other.clone()),
        },
        DataType::Array => coerce_array(raw),
        DataType::GeoPoint => match text_of(raw) {
            Some(s) => crate::dialect::parse_geo_point(&Value::String(s.clone()))
                .map(|(lat, lng)| Cell::Geo { lat, lng })
                .unwrap_or(Cell::Text(s)),
            None => Cell::Null,
        },
        DataType::GeoPolygon | DataType::GeoShape => match text_of(raw) {
            Some(s) => Cell::Text(s),
            None => Cell::Null,
        },
        DataType::String | DataType::Char => match raw {
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        },
    }
}

fn text_of(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a date or datetime string using the backend's native formats; the
/// format is chosen by whether the value carries a time component
fn parse_dated(s: &str, dialect: &dyn QueryDialect) -> Option<NaiveDateTime> {
    if s.contains(':') {
        NaiveDateTime::parse_from_str(s, dialect.datetime_format())
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok())
    } else {
        NaiveDate::parse_from_str(s, dialect.date_format())
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }
}

/// Time-of-day values land in `NaiveTime`, so time-only comparisons are
/// well-defined regardless of any carrier date the backend used
fn parse_time(s: &str, dialect: &dyn QueryDialect) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, dialect.time_format())
        .ok()
        .or_else(|| NaiveTime::parse_from_str(s, "%H:%M").ok())
        .or_else(|| parse_dated(s, dialect).map(|dt| dt.time()))
}

fn coerce_array(raw: &Value) -> Cell {
    match raw {
        Value::Array(items) => Cell::List(items.iter().map(json_scalar_to_cell).collect()),
        Value::String(s) => {
            let trimmed = s.trim();
            // empty-array sentinel representations normalize to a true
            // empty collection
            if trimmed.is_empty() || trimmed == "{}" || trimmed == "[]" {
                return Cell::List(Vec::new());
            }
            let inner = trimmed
                .trim_start_matches(&['{', '['][..])
                .trim_end_matches(&['}', ']'][..]);
            Cell::List(
                inner
                    .split(',')
                    .map(|part| Cell::Text(part.trim().to_string()))
                    .collect(),
            )
        }
        _ => Cell::List(Vec::new()),
    }
}

fn json_scalar_to_cell(v: &Value) -> Cell {
    match v {
        Value::Null => Cell::Null,
        Value::Bool(b) => Cell::Bool(*b),
        Value::Number(n) => n
            .as_i64()
            .map(Cell::Int)
            .or_else(|| n.as_f64().map(Cell::Float))
            .unwrap_or(Cell::Null),
        Value::String(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}

/// Compile a cell into a dialect literal for INSERT/UPDATE statements
fn cell_literal(dialect: &dyn QueryDialect, column: &Column, cell: &Cell) -> String {
    match cell {
        Cell::Null => "NULL".to_string(),
        Cell::Bool(b) => dialect.bool_literal(*b).to_string(),
        Cell::Int(i) => i.to_string(),
        Cell::Float(f) => f.to_string(),
        Cell::Text(s) => dialect.quote_str(s),
        Cell::Date(d) => dialect.date_literal(d),
        Cell::DateTime(dt) => dialect.datetime_literal(dt),
        Cell::Time(t) => dialect.time_literal(t),
        Cell::Blob(b) => dialect.quote_str(&base64::engine::general_purpose::STANDARD.encode(b)),
        Cell::Json(v) => dialect.quote_str(&v.to_string()),
        Cell::List(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|c| match c {
                    Cell::Text(s) => s.clone(),
                    other => cell_literal(dialect, column, other),
                })
                .collect();
            dialect.quote_str(&format!("{{{}}}", parts.join(",")))
        }
        Cell::Geo { lat, lng } => dialect
            .geo_literal(*lat, *lng)
            .unwrap_or_else(|| dialect.quote_str(&format!("{},{}", lat, lng))),
    }
}

/// Persist a row set's pending changes through the adapter
///
/// Added rows insert and get their generated identity written back; modified
/// rows update only the fields that changed; deleted rows are matched by
/// primary key. A readonly schema rejects everything before any native call.
pub fn save_rows(
    adapter: &dyn Adapter,
    dialect: &dyn QueryDialect,
    table: &Table,
    rows: &mut RowSet,
    readonly: bool,
) -> OpStatus {
    if readonly {
        return OpStatus::failed("Schema is readonly", 403);
    }

    let keys: Vec<&Column> = table.key_columns().collect();
    let mut surviving = Vec::with_capacity(rows.rows.len());
    let mut pending = std::mem::take(&mut rows.rows).into_iter();

    while let Some(mut row) = pending.next() {
        let outcome = match row.state {
            RowState::Added => insert_row(adapter, dialect, table, &mut row),
            RowState::Modified => update_row(adapter, dialect, table, &keys, &mut row),
            RowState::Deleted => {
                match delete_row(adapter, dialect, table, &keys, &row) {
                    Ok(()) => {
                        // row is gone; do not keep it
                        continue;
                    }
                    Err(status) => Err(status),
                }
            }
            RowState::Unchanged => Ok(()),
        };

        match outcome {
            Ok(()) => surviving.push(row),
            Err(status) => {
                // keep the failed row and everything not yet processed
                surviving.push(row);
                surviving.extend(pending);
                rows.rows = surviving;
                return status;
            }
        }
    }

    rows.rows = surviving;
    OpStatus::ok()
}

fn insert_row(
    adapter: &dyn Adapter,
    dialect: &dyn QueryDialect,
    table: &Table,
    row: &mut Row,
) -> Result<(), OpStatus> {
    let mut names = Vec::new();
    let mut literals = Vec::new();
    for column in table.columns.iter().filter(|c| c.saveable && !c.computed) {
        if column.auto_increment {
            continue;
        }
        if let Some(cell) = row.get(&column.tag) {
            // neither alias flag: plain native names for the column list
            names.push(dialect.column_expr(column, false, false));
            literals.push(cell_literal(dialect, column, cell));
        }
    }
    if names.is_empty() {
        return Err(OpStatus::failed("Nothing to insert", 400));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.name,
        names.join(", "),
        literals.join(", ")
    );
    match adapter.execute(&sql) {
        Ok(result) => {
            if let Some(id) = result.last_insert_id {
                if let Some(auto) = table.columns.iter().find(|c| c.auto_increment) {
                    row.set(&auto.tag, Cell::Int(id));
                }
            }
            row.accept();
            Ok(())
        }
        Err(e) => {
            error!(table = %table.name, error = %e, "insert failed");
            Err(OpStatus::failed("Failed to insert row", 500).with_debug(&e.to_string()))
        }
    }
}

fn update_row(
    adapter: &dyn Adapter,
    dialect: &dyn QueryDialect,
    table: &Table,
    keys: &[&Column],
    row: &mut Row,
) -> Result<(), OpStatus> {
    if keys.is_empty() {
        return Err(OpStatus::failed("Table has no key columns", 400));
    }
    let changed = row.changed_fields();
    if changed.is_empty() {
        row.accept();
        return Ok(());
    }

    let mut assignments = Vec::new();
    for column in table.columns.iter().filter(|c| c.saveable && !c.computed) {
        if let Some(cell) = changed.get(&column.tag) {
            assignments.push(format!(
                "{}={}",
                dialect.column_expr(column, false, false),
                cell_literal(dialect, column, cell)
            ));
        }
    }
    if assignments.is_empty() {
        row.accept();
        return Ok(());
    }

    let criteria = key_criteria(dialect, keys, row)?;
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        table.name,
        assignments.join(", "),
        criteria
    );
    match adapter.execute(&sql) {
        Ok(_) => {
            row.accept();
            Ok(())
        }
        Err(e) => {
            error!(table = %table.name, error = %e, "update failed");
            Err(OpStatus::failed("Failed to update row", 500).with_debug(&e.to_string()))
        }
    }
}

fn delete_row(
    adapter: &dyn Adapter,
    dialect: &dyn QueryDialect,
    table: &Table,
    keys: &[&Column],
    row: &Row,
) -> Result<(), OpStatus> {
    if keys.is_empty() {
        return Err(OpStatus::failed("Table has no key columns", 400));
    }
    let criteria = key_criteria(dialect, keys, row)?;
    let sql = format!("DELETE FROM {} WHERE {}", table.name, criteria);
    match adapter.execute(&sql) {
        Ok(_) => Ok(()),
        Err(e) => {
            error!(table = %table.name, error = %e, "delete failed");
            Err(OpStatus::failed("Failed to delete row", 500).with_debug(&e.to_string()))
        }
    }
}

fn key_criteria(
    dialect: &dyn QueryDialect,
    keys: &[&Column],
    row: &Row,
) -> Result<String, OpStatus> {
    let mut parts = Vec::with_capacity(keys.len());
    for key in keys {
        let cell = row
            .loaded(&key.tag)
            .or_else(|| row.get(&key.tag))
            .ok_or_else(|| OpStatus::failed("Row is missing a key value", 400))?;
        parts.push(format!(
            "{}={}",
            dialect.column_expr(key, false, false),
            cell_literal(dialect, key, cell)
        ));
    }
    Ok(parts.join(" AND "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::SqliteAdapter;
    use crate::descriptor::{Condition, Filter, FilterGroup, Sorting, SortingGroup};
    use crate::dialect::SqliteDialect;

    fn users_table() -> Table {
        Table::new("users")
            .with_column(
                Column::new("id", DataType::Integer)
                    .primary_key(),
            )
            .with_column(Column::new("name", DataType::String))
            .with_column(Column::new("age", DataType::Integer))
            .with_column(Column::new("created_at", DataType::DateTime))
    }

    fn seeded() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter
            .execute(
                "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, \
                 name TEXT, age INTEGER, created_at TEXT)",
            )
            .unwrap();
        adapter
            .execute(
                "INSERT INTO users (name, age, created_at) VALUES \
                 ('Alice', 34, '2024-03-15 10:30:00'), \
                 ('Bob', 17, '2024-06-01 08:00:00'), \
                 ('Anne-Marie', 28, '2024-01-20 23:59:59')",
            )
            .unwrap();
        adapter
    }

    #[test]
    fn test_retrieve_coerces_and_wraps_rows() {
        let adapter = seeded();
        let dialect = SqliteDialect::default();
        let spec = QuerySpec::from_table(users_table()).with_sorting(SortingGroup::single(
            Sorting::asc(Column::new("id", DataType::Integer).on("users")),
        ));

        let mut rows = RowSet::new();
        let count = retrieve(&adapter, &dialect, &spec, &mut rows).unwrap();
        assert_eq!(count, 3);

        let alice = &rows.rows[0];
        assert_eq!(alice.origin, RowOrigin::Database);
        assert_eq!(alice.state, RowState::Unchanged);
        assert_eq!(alice.get("name"), Some(&Cell::Text("Alice".into())));
        assert_eq!(alice.get("age"), Some(&Cell::Int(34)));
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(alice.get("created_at"), Some(&Cell::DateTime(expected)));
    }

    #[test]
    fn test_retrieve_clears_previous_rows() {
        let adapter = seeded();
        let dialect = SqliteDialect::default();
        let spec = QuerySpec::from_table(users_table());

        let mut rows = RowSet::new();
        retrieve(&adapter, &dialect, &spec, &mut rows).unwrap();
        retrieve(&adapter, &dialect, &spec, &mut rows).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_retrieve_count_honors_filters() {
        let adapter = seeded();
        let dialect = SqliteDialect::default();
        let spec = QuerySpec::from_table(users_table()).with_filters(FilterGroup::all(vec![
            Filter::new(
                Column::new("age", DataType::Integer).on("users"),
                Condition::GreaterOrEqual,
                18,
            )
            .into(),
        ]));

        let count = retrieve_count(&adapter, &dialect, &spec).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_datetime_round_trip() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter
            .execute("CREATE TABLE stamps (id INTEGER PRIMARY KEY AUTOINCREMENT, at TEXT)")
            .unwrap();
        let dialect = SqliteDialect::default();

        let original = NaiveDate::from_ymd_opt(2023, 11, 5)
            .unwrap()
            .and_hms_opt(14, 45, 12)
            .unwrap();
        // written through the compiler's literal...
        adapter
            .execute(&format!(
                "INSERT INTO stamps (at) VALUES ({})",
                dialect.datetime_literal(&original)
            ))
            .unwrap();

        // ...and read back through the coercion step
        let table = Table::new("stamps")
            .with_column(Column::new("id", DataType::Integer).primary_key())
            .with_column(Column::new("at", DataType::DateTime));
        let mut rows = RowSet::new();
        retrieve(
            &adapter,
            &dialect,
            &QuerySpec::from_table(table),
            &mut rows,
        )
        .unwrap();
        assert_eq!(rows.rows[0].get("at"), Some(&Cell::DateTime(original)));
    }

    #[test]
    fn test_time_coercion_is_time_only() {
        let dialect = SqliteDialect::default();
        let cell = coerce_value(&serde_json::json!("10:30:00"), DataType::Time, &dialect);
        assert_eq!(
            cell,
            Cell::Time(NaiveTime::from_hms_opt(10, 30, 0).unwrap())
        );
        // a full datetime collapses to its time part
        let cell = coerce_value(
            &serde_json::json!("2024-03-15 10:30:00"),
            DataType::Time,
            &dialect,
        );
        assert_eq!(
            cell,
            Cell::Time(NaiveTime::from_hms_opt(10, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_empty_array_sentinel() {
        let dialect = SqliteDialect::default();
        assert_eq!(
            coerce_value(&serde_json::json!("{}"), DataType::Array, &dialect),
            Cell::List(Vec::new())
        );
        assert_eq!(
            coerce_value(&serde_json::json!("{a,b}"), DataType::Array, &dialect),
            Cell::List(vec![Cell::Text("a".into()), Cell::Text("b".into())])
        );
    }

    #[test]
    fn test_geo_point_coercion() {
        let dialect = SqliteDialect::default();
        assert_eq!(
            coerce_value(&serde_json::json!("47.5,19.0"), DataType::GeoPoint, &dialect),
            Cell::Geo {
                lat: 47.5,
                lng: 19.0
            }
        );
    }

    #[test]
    fn test_save_rows_readonly_guard() {
        let adapter = seeded();
        let dialect = SqliteDialect::default();
        let table = users_table();
        let mut rows = RowSet::new();
        let mut row = Row::new();
        row.set("name", Cell::Text("Carol".into()));
        rows.push(row);

        let status = save_rows(&adapter, &dialect, &table, &mut rows, true);
        assert!(!status.is_positive);
        // the pending row is untouched
        assert_eq!(rows.rows[0].state, RowState::Added);
    }

    #[test]
    fn test_save_rows_insert_writes_back_identity() {
        let adapter = seeded();
        let dialect = SqliteDialect::default();
        let table = Table::new("users")
            .with_column({
                let mut c = Column::new("id", DataType::Integer).primary_key();
                c.auto_increment = true;
                c
            })
            .with_column(Column::new("name", DataType::String))
            .with_column(Column::new("age", DataType::Integer));

        let mut rows = RowSet::new();
        let mut row = Row::new();
        row.set("name", Cell::Text("Carol".into()));
        row.set("age", Cell::Int(41));
        rows.push(row);

        let status = save_rows(&adapter, &dialect, &table, &mut rows, false);
        assert!(status.is_positive);
        assert_eq!(rows.rows[0].get("id"), Some(&Cell::Int(4)));
        assert_eq!(rows.rows[0].state, RowState::Unchanged);
    }

    #[test]
    fn test_save_rows_updates_only_changed_fields() {
        let adapter = seeded();
        let dialect = SqliteDialect::default();
        let table = users_table();

        let mut rows = RowSet::new();
        retrieve(
            &adapter,
            &dialect,
            &QuerySpec::from_table(table.clone()),
            &mut rows,
        )
        .unwrap();
        let bob = rows
            .rows
            .iter_mut()
            .find(|r| r.get("name") == Some(&Cell::Text("Bob".into())))
            .unwrap();
        bob.set("age", Cell::Int(18));
        assert_eq!(bob.state, RowState::Modified);
        assert_eq!(bob.changed_fields().len(), 1);

        let status = save_rows(&adapter, &dialect, &table, &mut rows, false);
        assert!(status.is_positive);

        let check = adapter
            .query("SELECT age FROM users WHERE name='Bob'")
            .unwrap();
        assert_eq!(check.rows[0][0], serde_json::json!(18));
    }

    #[test]
    fn test_save_rows_delete_by_key() {
        let adapter = seeded();
        let dialect = SqliteDialect::default();
        let table = users_table();

        let mut rows = RowSet::new();
        retrieve(
            &adapter,
            &dialect,
            &QuerySpec::from_table(table.clone()),
            &mut rows,
        )
        .unwrap();
        rows.rows[0].mark_deleted();

        let status = save_rows(&adapter, &dialect, &table, &mut rows, false);
        assert!(status.is_positive);
        assert_eq!(rows.len(), 2);

        let check = adapter.query("SELECT COUNT(1) FROM users").unwrap();
        assert_eq!(check.rows[0][0], serde_json::json!(2));
    }
}
