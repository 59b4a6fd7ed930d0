//! Save path for the document store
//!
//! Branches on row lifecycle state: added rows insert and get their
//! generated identity written back, modified rows issue a minimal
//! field-level diff, deleted rows are matched by primary key or stored
//! identity. A readonly-schema guard rejects everything before any call.

use serde_json::{json, Map, Value};
use tracing::error;

use crate::descriptor::{Cell, Table};
use crate::retrieve::{Row, RowSet, RowState};
use crate::status::OpStatus;

use super::collection::Collection;
use super::document::Document;
use super::filter;

/// Field carrying a row's stored document identity
pub const IDENTITY_FIELD: &str = "_id";

/// Persist a row set's pending changes into a collection
pub fn save_rows(
    collection: &Collection,
    table: &Table,
    rows: &mut RowSet,
    readonly: bool,
) -> OpStatus {
    if readonly {
        return OpStatus::failed("Schema is readonly", 403);
    }

    let mut surviving = Vec::with_capacity(rows.rows.len());
    let mut pending = std::mem::take(&mut rows.rows).into_iter();

    while let Some(mut row) = pending.next() {
        let outcome = match row.state {
            RowState::Added => insert_row(collection, &mut row),
            RowState::Modified => update_row(collection, table, &mut row),
            RowState::Deleted => match delete_row(collection, table, &row) {
                Ok(()) => continue,
                Err(status) => Err(status),
            },
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

fn insert_row(collection: &Collection, row: &mut Row) -> Result<(), OpStatus> {
    let mut data = Map::new();
    for (tag, cell) in row.values() {
        if tag == IDENTITY_FIELD {
            continue;
        }
        data.insert(tag.clone(), cell_to_json(cell));
    }

    let doc = Document::new(Value::Object(data));
    match collection.insert(doc) {
        Ok(id) => {
            // generated identity flows back onto the in-memory row
            row.set(IDENTITY_FIELD, Cell::Text(id));
            row.accept();
            Ok(())
        }
        Err(e) => {
            error!(collection = %collection.name, error = %e, "document insert failed");
            Err(OpStatus::failed("Failed to insert document", 500).with_debug(&e.to_string()))
        }
    }
}

fn update_row(collection: &Collection, table: &Table, row: &mut Row) -> Result<(), OpStatus> {
    let changed = row.changed_fields();
    if changed.is_empty() {
        row.accept();
        return Ok(());
    }

    let id = locate(collection, table, row)?;
    let mut fields = Map::new();
    for (tag, cell) in &changed {
        if tag == IDENTITY_FIELD {
            continue;
        }
        fields.insert(tag.clone(), cell_to_json(cell));
    }

    match collection.update_fields(&id, &fields) {
        Ok(_) => {
            row.accept();
            Ok(())
        }
        Err(e) => {
            error!(collection = %collection.name, error = %e, "document update failed");
            Err(OpStatus::failed("Failed to update document", 500).with_debug(&e.to_string()))
        }
    }
}

fn delete_row(collection: &Collection, table: &Table, row: &Row) -> Result<(), OpStatus> {
    let id = locate(collection, table, row)?;
    match collection.delete(&id) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(collection = %collection.name, error = %e, "document delete failed");
            Err(OpStatus::failed("Failed to delete document", 500).with_debug(&e.to_string()))
        }
    }
}

/// Resolve a row to its document identity: the stored identity when present,
/// otherwise a primary-key criteria match
fn locate(collection: &Collection, table: &Table, row: &Row) -> Result<String, OpStatus> {
    if let Some(Cell::Text(id)) = row.loaded(IDENTITY_FIELD).or_else(|| row.get(IDENTITY_FIELD)) {
        return Ok(id.clone());
    }

    let keys: Vec<_> = table.key_columns().collect();
    if keys.is_empty() {
        return Err(OpStatus::failed("Row has no identity or key values", 400));
    }

    let mut criteria = Map::new();
    for key in keys {
        let cell = row
            .loaded(&key.tag)
            .or_else(|| row.get(&key.tag))
            .ok_or_else(|| OpStatus::failed("Row is missing a key value", 400))?;
        criteria.insert(key.name.clone(), cell_to_json(cell));
    }
    let criteria = Value::Object(criteria);

    let docs = collection
        .all()
        .map_err(|e| OpStatus::failed("Failed to scan collection", 500).with_debug(&e.to_string()))?;
    docs.iter()
        .find(|d| filter::matches(&d.flattened(), &criteria))
        .map(|d| d.id.clone())
        .ok_or_else(|| OpStatus::failed("No document matches the row's key", 404))
}

/// Document representation of a typed cell
pub fn cell_to_json(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Bool(b) => json!(b),
        Cell::Int(i) => json!(i),
        Cell::Float(f) => json!(f),
        Cell::Text(s) => json!(s),
        Cell::Date(d) => json!(d.format("%Y-%m-%d").to_string()),
        Cell::DateTime(dt) => json!(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        Cell::Time(t) => json!(t.format("%H:%M:%S").to_string()),
        Cell::Blob(b) => {
            use base64::Engine;
            json!(base64::engine::general_purpose::STANDARD.encode(b))
        }
        Cell::Json(v) => v.clone(),
        Cell::List(items) => Value::Array(items.iter().map(cell_to_json).collect()),
        Cell::Geo { lat, lng } => json!({"lat": lat, "lng": lng}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Column, DataType};
    use tempfile::tempdir;

    fn people_table() -> Table {
        Table::new("people")
            .with_column(Column::new("name", DataType::String).primary_key())
            .with_column(Column::new("age", DataType::Integer))
    }

    #[test]
    fn test_readonly_guard_rejects_before_any_call() {
        let dir = tempdir().unwrap();
        let col = Collection::create(dir.path(), "people").unwrap();
        let mut rows = RowSet::new();
        let mut row = Row::new();
        row.set("name", Cell::Text("Alice".into()));
        rows.push(row);

        let status = save_rows(&col, &people_table(), &mut rows, true);
        assert!(!status.is_positive);
        assert_eq!(col.count().unwrap(), 0);
    }

    #[test]
    fn test_insert_writes_identity_back() {
        let dir = tempdir().unwrap();
        let col = Collection::create(dir.path(), "people").unwrap();
        let mut rows = RowSet::new();
        let mut row = Row::new();
        row.set("name", Cell::Text("Alice".into()));
        row.set("age", Cell::Int(34));
        rows.push(row);

        let status = save_rows(&col, &people_table(), &mut rows, false);
        assert!(status.is_positive);
        let id = match rows.rows[0].get(IDENTITY_FIELD) {
            Some(Cell::Text(id)) => id.clone(),
            other => panic!("expected identity, got {:?}", other),
        };
        assert_eq!(
            col.get(&id).unwrap().get("name"),
            Some(&json!("Alice"))
        );
    }

    #[test]
    fn test_update_issues_minimal_diff() {
        let dir = tempdir().unwrap();
        let col = Collection::create(dir.path(), "people").unwrap();
        let mut rows = RowSet::new();
        let mut row = Row::new();
        row.set("name", Cell::Text("Bob".into()));
        row.set("age", Cell::Int(17));
        rows.push(row);
        save_rows(&col, &people_table(), &mut rows, false);

        rows.rows[0].set("age", Cell::Int(18));
        assert_eq!(rows.rows[0].changed_fields().len(), 1);
        let status = save_rows(&col, &people_table(), &mut rows, false);
        assert!(status.is_positive);

        let docs = col.all().unwrap();
        assert_eq!(docs[0].get("age"), Some(&json!(18)));
        assert_eq!(docs[0].get("name"), Some(&json!("Bob")));
    }

    #[test]
    fn test_delete_matches_by_key_without_identity() {
        let dir = tempdir().unwrap();
        let col = Collection::create(dir.path(), "people").unwrap();
        col.insert(Document::new(json!({"name": "Carol", "age": 41})))
            .unwrap();

        // a row constructed without a stored identity, matched by key
        let mut rows = RowSet::new();
        let mut row = Row::new();
        row.set("name", Cell::Text("Carol".into()));
        row.mark_deleted();
        rows.push(row);

        let status = save_rows(&col, &people_table(), &mut rows, false);
        assert!(status.is_positive);
        assert_eq!(col.count().unwrap(), 0);
        assert!(rows.is_empty());
    }
}
