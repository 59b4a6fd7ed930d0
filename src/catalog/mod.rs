//! Schema catalog
//!
//! Introspects and caches table, column and foreign-key metadata per schema.
//! A cheap checksum round trip decides which tables actually changed; only
//! those pay the heavier metadata fetch, so introspection cost scales with
//! the number of changed tables, not total tables.

pub mod cache;
pub mod meta;

pub use cache::{CacheStore, MemoryCache};
pub use meta::{
    checksum, map_native_type, CachedTable, SchemaField, SchemaRelation, SchemaTable,
    TableChecksums, TablesCache,
};

use std::cell::Cell;
use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::error;

use crate::adapter::Adapter;
use crate::dialect::QueryDialect;

/// Cache category every catalog key lives under
pub const CACHE_CATEGORY: &str = "spandb.schema";

/// Timestamp reported by backends that do not track DDL changes
pub fn epoch() -> NaiveDateTime {
    chrono::DateTime::<chrono::Utc>::UNIX_EPOCH.naive_utc()
}

/// One row of the checksum round trip
#[derive(Debug, Clone)]
struct ChecksumRow {
    name: String,
    table_checksum: String,
    fields_checksum: String,
    synonym_of: Option<String>,
}

/// Catalog context for one schema
///
/// Owned by the caller's session scope and passed explicitly; the catalog
/// holds no global state.
pub struct SchemaCatalog<'a> {
    schema: String,
    adapter: &'a dyn Adapter,
    dialect: &'a dyn QueryDialect,
    cache: &'a dyn CacheStore,
    resolved: Cell<bool>,
}

impl<'a> SchemaCatalog<'a> {
    pub fn new(
        schema: &str,
        adapter: &'a dyn Adapter,
        dialect: &'a dyn QueryDialect,
        cache: &'a dyn CacheStore,
    ) -> Self {
        Self {
            schema: schema.to_string(),
            adapter,
            dialect,
            cache,
            resolved: Cell::new(false),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Tables of this schema, refreshed incrementally
    ///
    /// Compares the current checksum round trip against the cached pair and
    /// re-fetches metadata only for outdated tables. Introspection failure
    /// logs an error and yields an empty list.
    pub fn tables(&self, force_refresh: bool) -> Vec<SchemaTable> {
        let rows = match self.fetch_checksums() {
            Some(rows) => rows,
            None => return Vec::new(),
        };

        let mut cached = self.load_tables_cache();
        let mut result = Vec::new();
        let mut outdated_fields: Vec<String> = Vec::new();

        for row in rows.iter().filter(|r| r.synonym_of.is_none()) {
            let entry = cached.tables.get(&row.name);
            let table_outdated = force_refresh
                || entry
                    .map(|e| e.checksums.table_checksum != row.table_checksum)
                    .unwrap_or(true);
            let fields_outdated = force_refresh
                || entry
                    .map(|e| e.checksums.fields_checksum != row.fields_checksum)
                    .unwrap_or(true);

            let meta = match entry {
                Some(e) if !table_outdated => e.meta.clone(),
                _ => SchemaTable::named(&row.name),
            };
            if fields_outdated {
                outdated_fields.push(row.name.clone());
            }

            cached.tables.insert(
                row.name.clone(),
                CachedTable {
                    checksums: TableChecksums {
                        table_checksum: row.table_checksum.clone(),
                        fields_checksum: row.fields_checksum.clone(),
                    },
                    meta: meta.clone(),
                },
            );
            result.push(meta);
        }

        if !outdated_fields.is_empty() {
            for (table, fields) in self.fetch_fields_for(&outdated_fields) {
                self.put_fields(&table, &fields);
            }
        }

        // synonym/alias tables clone their source's cached metadata
        for row in rows.iter().filter(|r| r.synonym_of.is_some()) {
            let Some(source) = row.synonym_of.as_deref() else {
                continue;
            };
            if let Some(entry) = cached.tables.get(source).cloned() {
                let mut meta = entry.meta.clone();
                meta.name = row.name.clone();
                meta.synonym_of = Some(source.to_string());
                if let Some(fields) = self.cached_fields(source) {
                    let renamed: Vec<SchemaField> = fields
                        .into_iter()
                        .map(|mut f| {
                            f.table = row.name.clone();
                            f
                        })
                        .collect();
                    self.put_fields(&row.name, &renamed);
                }
                cached
                    .tables
                    .insert(row.name.clone(), CachedTable { checksums: entry.checksums, meta: meta.clone() });
                result.push(meta);
            }
        }

        // entries for tables dropped from the backend stay in the cache
        self.store_tables_cache(&cached);
        self.resolved.set(true);
        result
    }

    /// Field metadata for one table, lazily resolving the schema first
    pub fn fields(&self, table: &str) -> Vec<SchemaField> {
        if let Some(fields) = self.cached_fields(table) {
            return fields;
        }
        if !self.resolved.get() {
            self.tables(false);
            if let Some(fields) = self.cached_fields(table) {
                return fields;
            }
        }
        // not part of the schema snapshot; fetch directly
        let mut fetched = self.fetch_fields_for(&[table.to_string()]);
        match fetched.remove(table) {
            Some(fields) => {
                self.put_fields(table, &fields);
                fields
            }
            None => Vec::new(),
        }
    }

    /// Foreign-key relationships, cached wholesale (not checksum-incremental)
    pub fn relations(&self, force_refresh: bool) -> Vec<SchemaRelation> {
        let key = format!("{}..refs", self.schema);
        if !force_refresh {
            if let Some(bytes) = self.cache.get(CACHE_CATEGORY, &key) {
                if let Ok(relations) = serde_json::from_slice::<Vec<SchemaRelation>>(&bytes) {
                    return relations;
                }
            }
        }

        let relations = match self.fetch_relations() {
            Some(relations) => relations,
            None => return Vec::new(),
        };
        if let Ok(bytes) = serde_json::to_vec(&relations) {
            self.cache.put(CACHE_CATEGORY, &key, bytes, None);
        }
        relations
    }

    /// Most recent DDL/update timestamp for one table or the whole schema;
    /// the epoch sentinel when the backend records none
    pub fn last_changed(&self, table: Option<&str>) -> NaiveDateTime {
        let sql = match self.dialect.last_changed_query(&self.schema, table) {
            Some(sql) => sql,
            None => return epoch(),
        };
        let result = match self.adapter.query(&sql) {
            Ok(result) => result,
            Err(e) => {
                error!(schema = %self.schema, error = %e, "last-changed query failed");
                return epoch();
            }
        };
        result
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(|v| v.as_str())
            .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok())
            .unwrap_or_else(epoch)
    }

    // ----- checksum round trip ----------------------------------------

    fn fetch_checksums(&self) -> Option<Vec<ChecksumRow>> {
        if let Some(sql) = self.dialect.checksum_query(&self.schema) {
            let result = match self.adapter.query(&sql) {
                Ok(result) => result,
                Err(e) => {
                    error!(schema = %self.schema, error = %e, "checksum introspection failed");
                    return None;
                }
            };
            let rows = result
                .rows
                .iter()
                .filter_map(|row| {
                    Some(ChecksumRow {
                        name: val_str(row.first())?,
                        table_checksum: val_str(row.get(1)).unwrap_or_default(),
                        fields_checksum: val_str(row.get(2)).unwrap_or_default(),
                        synonym_of: val_str(row.get(3)),
                    })
                })
                .collect();
            return Some(rows);
        }
        self.sqlite_checksums()
    }

    /// Client-side checksum fallback for backends without hashing functions
    /// in their catalog views (SQLite)
    fn sqlite_checksums(&self) -> Option<Vec<ChecksumRow>> {
        let sql = "SELECT name, sql FROM sqlite_master \
                   WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name";
        let result = match self.adapter.query(sql) {
            Ok(result) => result,
            Err(e) => {
                error!(schema = %self.schema, error = %e, "checksum introspection failed");
                return None;
            }
        };
        let rows = result
            .rows
            .iter()
            .filter_map(|row| {
                let name = val_str(row.first())?;
                let ddl = val_str(row.get(1)).unwrap_or_default();
                Some(ChecksumRow {
                    table_checksum: checksum(&[&name]),
                    fields_checksum: checksum(&[&ddl]),
                    name,
                    synonym_of: None,
                })
            })
            .collect();
        Some(rows)
    }

    // ----- field metadata ---------------------------------------------

    fn fetch_fields_for(&self, tables: &[String]) -> BTreeMap<String, Vec<SchemaField>> {
        if let Some(sql) = self.dialect.fields_query(&self.schema, tables) {
            let result = match self.adapter.query(&sql) {
                Ok(result) => result,
                Err(e) => {
                    error!(schema = %self.schema, error = %e, "field introspection failed");
                    return BTreeMap::new();
                }
            };
            let mut by_table: BTreeMap<String, Vec<SchemaField>> = BTreeMap::new();
            for row in &result.rows {
                let Some(table) = val_str(row.first()) else {
                    continue;
                };
                let Some(name) = val_str(row.get(1)) else {
                    continue;
                };
                let native_type = val_str(row.get(2)).unwrap_or_default();
                let field = SchemaField {
                    data_type: map_native_type(&native_type),
                    table: table.clone(),
                    name,
                    native_type,
                    nullable: val_bool(row.get(3)),
                    default_value: val_str(row.get(4)),
                    primary_key: val_bool(row.get(5)),
                    foreign_key: false,
                    indexed: false,
                    max_length: val_u32(row.get(6)),
                    comment: val_str(row.get(7)),
                    ordinal: val_u32(row.get(8)).unwrap_or(0),
                };
                by_table.entry(table).or_default().push(field);
            }
            return by_table;
        }
        self.sqlite_fields_for(tables)
    }

    fn sqlite_fields_for(&self, tables: &[String]) -> BTreeMap<String, Vec<SchemaField>> {
        let mut by_table = BTreeMap::new();
        for table in tables {
            let info = match self
                .adapter
                .query(&format!("PRAGMA table_info('{}')", table))
            {
                Ok(result) => result,
                Err(e) => {
                    error!(table = %table, error = %e, "field introspection failed");
                    continue;
                }
            };
            let fk_columns: Vec<String> = self
                .adapter
                .query(&format!("PRAGMA foreign_key_list('{}')", table))
                .map(|r| r.rows.iter().filter_map(|row| val_str(row.get(3))).collect())
                .unwrap_or_default();

            let fields: Vec<SchemaField> = info
                .rows
                .iter()
                .filter_map(|row| {
                    let name = val_str(row.get(1))?;
                    let native_type = val_str(row.get(2)).unwrap_or_default();
                    Some(SchemaField {
                        data_type: map_native_type(&native_type),
                        foreign_key: fk_columns.contains(&name),
                        table: table.clone(),
                        native_type,
                        nullable: !val_bool(row.get(3)),
                        default_value: val_str(row.get(4)),
                        primary_key: val_bool(row.get(5)),
                        indexed: false,
                        max_length: None,
                        comment: None,
                        ordinal: val_u32(row.first()).unwrap_or(0),
                        name,
                    })
                })
                .collect();
            by_table.insert(table.clone(), fields);
        }
        by_table
    }

    // ----- relations --------------------------------------------------

    fn fetch_relations(&self) -> Option<Vec<SchemaRelation>> {
        if let Some(sql) = self.dialect.relations_query(&self.schema) {
            let result = match self.adapter.query(&sql) {
                Ok(result) => result,
                Err(e) => {
                    error!(schema = %self.schema, error = %e, "relation introspection failed");
                    return None;
                }
            };
            let relations = result
                .rows
                .iter()
                .filter_map(|row| {
                    Some(SchemaRelation {
                        constraint: val_str(row.first()),
                        parent_table: val_str(row.get(1))?,
                        parent_column: val_str(row.get(2))?,
                        child_table: val_str(row.get(3))?,
                        child_column: val_str(row.get(4))?,
                    })
                })
                .collect();
            return Some(relations);
        }
        self.sqlite_relations()
    }

    fn sqlite_relations(&self) -> Option<Vec<SchemaRelation>> {
        let names = match self
            .adapter
            .query("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
        {
            Ok(result) => result,
            Err(e) => {
                error!(schema = %self.schema, error = %e, "relation introspection failed");
                return None;
            }
        };
        let mut relations = Vec::new();
        for row in &names.rows {
            let Some(child) = val_str(row.first()) else {
                continue;
            };
            let fks = match self
                .adapter
                .query(&format!("PRAGMA foreign_key_list('{}')", child))
            {
                Ok(result) => result,
                Err(_) => continue,
            };
            for fk in &fks.rows {
                // (id, seq, table, from, to, ...)
                let (Some(parent_table), Some(child_column), Some(parent_column)) =
                    (val_str(fk.get(2)), val_str(fk.get(3)), val_str(fk.get(4)))
                else {
                    continue;
                };
                relations.push(SchemaRelation {
                    constraint: None,
                    parent_table,
                    parent_column,
                    child_table: child.clone(),
                    child_column,
                });
            }
        }
        Some(relations)
    }

    // ----- cache plumbing ---------------------------------------------

    fn tables_key(&self) -> String {
        format!("{}..tables", self.schema)
    }

    fn load_tables_cache(&self) -> TablesCache {
        self.cache
            .get(CACHE_CATEGORY, &self.tables_key())
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }

    fn store_tables_cache(&self, cached: &TablesCache) {
        if let Ok(bytes) = serde_json::to_vec(cached) {
            self.cache.put(CACHE_CATEGORY, &self.tables_key(), bytes, None);
        }
    }

    fn cached_fields(&self, table: &str) -> Option<Vec<SchemaField>> {
        let key = format!("{}.{}", self.schema, table);
        let bytes = self.cache.get(CACHE_CATEGORY, &key)?;
        serde_json::from_slice(&bytes).ok()
    }

    fn put_fields(&self, table: &str, fields: &[SchemaField]) {
        let key = format!("{}.{}", self.schema, table);
        if let Ok(bytes) = serde_json::to_vec(fields) {
            self.cache.put(CACHE_CATEGORY, &key, bytes, None);
        }
    }
}

// value extraction from positional introspection rows

fn val_str(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn val_bool(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        Some(Value::String(s)) => s == "1" || s.eq_ignore_ascii_case("yes"),
        _ => false,
    }
}

fn val_u32(v: Option<&Value>) -> Option<u32> {
    match v? {
        Value::Number(n) => n.as_u64().map(|n| n as u32),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{
        Adapter, AdapterResult, ExecResult, QueryResult, SqliteAdapter,
    };
    use crate::dialect::SqliteDialect;
    use std::cell::RefCell;

    /// Forwards to a real adapter while recording every query
    struct CountingAdapter<'a> {
        inner: &'a SqliteAdapter,
        queries: RefCell<Vec<String>>,
    }

    impl<'a> CountingAdapter<'a> {
        fn new(inner: &'a SqliteAdapter) -> Self {
            Self {
                inner,
                queries: RefCell::new(Vec::new()),
            }
        }

        fn count_matching(&self, needle: &str) -> usize {
            self.queries
                .borrow()
                .iter()
                .filter(|q| q.contains(needle))
                .count()
        }
    }

    impl Adapter for CountingAdapter<'_> {
        fn query(&self, sql: &str) -> AdapterResult<QueryResult> {
            self.queries.borrow_mut().push(sql.to_string());
            self.inner.query(sql)
        }

        fn execute(&self, sql: &str) -> AdapterResult<ExecResult> {
            self.inner.execute(sql)
        }

        fn test_connection(&self) -> AdapterResult<()> {
            self.inner.test_connection()
        }

        fn reconnect(&mut self) -> AdapterResult<()> {
            Ok(())
        }
    }

    fn seeded_adapter() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter
            .execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .unwrap();
        adapter
            .execute(
                "CREATE TABLE orders (id INTEGER PRIMARY KEY, \
                 user_id INTEGER REFERENCES users(id), total REAL)",
            )
            .unwrap();
        adapter
    }

    #[test]
    fn test_tables_and_fields_introspection() {
        let sqlite = seeded_adapter();
        let dialect = SqliteDialect::default();
        let cache = MemoryCache::new();
        let catalog = SchemaCatalog::new("main", &sqlite, &dialect, &cache);

        let tables = catalog.tables(false);
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["orders", "users"]);

        let fields = catalog.fields("users");
        assert_eq!(fields.len(), 2);
        assert!(fields[0].primary_key);
        assert_eq!(fields[1].name, "name");
        assert!(!fields[1].nullable);

        let orders = catalog.fields("orders");
        assert!(orders.iter().any(|f| f.name == "user_id" && f.foreign_key));
    }

    #[test]
    fn test_second_refresh_skips_unchanged_tables() {
        let sqlite = seeded_adapter();
        let counting = CountingAdapter::new(&sqlite);
        let dialect = SqliteDialect::default();
        let cache = MemoryCache::new();
        let catalog = SchemaCatalog::new("main", &counting, &dialect, &cache);

        catalog.tables(false);
        let heavy_after_first = counting.count_matching("PRAGMA table_info");
        assert_eq!(heavy_after_first, 2);

        // nothing changed: checksum round trip only, no field re-fetch
        catalog.tables(false);
        assert_eq!(counting.count_matching("PRAGMA table_info"), heavy_after_first);

        // one table changes: only that table pays the heavy fetch
        sqlite
            .execute("ALTER TABLE orders ADD COLUMN note TEXT")
            .unwrap();
        catalog.tables(false);
        assert_eq!(
            counting.count_matching("PRAGMA table_info('orders')"),
            2
        );
        assert_eq!(counting.count_matching("PRAGMA table_info('users')"), 1);
    }

    #[test]
    fn test_fields_lazily_triggers_tables() {
        let sqlite = seeded_adapter();
        let dialect = SqliteDialect::default();
        let cache = MemoryCache::new();
        let catalog = SchemaCatalog::new("main", &sqlite, &dialect, &cache);

        // no explicit tables() call beforehand
        let fields = catalog.fields("orders");
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn test_relations_cached_wholesale() {
        let sqlite = seeded_adapter();
        let dialect = SqliteDialect::default();
        let cache = MemoryCache::new();
        let catalog = SchemaCatalog::new("main", &sqlite, &dialect, &cache);

        let relations = catalog.relations(false);
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].parent_table, "users");
        assert_eq!(relations[0].parent_column, "id");
        assert_eq!(relations[0].child_table, "orders");
        assert_eq!(relations[0].child_column, "user_id");

        // served from cache on the second call
        let again = catalog.relations(false);
        assert_eq!(relations, again);
    }

    #[test]
    fn test_dropped_table_entry_is_never_evicted() {
        let sqlite = seeded_adapter();
        let dialect = SqliteDialect::default();
        let cache = MemoryCache::new();
        let catalog = SchemaCatalog::new("main", &sqlite, &dialect, &cache);

        catalog.tables(false);
        sqlite.execute("DROP TABLE orders").unwrap();
        let tables = catalog.tables(false);
        assert_eq!(tables.len(), 1);

        // the cache map still carries the dropped table's entry
        let bytes = cache.get(CACHE_CATEGORY, "main..tables").unwrap();
        let cached: TablesCache = serde_json::from_slice(&bytes).unwrap();
        assert!(cached.tables.contains_key("orders"));
    }

    #[test]
    fn test_introspection_failure_yields_empty() {
        struct BrokenAdapter;
        impl Adapter for BrokenAdapter {
            fn query(&self, _sql: &str) -> AdapterResult<QueryResult> {
                Err(crate::adapter::AdapterError::Connection("gone".into()))
            }
            fn execute(&self, _sql: &str) -> AdapterResult<ExecResult> {
                Err(crate::adapter::AdapterError::Connection("gone".into()))
            }
            fn test_connection(&self) -> AdapterResult<()> {
                Err(crate::adapter::AdapterError::Connection("gone".into()))
            }
            fn reconnect(&mut self) -> AdapterResult<()> {
                Err(crate::adapter::AdapterError::Connection("gone".into()))
            }
        }

        let dialect = SqliteDialect::default();
        let cache = MemoryCache::new();
        let catalog = SchemaCatalog::new("main", &BrokenAdapter, &dialect, &cache);
        assert!(catalog.tables(false).is_empty());
        assert!(catalog.relations(false).is_empty());
    }

    #[test]
    fn test_last_changed_epoch_sentinel() {
        let sqlite = seeded_adapter();
        let dialect = SqliteDialect::default();
        let cache = MemoryCache::new();
        let catalog = SchemaCatalog::new("main", &sqlite, &dialect, &cache);

        // SQLite records no DDL timestamps
        assert_eq!(catalog.last_changed(None), epoch());
        assert_eq!(catalog.last_changed(Some("users")), epoch());
    }
}
