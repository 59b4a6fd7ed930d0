use spandb::adapter::{Adapter, SqliteAdapter};
use spandb::catalog::{MemoryCache, SchemaCatalog};
use spandb::descriptor::{
    Cell, Column, Condition, DataType, Filter, FilterGroup, JoinKind, QuerySpec, Relation,
    Sorting, SortingGroup, Table,
};
use spandb::dialect::{QueryDialect, SqliteDialect};
use spandb::docstore;
use spandb::retrieve::{retrieve, retrieve_count, Row, RowSet};
use spandb::txn::Transactions;

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

fn users_table() -> Table {
    Table::new("users")
        .aliased("u")
        .with_column(Column::new("id", DataType::Integer).primary_key())
        .with_column(Column::new("name", DataType::String))
        .with_column(Column::new("age", DataType::Integer))
}

fn orders_table() -> Table {
    Table::new("orders")
        .aliased("o")
        .with_column(Column::tagged("order_id", "id", DataType::Integer).primary_key())
        .with_column(Column::new("user_id", DataType::Integer))
        .with_column(Column::new("total", DataType::Float))
}

fn seeded_adapter() -> SqliteAdapter {
    let adapter = SqliteAdapter::in_memory().unwrap();
    adapter
        .execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)")
        .unwrap();
    adapter
        .execute(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, \
             user_id INTEGER REFERENCES users(id), total REAL)",
        )
        .unwrap();
    adapter
        .execute(
            "INSERT INTO users (id, name, age) VALUES \
             (1, 'Alice', 34), (2, 'Bob', 17), (3, 'Carol', 41)",
        )
        .unwrap();
    adapter
        .execute(
            "INSERT INTO orders (id, user_id, total) VALUES \
             (10, 1, 120.5), (11, 1, 9.99), (12, 3, 45.0)",
        )
        .unwrap();
    adapter
}

#[test]
fn joined_retrieval_with_filters_and_sorting() {
    init_tracing();
    let adapter = seeded_adapter();
    let dialect = SqliteDialect::default();

    let users = users_table();
    let orders = orders_table();
    let relation = Relation::new(users.clone(), orders.clone(), JoinKind::Inner)
        .link("id", "user_id");

    let spec = QuerySpec {
        tables: vec![users, orders],
        relations: vec![relation],
        filters: Some(FilterGroup::all(vec![Filter::new(
            Column::new("age", DataType::Integer).on("u"),
            Condition::GreaterOrEqual,
            18,
        )
        .into()])),
        grouping: Vec::new(),
        having: None,
        sorting: SortingGroup::single(Sorting::desc(
            Column::new("total", DataType::Float).on("o"),
        )),
        limit: Some(10),
        offset: 0,
        language: None,
    };

    let sql = dialect.retrieve_query(&spec).unwrap();
    assert!(sql.contains("FROM users u JOIN orders o ON u.id=o.user_id"));

    let mut rows = RowSet::new();
    let count = retrieve(&adapter, &dialect, &spec, &mut rows).unwrap();
    assert_eq!(count, 3);
    // sorted by total, descending
    assert_eq!(rows.rows[0].get("total"), Some(&Cell::Float(120.5)));
    assert_eq!(rows.rows[0].get("name"), Some(&Cell::Text("Alice".into())));
    assert_eq!(rows.rows[2].get("name"), Some(&Cell::Text("Alice".into())));

    assert_eq!(retrieve_count(&adapter, &dialect, &spec).unwrap(), 3);
}

#[test]
fn savepoint_rollback_discards_nested_work() {
    init_tracing();
    let adapter = seeded_adapter();
    let dialect = SqliteDialect::default();
    let mut txn = Transactions::new(&adapter, &dialect);

    assert!(txn.begin(None));
    adapter
        .execute("INSERT INTO users (id, name, age) VALUES (4, 'Dave', 50)")
        .unwrap();

    assert!(txn.begin(Some("inner")));
    adapter
        .execute("INSERT INTO users (id, name, age) VALUES (5, 'Eve', 29)")
        .unwrap();

    // discard only the inner level
    assert!(txn.rollback(Some("inner")));
    assert!(txn.commit(None));
    assert_eq!(txn.depth(), 0);

    let result = adapter.query("SELECT id FROM users ORDER BY id").unwrap();
    let ids: Vec<i64> = result
        .rows
        .iter()
        .map(|r| r[0].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}

#[test]
fn catalog_serves_fields_for_compiled_queries() {
    init_tracing();
    let adapter = seeded_adapter();
    let dialect = SqliteDialect::default();
    let cache = MemoryCache::new();
    let catalog = SchemaCatalog::new("main", &adapter, &dialect, &cache);

    let tables = catalog.tables(false);
    assert_eq!(tables.len(), 2);

    let fields = catalog.fields("users");
    let age = fields.iter().find(|f| f.name == "age").unwrap();
    assert_eq!(age.data_type, DataType::Integer);

    let relations = catalog.relations(false);
    assert_eq!(relations.len(), 1);
    assert_eq!(relations[0].parent_table, "users");
    assert_eq!(relations[0].child_table, "orders");
}

#[test]
fn document_store_mirrors_the_relational_path() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let collection = docstore::Collection::create(dir.path(), "contacts").unwrap();
    let table = Table::new("contacts")
        .with_column(Column::new("email", DataType::String).primary_key())
        .with_column(Column::new("age", DataType::Integer));

    // insert through the save path
    let mut rows = RowSet::new();
    for (email, age) in [("a@x.io", 30), ("b@x.io", 16)] {
        let mut row = Row::new();
        row.set("email", Cell::Text(email.into()));
        row.set("age", Cell::Int(age));
        rows.push(row);
    }
    let status = docstore::save_rows(&collection, &table, &mut rows, false);
    assert!(status.is_positive);

    // the same descriptor model compiles to a filter document
    let spec = QuerySpec::from_table(table).with_filters(FilterGroup::all(vec![
        Filter::not_null(Column::new("email", DataType::String)).into(),
        Filter::new(
            Column::new("age", DataType::Integer),
            Condition::GreaterOrEqual,
            18,
        )
        .into(),
    ]));
    let compiled = docstore::compile(&spec);
    let results = docstore::execute(&collection, &compiled).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["email"], serde_json::json!("a@x.io"));
}
