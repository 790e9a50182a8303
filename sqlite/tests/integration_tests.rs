//! Integration tests for the db-schema-sqlite crate.

use db_schema_core::{
    Affinity, DataType, ForeignKeyAction, GeneratedKind, Identifier, IdentifierComparer,
    IndexOrigin, SortOrder, TriggerEvent, TriggerTiming, TypeDimension, validate_table,
};
use db_schema_sqlite::{
    CatalogOptions, DdlStatement, SqliteCatalog, SqliteError, TableConstraint, parse_create_index,
    parse_create_table, parse_create_trigger, parse_ddl, split_statements,
};
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;

const SHOP_SCHEMA: &str = "
    CREATE TABLE customers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE COLLATE NOCASE,
        name VARCHAR(100) DEFAULT 'anonymous'
    );
    CREATE TABLE orders (
        id INTEGER PRIMARY KEY,
        customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE ON UPDATE SET NULL,
        total NUMERIC(10,2) NOT NULL DEFAULT 0 CHECK (total >= 0),
        placed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        total_cents INTEGER GENERATED ALWAYS AS (CAST(total * 100 AS INTEGER)) VIRTUAL
    );
    CREATE INDEX ix_orders_customer ON orders (customer_id, placed_at DESC);
    CREATE UNIQUE INDEX ix_customers_lower_email ON customers (lower(email)) WHERE email IS NOT NULL;
    CREATE TRIGGER trg_orders_audit AFTER UPDATE OF total ON orders
    FOR EACH ROW WHEN new.total <> old.total
    BEGIN
        UPDATE customers SET name = name WHERE id = new.customer_id;
    END;
    CREATE VIEW order_totals AS SELECT customer_id, sum(total) AS total FROM orders GROUP BY customer_id;
    CREATE TRIGGER trg_order_totals INSTEAD OF DELETE ON order_totals
    BEGIN
        DELETE FROM orders WHERE customer_id = old.customer_id;
    END;
";

fn shop_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SHOP_SCHEMA).unwrap();
    conn
}

// =============================================================================
// Parser examples
// =============================================================================

#[test]
fn test_table_example() {
    let def = parse_create_table(
        "t1",
        "CREATE TABLE t1 (id INTEGER PRIMARY KEY AUTOINCREMENT, name VARCHAR(50) NOT NULL DEFAULT 'x')",
    )
    .unwrap();

    assert_eq!(def.name, "t1");
    let id = &def.columns[0];
    assert_eq!(id.affinity, Affinity::Integer);
    assert!(id.autoincrement);
    let name = &def.columns[1];
    assert_eq!(name.affinity, Affinity::Text);
    assert_eq!(name.column_type.length, TypeDimension::Specified(50));
    assert!(!name.nullable);
    assert_eq!(name.default.as_deref(), Some("'x'"));
    assert_eq!(def.primary_key(), Some(&["id".to_string()][..]));
}

#[test]
fn test_trigger_examples() {
    let trg1 = parse_create_trigger("trg1", "CREATE TRIGGER trg1 BEFORE UPDATE ON t1 BEGIN SELECT 1; END").unwrap();
    assert_eq!((trg1.timing, trg1.event, trg1.table.as_str()), (TriggerTiming::Before, TriggerEvent::Update, "t1"));

    let trg2 = parse_create_trigger(
        "trg2",
        "CREATE TRIGGER trg2 INSTEAD OF DELETE ON v1 BEGIN SELECT 1; END",
    )
    .unwrap();
    assert_eq!((trg2.timing, trg2.event, trg2.table.as_str()), (TriggerTiming::InsteadOf, TriggerEvent::Delete, "v1"));
}

#[test]
fn test_trigger_without_event_is_unsupported() {
    let err = parse_create_trigger("trg", "CREATE TRIGGER trg AFTER ON t1 BEGIN INSERT INTO t2 VALUES (1); END")
        .unwrap_err();
    assert_eq!(err.kind(), "unsupported");
}

#[test]
fn test_index_example() {
    let def = parse_create_index("ix1", "CREATE UNIQUE INDEX ix1 ON t1 (name COLLATE NOCASE DESC)").unwrap();
    assert!(def.unique);
    assert_eq!(def.columns.len(), 1);
    assert_eq!(def.columns[0].expression, "name");
    assert_eq!(def.columns[0].collation.as_deref(), Some("NOCASE"));
    assert_eq!(def.columns[0].order, SortOrder::Descending);
}

#[test]
fn test_foreign_key_action_example() {
    let def = parse_create_table(
        "c",
        "CREATE TABLE c (pid INTEGER, FOREIGN KEY (pid) REFERENCES p(id) ON DELETE CASCADE ON UPDATE SET NULL)",
    )
    .unwrap();
    assert!(matches!(
        &def.constraints[0],
        TableConstraint::ForeignKey {
            on_delete: ForeignKeyAction::Cascade,
            on_update: ForeignKeyAction::SetNull,
            ..
        }
    ));
}

#[test]
fn test_every_statement_in_script_parses_twice_identically() {
    for statement in split_statements(SHOP_SCHEMA).unwrap() {
        let first = parse_ddl("obj", statement);
        let second = parse_ddl("obj", statement);
        assert_eq!(first, second, "{statement}");
        if !statement.contains("CREATE VIEW") {
            assert!(first.is_ok(), "{statement}: {first:?}");
        }
    }
}

#[test]
fn test_ast_serializes_to_json() {
    let stmt = parse_ddl("ix", "CREATE INDEX ix ON t (a) WHERE a > 1").unwrap();
    let json = serde_json::to_value(&stmt).unwrap();
    assert_eq!(json["type"], "index");
    assert_eq!(json["definition"]["predicate"], "a > 1");
    assert!(matches!(stmt, DdlStatement::Index(_)));
}

// =============================================================================
// Catalog
// =============================================================================

#[test]
fn test_snapshot_reads_whole_schema() {
    let conn = shop_db();
    let snapshot = SqliteCatalog::new(&conn).snapshot().unwrap();

    assert!(snapshot.errors.is_empty(), "{:?}", snapshot.errors);
    assert_eq!(snapshot.views, vec!["order_totals".to_string()]);
    assert_eq!(snapshot.tables.len(), 2);

    let customers = snapshot.table("customers").unwrap();
    assert!(customers.columns[0].autoincrement);
    assert_eq!(customers.columns[1].collation.as_deref(), Some("NOCASE"));
    assert_eq!(customers.columns[2].default.as_deref(), Some("'anonymous'"));
    let auto = customers
        .indexes
        .iter()
        .find(|i| i.origin == IndexOrigin::UniqueConstraint)
        .unwrap();
    assert_eq!(auto.key_columns()[0].expression, "email");
    assert_eq!(auto.key_columns()[0].collation.as_deref(), Some("NOCASE"));
    let expr = customers
        .find_index("ix_customers_lower_email", IdentifierComparer::IgnoreCase)
        .unwrap();
    assert!(expr.columns[0].is_expression);
    assert_eq!(expr.predicate.as_deref(), Some("email IS NOT NULL"));

    let orders = snapshot.table("ORDERS").unwrap();
    let names: Vec<_> = orders.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "customer_id", "total", "placed_at", "total_cents"]);
    assert_eq!(orders.columns[2].column_type.scale, TypeDimension::Specified(2));
    assert_eq!(orders.columns[3].column_type.data_type, DataType::Timestamp);
    assert_eq!(
        orders.columns[4].generated.as_ref().map(|g| g.kind),
        Some(GeneratedKind::Virtual)
    );
    assert_eq!(orders.foreign_keys[0].on_update, ForeignKeyAction::SetNull);
    assert_eq!(orders.triggers.len(), 1);
    assert_eq!(orders.triggers[0].update_columns, vec!["total".to_string()]);
    assert_eq!(orders.indexes[0].columns[1].order, SortOrder::Descending);

    assert_eq!(snapshot.detached_triggers.len(), 1);
    assert_eq!(snapshot.detached_triggers[0].timing, TriggerTiming::InsteadOf);

    for table in &snapshot.tables {
        assert!(validate_table(table, IdentifierComparer::IgnoreCase).is_empty());
    }
}

#[test]
fn test_without_rowid_primary_key_index() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE kv (k TEXT, v BLOB, PRIMARY KEY (k DESC)) WITHOUT ROWID, STRICT;")
        .unwrap();

    let table = SqliteCatalog::new(&conn).table("kv").unwrap();
    assert!(table.without_rowid);
    assert!(table.strict);
    assert_eq!(table.primary_key.as_ref().unwrap().columns, vec!["k".to_string()]);
    let pk_index = table
        .indexes
        .iter()
        .find(|i| i.origin == IndexOrigin::PrimaryKey)
        .unwrap();
    assert!(pk_index.unique);
    assert_eq!(pk_index.key_columns()[0].order, SortOrder::Descending);
}

#[test]
fn test_unparseable_object_does_not_stop_siblings() {
    let conn = shop_db();
    conn.execute_batch("CREATE VIRTUAL TABLE notes USING fts5(body);").unwrap();

    let snapshot = SqliteCatalog::new(&conn).snapshot().unwrap();

    assert_eq!(snapshot.errors.len(), 1);
    let error = &snapshot.errors[0];
    assert_eq!(error.name, "notes");
    assert_eq!(error.kind, "unsupported");
    assert!(error.raw_sql.as_deref().unwrap().contains("fts5"));

    assert!(snapshot.table("customers").is_some());
    assert!(snapshot.table("orders").is_some());
    assert!(snapshot.table("notes").is_none());
}

#[test]
fn test_table_lookup() {
    let conn = shop_db();
    let catalog = SqliteCatalog::new(&conn);

    let orders = catalog.table("Orders").unwrap();
    assert_eq!(orders.name.to_string(), "main.orders");
    assert_eq!(orders.indexes.len(), 1);
    assert_eq!(orders.triggers.len(), 1);

    assert!(matches!(catalog.table("missing"), Err(SqliteError::ObjectNotFound(_))));
}

#[test]
fn test_excluded_objects_are_skipped() {
    let conn = shop_db();
    let options = CatalogOptions::default().with_exclude(["orders"]);
    let snapshot = SqliteCatalog::with_options(&conn, options).snapshot().unwrap();

    assert_eq!(snapshot.tables.len(), 1);
    assert!(snapshot.table("orders").is_none());
    assert!(snapshot.errors.is_empty());
}

#[test]
fn test_temp_schema() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TEMP TABLE scratch (id INTEGER, note TEXT);").unwrap();

    let main = SqliteCatalog::new(&conn).snapshot().unwrap();
    assert!(main.tables.is_empty());

    let temp = SqliteCatalog::with_options(&conn, CatalogOptions::default().with_schema("temp"))
        .snapshot()
        .unwrap();
    assert_eq!(temp.tables.len(), 1);
    assert_eq!(temp.tables[0].name.to_string(), "temp.scratch");
    assert_eq!(temp.tables[0].columns.len(), 2);
}

#[test]
fn test_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.db");
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(SHOP_SCHEMA).unwrap();
    }

    let conn = Connection::open(&path).unwrap();
    let snapshot = SqliteCatalog::new(&conn).snapshot().unwrap();
    assert_eq!(snapshot.tables.len(), 2);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["schema"], "main");
    assert!(json["tables"].as_array().unwrap().len() == 2);
}

// =============================================================================
// Resolution
// =============================================================================

#[tokio::test]
async fn test_resolve_table_folds_case() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE users (id INTEGER);").unwrap();
    let catalog = SqliteCatalog::new(&conn);
    let cancel = CancellationToken::new();

    let resolved = catalog
        .resolve_table(&Identifier::new("Users").unwrap(), &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.schema(), Some("main"));
    assert_eq!(resolved.local_name(), "users");
}

#[tokio::test]
async fn test_resolve_table_prefers_exact_spelling() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE \"Users\" (id INTEGER);").unwrap();
    let catalog = SqliteCatalog::new(&conn);

    let resolved = catalog
        .resolve_table(&Identifier::new("Users").unwrap(), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.local_name(), "Users");
}

#[tokio::test]
async fn test_resolve_table_not_found_and_cancelled() {
    let conn = shop_db();
    let catalog = SqliteCatalog::new(&conn);

    let missing = catalog
        .resolve_table(&Identifier::new("Nope").unwrap(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(missing.is_none());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = catalog
        .resolve_table(&Identifier::new("orders").unwrap(), &cancel)
        .await;
    assert!(matches!(result, Err(SqliteError::Resolve(_))));
}

#[tokio::test]
async fn test_resolve_table_in_unattached_schema_is_not_found() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE users (id INTEGER);").unwrap();
    let catalog = SqliteCatalog::new(&conn);

    // Every candidate lookup fails because `nosuch` is not attached.
    let resolved = catalog
        .resolve_table(&Identifier::parse("Nosuch.Users").unwrap(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(resolved.is_none());

    let resolved = catalog
        .resolve_table(&Identifier::parse("main.Users").unwrap(), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.local_name(), "users");
}
