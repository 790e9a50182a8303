//! SQLite schema introspection by re-deriving structure from stored DDL.
//!
//! SQLite keeps only the original `CREATE` text of each object in
//! `sqlite_master`. This crate turns that text back into structure.
//!
//! # Architecture
//!
//! The crate is organized into five modules:
//!
//! - **`tokenizer`**: DDL text to borrowed tokens
//! - **`parser`**: `CREATE TABLE`, `CREATE INDEX` and `CREATE TRIGGER`
//!   syntax trees
//! - **`affinity`**: declared type names to affinity, data type and size
//! - **`builder`**: syntax trees plus pragma rows to the shared object model
//! - **`catalog`**: a live reader over a `rusqlite` connection
//!
//! # Quick start: parsing
//!
//! ```
//! use db_schema_core::{TriggerEvent, TriggerTiming};
//! use db_schema_sqlite::parse_create_trigger;
//!
//! let trigger = parse_create_trigger(
//!     "trg1",
//!     "CREATE TRIGGER trg1 BEFORE UPDATE ON t1 BEGIN SELECT 1; END",
//! )
//! .unwrap();
//! assert_eq!(trigger.timing, TriggerTiming::Before);
//! assert_eq!(trigger.event, TriggerEvent::Update);
//! assert_eq!(trigger.table, "t1");
//! ```
//!
//! # Quick start: reading a database
//!
//! ```no_run
//! use db_schema_sqlite::SqliteCatalog;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("app.db").unwrap();
//! let snapshot = SqliteCatalog::new(&conn).snapshot().unwrap();
//! for table in &snapshot.tables {
//!     println!("{} ({} columns)", table.name, table.columns.len());
//! }
//! for error in &snapshot.errors {
//!     eprintln!("{}: {}", error.name, error.message);
//! }
//! ```

mod affinity;
mod builder;
mod catalog;
mod error;
mod parser;
mod tokenizer;

pub use affinity::{ResolvedType, affinity_of, resolve_type};
pub use builder::{
    PragmaColumn, PragmaIndexColumn, build_auto_index, build_index, build_table, build_trigger,
};
pub use catalog::{CatalogOptions, CatalogSnapshot, MasterEntry, ObjectError, SqliteCatalog};
pub use error::{
    DdlError, DdlParseError, Result, SqliteError, TokenizationError, TokenizationErrorReason,
    UnsupportedConstructError,
};
pub use parser::{
    ColumnDef, DdlStatement, IndexDef, TableConstraint, TableDef, TriggerDef, parse_create_index,
    parse_create_table, parse_create_trigger, parse_ddl, split_statements,
};
pub use tokenizer::{Token, TokenKind, is_keyword, tokenize};
