//! Dialect-neutral schema model and identifier resolution.
//!
//! This crate defines the pieces every database backend shares:
//!
//! - [`Identifier`]: an immutable, possibly partially-qualified object name
//!   compared only through an [`IdentifierComparer`].
//! - [`ResolutionStrategy`] and [`resolve`]: turn a name as the user typed
//!   it into the name the catalog actually stores, by probing an ordered
//!   list of candidates.
//! - [`Dialect`]: identifier conventions of SQL Server, MySQL, PostgreSQL,
//!   Oracle and SQLite.
//! - [`Table`], [`Column`], [`Index`], [`Trigger`] and friends: the schema
//!   object model consumed by reporting and code generation.
//! - [`validate_table`]: structural checks on a built table.
//!
//! # Example
//!
//! ```
//! use db_schema_core::*;
//!
//! let table = Table::new(Identifier::parse("main.users").unwrap())
//!     .with_column(Column::new("id", ColumnType::new("INTEGER", DataType::Integer)).autoincrement())
//!     .with_primary_key(PrimaryKey { name: None, columns: vec!["id".into()] });
//!
//! assert!(validate_table(&table, Dialect::Sqlite.comparer()).is_empty());
//! ```

mod dialect;
mod identifier;
mod resolve;
mod types;
mod validate;

pub use dialect::Dialect;
pub use identifier::{
    CaseFolding, Identifier, IdentifierComparer, IdentifierDefaults, IdentifierError,
};
pub use resolve::{
    CaseFoldingStrategy, ExactMatchStrategy, ResolutionStrategy, ResolveError, resolve,
    resolve_with_value,
};
pub use types::*;
pub use validate::{ValidationError, validate_table};
