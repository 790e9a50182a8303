//! Live catalog reader.
//!
//! [`SqliteCatalog`] lists the objects in `sqlite_master`, parses their
//! stored DDL, merges it with pragma output and returns tables with their
//! indexes and triggers attached. A statement that fails to parse affects
//! only its own object: the failure is logged, recorded in
//! [`CatalogSnapshot::errors`] and the rest of the catalog is still read.
//!
//! # Examples
//!
//! ```
//! use db_schema_sqlite::SqliteCatalog;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open_in_memory().unwrap();
//! conn.execute_batch(
//!     "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL UNIQUE);
//!      CREATE INDEX ix_users_email ON users (email COLLATE NOCASE);",
//! )
//! .unwrap();
//!
//! let snapshot = SqliteCatalog::new(&conn).snapshot().unwrap();
//! assert!(snapshot.errors.is_empty());
//! let users = &snapshot.tables[0];
//! assert_eq!(users.columns.len(), 2);
//! // The explicit index plus the one backing UNIQUE
//! assert_eq!(users.indexes.len(), 2);
//! ```

use db_schema_core::{
    Dialect, Identifier, IdentifierDefaults, Index, IndexOrigin, Table, Trigger, resolve,
    validate_table,
};
use rayon::prelude::*;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::builder::{
    PragmaColumn, PragmaIndexColumn, build_auto_index, build_index, build_table, build_trigger,
};
use crate::error::{DdlError, Result, SqliteError};
use crate::parser::{DdlStatement, TableDef, parse_ddl};

/// What to read from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogOptions {
    /// Attached database to read (`main`, `temp` or an attachment name).
    pub schema: String,
    /// Include `sqlite_`-prefixed internal objects.
    pub include_system_objects: bool,
    /// Object names to skip, compared case-insensitively. Excluding a
    /// table also excludes its indexes and triggers.
    pub exclude: Vec<String>,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            schema: "main".to_string(),
            include_system_objects: false,
            exclude: Vec::new(),
        }
    }
}

impl CatalogOptions {
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn include_system_objects(mut self, include: bool) -> Self {
        self.include_system_objects = include;
        self
    }

    pub fn with_exclude(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.exclude.iter().any(|e| e.eq_ignore_ascii_case(name))
    }
}

/// One row of `sqlite_master`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MasterEntry {
    pub object_type: String,
    pub name: String,
    pub table_name: String,
    /// `None` for indexes SQLite creates on its own.
    pub sql: Option<String>,
}

/// An object whose DDL could not be turned into the object model.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectError {
    pub object_type: String,
    pub name: String,
    /// `tokenization`, `syntax`, `unsupported` or `build`.
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_sql: Option<String>,
}

impl ObjectError {
    fn new(entry: &MasterEntry, error: &SqliteError) -> Self {
        let (kind, position) = match error {
            SqliteError::Ddl(ddl) => (ddl.kind(), ddl.position()),
            _ => ("build", None),
        };
        Self {
            object_type: entry.object_type.clone(),
            name: entry.name.clone(),
            kind: kind.to_string(),
            message: error.to_string(),
            position,
            raw_sql: entry.sql.clone(),
        }
    }
}

/// Everything read from one attached database.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogSnapshot {
    pub schema: String,
    pub tables: Vec<Table>,
    /// View names. View definitions are not parsed.
    pub views: Vec<String>,
    /// Triggers whose table is a view or failed to build.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detached_triggers: Vec<Trigger>,
    pub errors: Vec<ObjectError>,
}

impl CatalogSnapshot {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.name.local_name().eq_ignore_ascii_case(name))
    }
}

/// Objects assembled from a set of catalog entries, with raw failures.
struct Assembled {
    tables: Vec<Table>,
    views: Vec<String>,
    detached_triggers: Vec<Trigger>,
    failures: Vec<(MasterEntry, SqliteError)>,
}

/// Reads schema objects from a SQLite connection.
pub struct SqliteCatalog<'a> {
    conn: &'a Connection,
    options: CatalogOptions,
}

impl<'a> SqliteCatalog<'a> {
    /// Reads the `main` database with default options.
    pub fn new(conn: &'a Connection) -> Self {
        Self::with_options(conn, CatalogOptions::default())
    }

    pub fn with_options(conn: &'a Connection, options: CatalogOptions) -> Self {
        Self { conn, options }
    }

    pub fn options(&self) -> &CatalogOptions {
        &self.options
    }

    fn master_table(&self, schema: &str) -> String {
        format!("{}.sqlite_master", quote_identifier(schema))
    }

    /// Lists tables, views, indexes and triggers, tables first.
    ///
    /// Internal objects and excluded names are filtered out according to
    /// the options.
    pub fn master_entries(&self) -> Result<Vec<MasterEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT type, name, tbl_name, sql FROM {} \
             WHERE type IN ('table', 'view', 'index', 'trigger') \
             ORDER BY CASE type WHEN 'table' THEN 0 WHEN 'view' THEN 1 \
             WHEN 'index' THEN 2 ELSE 3 END, name",
            self.master_table(&self.options.schema)
        ))?;
        let entries = stmt
            .query_map([], |row| {
                Ok(MasterEntry {
                    object_type: row.get(0)?,
                    name: row.get(1)?,
                    table_name: row.get(2)?,
                    sql: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries
            .into_iter()
            .filter(|e| {
                self.options.include_system_objects
                    || !(is_system_name(&e.name) || is_system_name(&e.table_name))
            })
            .filter(|e| !self.options.is_excluded(&e.name) && !self.options.is_excluded(&e.table_name))
            .collect())
    }

    /// Reads `pragma_table_xinfo` for one table, in column order.
    pub fn table_columns(&self, table: &str) -> Result<Vec<PragmaColumn>> {
        let mut stmt = self.conn.prepare(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk, hidden \
             FROM pragma_table_xinfo(?1, ?2) ORDER BY cid",
        )?;
        let columns = stmt
            .query_map(params![table, self.options.schema], |row| {
                Ok(PragmaColumn {
                    cid: row.get(0)?,
                    name: row.get(1)?,
                    declared_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    not_null: row.get(3)?,
                    default: row.get(4)?,
                    pk: row.get(5)?,
                    hidden: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    fn index_columns(&self, index: &str) -> Result<Vec<PragmaIndexColumn>> {
        let mut stmt = self.conn.prepare(
            "SELECT seqno, cid, name, \"desc\", coll, \"key\" \
             FROM pragma_index_xinfo(?1, ?2) ORDER BY seqno",
        )?;
        let columns = stmt
            .query_map(params![index, self.options.schema], |row| {
                Ok(PragmaIndexColumn {
                    seqno: row.get(0)?,
                    cid: row.get(1)?,
                    name: row.get(2)?,
                    descending: row.get(3)?,
                    collation: row.get(4)?,
                    key: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    /// Indexes SQLite created for `UNIQUE` and `PRIMARY KEY` constraints.
    fn auto_indexes(&self, table: &str) -> Result<Vec<Index>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, \"unique\", origin FROM pragma_index_list(?1, ?2) \
             WHERE origin IN ('u', 'pk') ORDER BY name",
        )?;
        let rows = stmt
            .query_map(params![table, self.options.schema], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, bool>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.iter()
            .map(|(name, unique, origin)| {
                let origin = if origin == "pk" {
                    IndexOrigin::PrimaryKey
                } else {
                    IndexOrigin::UniqueConstraint
                };
                let columns = self.index_columns(name)?;
                build_auto_index(&self.options.schema, table, name, *unique, origin, &columns)
            })
            .collect()
    }

    fn build_table_entry(&self, entry: &MasterEntry, def: &TableDef) -> Result<Table> {
        let pragma = self.table_columns(&entry.name)?;
        let mut table = build_table(&self.options.schema, def, &pragma)?;
        table.indexes = self.auto_indexes(&entry.name)?;
        Ok(table)
    }

    fn assemble(&self, entries: Vec<MasterEntry>) -> Assembled {
        let schema = self.options.schema.as_str();

        // Parsing is pure, so it runs in parallel; pragma reads stay on
        // this thread with the connection.
        let parsed: Vec<(usize, std::result::Result<DdlStatement, DdlError>)> = entries
            .par_iter()
            .enumerate()
            .filter(|(_, e)| matches!(e.object_type.as_str(), "table" | "index" | "trigger"))
            .filter_map(|(i, e)| e.sql.as_deref().map(|sql| (i, parse_ddl(&e.name, sql))))
            .collect();

        let mut assembled = Assembled {
            tables: Vec::new(),
            views: entries
                .iter()
                .filter(|e| e.object_type == "view")
                .map(|e| e.name.clone())
                .collect(),
            detached_triggers: Vec::new(),
            failures: Vec::new(),
        };
        let mut indexes = Vec::new();
        let mut triggers = Vec::new();

        for (i, result) in parsed {
            let entry = &entries[i];
            let built = result.map_err(SqliteError::from).and_then(|statement| match statement {
                DdlStatement::Table(def) => {
                    let table = self.build_table_entry(entry, &def)?;
                    assembled.tables.push(table);
                    Ok(())
                }
                DdlStatement::Index(def) => {
                    indexes.push(build_index(schema, &def)?);
                    Ok(())
                }
                DdlStatement::Trigger(def) => {
                    triggers.push(build_trigger(schema, &def)?);
                    Ok(())
                }
            });
            if let Err(error) = built {
                warn!(
                    object_type = %entry.object_type,
                    object = %entry.name,
                    error = %error,
                    "Skipping object whose DDL could not be read"
                );
                assembled.failures.push((entry.clone(), error));
            }
        }

        for index in indexes {
            let table_name = index.table.local_name();
            match assembled
                .tables
                .iter_mut()
                .find(|t| t.name.local_name().eq_ignore_ascii_case(table_name))
            {
                Some(table) => table.indexes.push(index),
                None => debug!(index = %index.name, table = table_name, "Dropping index of unavailable table"),
            }
        }

        for trigger in triggers {
            let table_name = trigger.table.local_name();
            match assembled
                .tables
                .iter_mut()
                .find(|t| t.name.local_name().eq_ignore_ascii_case(table_name))
            {
                Some(table) => table.triggers.push(trigger),
                None => assembled.detached_triggers.push(trigger),
            }
        }

        let comparer = Dialect::Sqlite.comparer();
        for table in &assembled.tables {
            for problem in validate_table(table, comparer) {
                warn!(table = %table.name, problem = %problem, "Table failed validation");
            }
        }

        assembled
    }

    /// Reads every table, index and trigger of the configured database.
    ///
    /// # Errors
    ///
    /// Only database failures are returned; DDL that cannot be parsed is
    /// reported in [`CatalogSnapshot::errors`].
    pub fn snapshot(&self) -> Result<CatalogSnapshot> {
        let entries = self.master_entries()?;
        debug!(schema = %self.options.schema, objects = entries.len(), "Reading catalog");
        let assembled = self.assemble(entries);

        Ok(CatalogSnapshot {
            schema: self.options.schema.clone(),
            tables: assembled.tables,
            views: assembled.views,
            detached_triggers: assembled.detached_triggers,
            errors: assembled
                .failures
                .iter()
                .map(|(entry, error)| ObjectError::new(entry, error))
                .collect(),
        })
    }

    /// Reads one table, matched case-insensitively, with its indexes and
    /// triggers.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::ObjectNotFound`] if there is no such table and
    /// [`SqliteError::Ddl`] if its DDL cannot be parsed. Unreadable indexes
    /// and triggers are logged and skipped.
    pub fn table(&self, name: &str) -> Result<Table> {
        let entries: Vec<MasterEntry> = self
            .master_entries()?
            .into_iter()
            .filter(|e| e.table_name.eq_ignore_ascii_case(name))
            .collect();
        if !entries.iter().any(|e| e.object_type == "table") {
            return Err(SqliteError::ObjectNotFound(name.to_string()));
        }

        let mut assembled = self.assemble(entries);
        if let Some(position) = assembled
            .failures
            .iter()
            .position(|(entry, _)| entry.object_type == "table")
        {
            return Err(assembled.failures.swap_remove(position).1);
        }
        assembled
            .tables
            .pop()
            .ok_or_else(|| SqliteError::ObjectNotFound(name.to_string()))
    }

    /// `true` if a table with exactly this name exists.
    fn table_exists(&self, candidate: &Identifier) -> Result<bool> {
        let schema = candidate.schema().unwrap_or(&self.options.schema);
        let found = self
            .conn
            .query_row(
                &format!(
                    "SELECT 1 FROM {} WHERE type = 'table' AND name = ?1",
                    self.master_table(schema)
                ),
                params![candidate.local_name()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Resolves a user-supplied table name to the name stored in the
    /// catalog, trying candidates in SQLite's resolution order.
    ///
    /// Each candidate is checked with an exact, case-sensitive lookup; a
    /// lookup that fails is treated as no match.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::Resolve`] if `cancel` fires first.
    pub async fn resolve_table(
        &self,
        name: &Identifier,
        cancel: &CancellationToken,
    ) -> Result<Option<Identifier>> {
        let defaults = IdentifierDefaults::new().with_schema(self.options.schema.clone());
        let strategy = Dialect::Sqlite.resolution_strategy();
        let resolved = resolve(
            name,
            &defaults,
            strategy.as_ref(),
            |candidate| {
                let found = match self.table_exists(&candidate) {
                    Ok(true) => Some(()),
                    Ok(false) => None,
                    Err(error) => {
                        debug!(candidate = %candidate, error = %error, "Probe failed");
                        None
                    }
                };
                async move { found }
            },
            cancel,
        )
        .await?;
        Ok(resolved)
    }
}

fn is_system_name(name: &str) -> bool {
    name.get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("sqlite_"))
}

/// Double-quotes an identifier for interpolation into SQL.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("main"), "\"main\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_system_names() {
        assert!(is_system_name("sqlite_sequence"));
        assert!(is_system_name("SQLITE_autoindex_t_1"));
        assert!(!is_system_name("sqlite"));
        assert!(!is_system_name("users"));
    }

    #[test]
    fn test_options_builders() {
        let options = CatalogOptions::default()
            .with_schema("aux")
            .include_system_objects(true)
            .with_exclude(["Audit"]);
        assert_eq!(options.schema, "aux");
        assert!(options.include_system_objects);
        assert!(options.is_excluded("audit"));
        assert!(!options.is_excluded("users"));
    }

    #[test]
    fn test_master_entries_filtering() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE a (id INTEGER PRIMARY KEY AUTOINCREMENT);
             CREATE TABLE b (x);
             CREATE INDEX ix_b ON b (x);
             CREATE VIEW v AS SELECT * FROM a;",
        )
        .unwrap();

        let names = |catalog: &SqliteCatalog<'_>| -> Vec<String> {
            catalog
                .master_entries()
                .unwrap()
                .into_iter()
                .map(|e| e.name)
                .collect()
        };

        let catalog = SqliteCatalog::new(&conn);
        assert_eq!(names(&catalog), vec!["a", "b", "v", "ix_b"]);

        let catalog = SqliteCatalog::with_options(
            &conn,
            CatalogOptions::default().include_system_objects(true).with_exclude(["B"]),
        );
        assert_eq!(names(&catalog), vec!["a", "sqlite_sequence", "v"]);
    }
}
