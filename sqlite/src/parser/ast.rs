//! Syntax trees for parsed DDL statements.
//!
//! Every tree is built from one DDL string and owns its data, so it can
//! outlive the source text and cross threads freely.

use db_schema_core::{
    Affinity, ColumnType, ForeignKeyAction, GeneratedColumn, IndexColumn, TriggerEvent,
    TriggerTiming,
};
use serde::{Deserialize, Serialize};

/// A parsed `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
    pub temporary: bool,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDef>,
    pub constraints: Vec<TableConstraint>,
    pub without_rowid: bool,
    pub strict: bool,
}

impl TableDef {
    /// Looks up a column by SQLite's case-insensitive name rule.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Columns of the primary key, whether declared on a column or on the
    /// table.
    pub fn primary_key(&self) -> Option<&[String]> {
        self.constraints.iter().find_map(|c| match c {
            TableConstraint::PrimaryKey { columns, .. } => Some(columns.as_slice()),
            _ => None,
        })
    }
}

/// One column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// Type name as written, with any size arguments appended as `(n,m)`.
    pub declared_type: String,
    pub affinity: Affinity,
    pub column_type: ColumnType,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<GeneratedColumn>,
    pub autoincrement: bool,
    pub primary_key: bool,
    #[serde(default)]
    pub hidden: bool,
}

/// A table-level constraint. Column-level keys, references and checks are
/// recorded here too, as single-column constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableConstraint {
    PrimaryKey {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        columns: Vec<String>,
        autoincrement: bool,
    },
    Unique {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        columns: Vec<String>,
    },
    ForeignKey {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        columns: Vec<String>,
        target_table: String,
        /// Empty when the parent's primary key is implied.
        target_columns: Vec<String>,
        on_delete: ForeignKeyAction,
        on_update: ForeignKeyAction,
    },
    Check {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        expression: String,
    },
}

/// A parsed `CREATE INDEX` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
    pub table: String,
    pub unique: bool,
    pub if_not_exists: bool,
    pub columns: Vec<IndexColumn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
}

/// A parsed `CREATE TRIGGER` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
    pub temporary: bool,
    pub if_not_exists: bool,
    pub table: String,
    pub timing: TriggerTiming,
    pub event: TriggerEvent,
    /// Columns listed in `UPDATE OF`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update_columns: Vec<String>,
    pub for_each_row: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    /// Statements between `BEGIN` and `END`.
    pub body: String,
}

/// Any parsed DDL statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "definition", rename_all = "snake_case")]
pub enum DdlStatement {
    Table(TableDef),
    Index(IndexDef),
    Trigger(TriggerDef),
}

impl DdlStatement {
    pub fn name(&self) -> &str {
        match self {
            DdlStatement::Table(def) => &def.name,
            DdlStatement::Index(def) => &def.name,
            DdlStatement::Trigger(def) => &def.name,
        }
    }
}
