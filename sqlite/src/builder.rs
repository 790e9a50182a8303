//! Turns parsed DDL and pragma rows into the shared object model.
//!
//! SQLite describes a table twice: `pragma_table_xinfo` reports what the
//! engine actually created, and the stored DDL carries everything else.
//! When both are available the pragma rows decide which columns exist,
//! their order, declared type, nullability and primary-key position; the
//! DDL supplies default text, collation, generated expressions,
//! `AUTOINCREMENT` and foreign-key actions. Without pragma rows the DDL
//! alone is used.

use db_schema_core::{
    CheckConstraint, Column, ForeignKey, Identifier, Index, IndexColumn, IndexOrigin,
    PrimaryKey, SortOrder, Table, Trigger, UniqueKey,
};
use serde::Serialize;

use crate::affinity::resolve_type;
use crate::error::Result;
use crate::parser::{ColumnDef, IndexDef, TableConstraint, TableDef, TriggerDef};

/// One row of `pragma_table_xinfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PragmaColumn {
    pub cid: i64,
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    /// One-based position in the primary key, zero if not a key column.
    pub pk: u32,
    /// 0 normal, 1 hidden virtual-table column, 2 virtual generated,
    /// 3 stored generated.
    pub hidden: i64,
}

/// One row of `pragma_index_xinfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PragmaIndexColumn {
    pub seqno: i64,
    /// Table column number; -1 for the rowid, -2 for an expression.
    pub cid: i64,
    pub name: Option<String>,
    pub descending: bool,
    pub collation: Option<String>,
    pub key: bool,
}

fn qualified(schema: Option<&str>, default_schema: &str, name: &str) -> Result<Identifier> {
    Ok(Identifier::new(name)?.with_schema(schema.unwrap_or(default_schema)))
}

fn column_from_def(def: &ColumnDef) -> Column {
    let mut column = Column::new(&def.name, def.column_type.clone()).with_affinity(def.affinity);
    column.nullable = def.nullable;
    column.default = def.default.clone();
    column.collation = def.collation.clone();
    column.generated = def.generated.clone();
    column.autoincrement = def.autoincrement;
    column.hidden = def.hidden;
    column
}

fn column_from_pragma(row: &PragmaColumn, def: Option<&ColumnDef>) -> Column {
    let resolved = resolve_type(&row.declared_type);
    let mut column =
        Column::new(&row.name, resolved.column_type).with_affinity(resolved.affinity);
    column.nullable = !row.not_null;
    column.hidden = row.hidden == 1;
    column.default = def
        .and_then(|d| d.default.clone())
        .or_else(|| row.default.clone());
    if let Some(def) = def {
        column.collation = def.collation.clone();
        column.generated = def.generated.clone();
        column.autoincrement = def.autoincrement;
    }
    column
}

/// Builds a [`Table`] from its parsed definition and, when available, its
/// pragma rows. `schema` qualifies names the DDL leaves unqualified.
///
/// Indexes and triggers are attached separately.
///
/// # Errors
///
/// Returns an identifier error if a table or foreign-key target name is
/// empty.
pub fn build_table(schema: &str, def: &TableDef, pragma: &[PragmaColumn]) -> Result<Table> {
    let table_schema = def.schema.as_deref().unwrap_or(schema);
    let mut table = Table::new(qualified(def.schema.as_deref(), schema, &def.name)?);
    table.without_rowid = def.without_rowid;
    table.strict = def.strict;

    if pragma.is_empty() {
        for column in &def.columns {
            table = table.with_column(column_from_def(column));
        }
    } else {
        let mut rows: Vec<&PragmaColumn> = pragma.iter().collect();
        rows.sort_by_key(|row| row.cid);
        for row in rows {
            table = table.with_column(column_from_pragma(row, def.column(&row.name)));
        }
    }

    let pk_name = def.constraints.iter().find_map(|c| match c {
        TableConstraint::PrimaryKey { name, .. } => Some(name.clone()),
        _ => None,
    });
    let mut pk_rows: Vec<&PragmaColumn> = pragma.iter().filter(|row| row.pk > 0).collect();
    pk_rows.sort_by_key(|row| row.pk);
    if !pk_rows.is_empty() {
        table = table.with_primary_key(PrimaryKey {
            name: pk_name.flatten(),
            columns: pk_rows.iter().map(|row| row.name.clone()).collect(),
        });
    } else if let Some(columns) = def.primary_key() {
        table = table.with_primary_key(PrimaryKey {
            name: pk_name.flatten(),
            columns: columns.to_vec(),
        });
    }

    for constraint in &def.constraints {
        match constraint {
            TableConstraint::PrimaryKey { .. } => {}
            TableConstraint::Unique { name, columns } => {
                table = table.with_unique_key(UniqueKey {
                    name: name.clone(),
                    columns: columns.clone(),
                });
            }
            TableConstraint::ForeignKey {
                name,
                columns,
                target_table,
                target_columns,
                on_delete,
                on_update,
            } => {
                table = table.with_foreign_key(ForeignKey {
                    name: name.clone(),
                    columns: columns.clone(),
                    target_table: qualified(None, table_schema, target_table)?,
                    target_columns: target_columns.clone(),
                    on_delete: *on_delete,
                    on_update: *on_update,
                });
            }
            TableConstraint::Check { name, expression } => {
                table = table.with_check(CheckConstraint {
                    name: name.clone(),
                    expression: expression.clone(),
                });
            }
        }
    }

    Ok(table)
}

/// Builds an [`Index`] from a parsed `CREATE INDEX`.
pub fn build_index(schema: &str, def: &IndexDef) -> Result<Index> {
    let mut index = Index::new(
        qualified(def.schema.as_deref(), schema, &def.name)?,
        qualified(def.schema.as_deref(), schema, &def.table)?,
        def.columns.clone(),
    );
    if def.unique {
        index = index.unique();
    }
    if let Some(predicate) = &def.predicate {
        index = index.with_predicate(predicate.clone());
    }
    Ok(index)
}

/// Builds an [`Index`] SQLite created on its own for a `UNIQUE` or
/// `PRIMARY KEY` constraint. Such indexes have no DDL; their columns come
/// from `pragma_index_xinfo`, key columns first.
pub fn build_auto_index(
    schema: &str,
    table: &str,
    name: &str,
    unique: bool,
    origin: IndexOrigin,
    columns: &[PragmaIndexColumn],
) -> Result<Index> {
    let mut rows: Vec<&PragmaIndexColumn> = columns.iter().collect();
    rows.sort_by_key(|row| (!row.key, row.seqno));

    let index_columns: Vec<IndexColumn> = rows
        .iter()
        .map(|row| {
            let mut column = match (&row.name, row.cid) {
                (Some(name), _) => IndexColumn::column(name),
                (None, -1) => IndexColumn::column("rowid"),
                (None, _) => IndexColumn::expression("<expression>"),
            };
            if let Some(collation) = row.collation.as_deref() {
                if !collation.eq_ignore_ascii_case("BINARY") {
                    column = column.with_collation(collation);
                }
            }
            if row.descending {
                column.order = SortOrder::Descending;
            }
            column
        })
        .collect();

    let mut index = Index::new(
        qualified(None, schema, name)?,
        qualified(None, schema, table)?,
        index_columns,
    )
    .with_origin(origin);
    if unique {
        index = index.unique();
    }
    index.key_column_count = rows.iter().filter(|row| row.key).count();
    Ok(index)
}

/// Builds a [`Trigger`] from a parsed `CREATE TRIGGER`.
pub fn build_trigger(schema: &str, def: &TriggerDef) -> Result<Trigger> {
    Ok(Trigger {
        name: qualified(def.schema.as_deref(), schema, &def.name)?,
        table: qualified(def.schema.as_deref(), schema, &def.table)?,
        timing: def.timing,
        event: def.event,
        update_columns: def.update_columns.clone(),
        when: def.when.clone(),
        body: def.body.clone(),
    })
}
