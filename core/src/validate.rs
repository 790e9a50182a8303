//! Structural validation of built tables.
//!
//! Catches problems such as duplicate column names, keys naming columns
//! that do not exist, foreign keys whose two sides disagree in length and
//! indexes claiming more key columns than they have.
//!
//! # Examples
//!
//! ```
//! use db_schema_core::*;
//!
//! let table = Table::new(Identifier::new("t").unwrap())
//!     .with_column(Column::new("id", ColumnType::new("INTEGER", DataType::Integer)))
//!     .with_column(Column::new("ID", ColumnType::new("TEXT", DataType::Text)));
//!
//! // Duplicate under case-insensitive rules, fine under ordinal ones
//! assert!(!validate_table(&table, IdentifierComparer::IgnoreCase).is_empty());
//! assert!(validate_table(&table, IdentifierComparer::Ordinal).is_empty());
//! ```

use thiserror::Error;

use crate::{IdentifierComparer, Table};

/// Table validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The table has no columns.
    #[error("table {0} has no columns")]
    NoColumns(String),
    /// Two columns share a name under the dialect's comparison rule.
    #[error("duplicate column in table {table}: {column}")]
    DuplicateColumn { table: String, column: String },
    /// A key or index names a column the table does not have.
    #[error("{owner} references unknown column {column}")]
    UnknownColumn { owner: String, column: String },
    /// A key lists no columns.
    #[error("{0} has no columns")]
    EmptyKey(String),
    /// Foreign key column lists differ in length.
    #[error("foreign key on table {table} has {columns} columns but references {target_columns}")]
    ForeignKeyArity {
        table: String,
        columns: usize,
        target_columns: usize,
    },
    /// An index claims more key columns than it has columns.
    #[error("index {index} has {key_columns} key columns but only {columns} columns")]
    IndexKeyCount {
        index: String,
        key_columns: usize,
        columns: usize,
    },
}

/// Validates a table, returning every problem found.
pub fn validate_table(table: &Table, comparer: IdentifierComparer) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let table_name = table.name.to_string();

    if table.columns.is_empty() {
        errors.push(ValidationError::NoColumns(table_name));
        return errors;
    }

    for (i, column) in table.columns.iter().enumerate() {
        if table.columns[..i]
            .iter()
            .any(|prev| comparer.eq_str(&prev.name, &column.name))
        {
            errors.push(ValidationError::DuplicateColumn {
                table: table_name.clone(),
                column: column.name.clone(),
            });
        }
    }

    if let Some(pk) = &table.primary_key {
        check_key_columns(table, comparer, "primary key", &pk.columns, &mut errors);
    }
    for key in &table.unique_keys {
        check_key_columns(table, comparer, "unique key", &key.columns, &mut errors);
    }
    for fk in &table.foreign_keys {
        check_key_columns(table, comparer, "foreign key", &fk.columns, &mut errors);
        if !fk.target_columns.is_empty() && fk.target_columns.len() != fk.columns.len() {
            errors.push(ValidationError::ForeignKeyArity {
                table: table_name.clone(),
                columns: fk.columns.len(),
                target_columns: fk.target_columns.len(),
            });
        }
    }

    for index in &table.indexes {
        let owner = format!("index {}", index.name);
        if index.key_column_count > index.columns.len() {
            errors.push(ValidationError::IndexKeyCount {
                index: index.name.to_string(),
                key_columns: index.key_column_count,
                columns: index.columns.len(),
            });
        }
        for column in index.key_columns().iter().filter(|c| !c.is_expression) {
            if table.find_column(&column.expression, comparer).is_none() {
                errors.push(ValidationError::UnknownColumn {
                    owner: owner.clone(),
                    column: column.expression.clone(),
                });
            }
        }
    }

    errors
}

fn check_key_columns(
    table: &Table,
    comparer: IdentifierComparer,
    owner: &str,
    columns: &[String],
    errors: &mut Vec<ValidationError>,
) {
    if columns.is_empty() {
        errors.push(ValidationError::EmptyKey(format!("{owner} on {}", table.name)));
        return;
    }
    for column in columns {
        if table.find_column(column, comparer).is_none() {
            errors.push(ValidationError::UnknownColumn {
                owner: format!("{owner} on {}", table.name),
                column: column.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Column, ColumnType, DataType, ForeignKey, ForeignKeyAction, Identifier, Index,
        IndexColumn, PrimaryKey,
    };

    fn base_table() -> Table {
        Table::new(Identifier::new("orders").unwrap())
            .with_column(Column::new("id", ColumnType::new("INTEGER", DataType::Integer)))
            .with_column(Column::new("customer_id", ColumnType::new("INTEGER", DataType::Integer)))
    }

    #[test]
    fn test_valid_table() {
        let table = base_table().with_primary_key(PrimaryKey {
            name: None,
            columns: vec!["ID".into()],
        });
        assert!(validate_table(&table, IdentifierComparer::IgnoreCase).is_empty());
    }

    #[test]
    fn test_no_columns() {
        let table = Table::new(Identifier::new("empty").unwrap());
        assert_eq!(
            validate_table(&table, IdentifierComparer::IgnoreCase),
            vec![ValidationError::NoColumns("empty".into())]
        );
    }

    #[test]
    fn test_unknown_primary_key_column() {
        let table = base_table().with_primary_key(PrimaryKey {
            name: None,
            columns: vec!["missing".into()],
        });
        let errors = validate_table(&table, IdentifierComparer::IgnoreCase);
        assert!(matches!(
            &errors[..],
            [ValidationError::UnknownColumn { column, .. }] if column == "missing"
        ));
    }

    #[test]
    fn test_foreign_key_arity() {
        let table = base_table().with_foreign_key(ForeignKey {
            name: None,
            columns: vec!["customer_id".into()],
            target_table: Identifier::new("customers").unwrap(),
            target_columns: vec!["id".into(), "region".into()],
            on_delete: ForeignKeyAction::Cascade,
            on_update: ForeignKeyAction::NoAction,
        });
        let errors = validate_table(&table, IdentifierComparer::IgnoreCase);
        assert_eq!(
            errors,
            vec![ValidationError::ForeignKeyArity {
                table: "orders".into(),
                columns: 1,
                target_columns: 2,
            }]
        );
    }

    #[test]
    fn test_foreign_key_to_primary_key_has_no_target_columns() {
        let table = base_table().with_foreign_key(ForeignKey {
            name: None,
            columns: vec!["customer_id".into()],
            target_table: Identifier::new("customers").unwrap(),
            target_columns: Vec::new(),
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        });
        assert!(validate_table(&table, IdentifierComparer::IgnoreCase).is_empty());
    }

    #[test]
    fn test_index_key_count_exceeds_columns() {
        let mut table = base_table();
        let mut index = Index::new(
            Identifier::new("ix").unwrap(),
            Identifier::new("orders").unwrap(),
            vec![IndexColumn::column("id")],
        );
        index.key_column_count = 2;
        table.indexes.push(index);

        let errors = validate_table(&table, IdentifierComparer::IgnoreCase);
        assert!(errors.contains(&ValidationError::IndexKeyCount {
            index: "ix".into(),
            key_columns: 2,
            columns: 1,
        }));
    }

    #[test]
    fn test_expression_index_columns_are_not_checked() {
        let mut table = base_table();
        table.indexes.push(Index::new(
            Identifier::new("ix_expr").unwrap(),
            Identifier::new("orders").unwrap(),
            vec![IndexColumn::expression("id + customer_id")],
        ));
        assert!(validate_table(&table, IdentifierComparer::IgnoreCase).is_empty());
    }
}
