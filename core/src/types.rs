//! Schema object model shared by every dialect.
//!
//! These are the finished objects handed to reporting, diagramming and code
//! generation: tables with their columns, keys, checks, indexes and
//! triggers. Backends build them through the constructors and `with_*`
//! methods below; [`validate_table`](crate::validate_table) checks the
//! structural invariants afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identifier::{Identifier, IdentifierComparer};

/// Coarse storage class derived from a declared column type (SQLite-style
/// type affinity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Affinity {
    /// Declared type contains `INT`.
    Integer,
    /// Declared type contains `CHAR`, `CLOB` or `TEXT`.
    Text,
    /// Declared type contains `BLOB`, or no type was declared.
    Blob,
    /// Declared type contains `REAL`, `FLOA` or `DOUB`.
    Real,
    /// Anything else, including `NUMERIC`, `DECIMAL` and `BOOLEAN`.
    Numeric,
}

impl fmt::Display for Affinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Affinity::Integer => "INTEGER",
            Affinity::Text => "TEXT",
            Affinity::Blob => "BLOB",
            Affinity::Real => "REAL",
            Affinity::Numeric => "NUMERIC",
        })
    }
}

/// Semantic data type of a column.
///
/// Derived from the declared type name independently of [`Affinity`]:
/// `BOOLEAN` has Numeric affinity but data type `Boolean`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Decimal,
    Numeric,
    Real,
    Float,
    Double,
    Char,
    VarChar,
    NChar,
    NVarChar,
    Text,
    Clob,
    Blob,
    Binary,
    VarBinary,
    Date,
    Time,
    DateTime,
    Timestamp,
    Uuid,
    Json,
    /// Declared type matches no known name.
    Unknown,
}

impl DataType {
    /// Types whose single size argument is a length rather than a precision.
    pub fn is_sized_by_length(self) -> bool {
        matches!(
            self,
            DataType::Char
                | DataType::VarChar
                | DataType::NChar
                | DataType::NVarChar
                | DataType::Text
                | DataType::Clob
                | DataType::Blob
                | DataType::Binary
                | DataType::VarBinary
        )
    }
}

/// A length, precision or scale that may or may not have been declared.
///
/// `Unspecified` is distinct from `Specified(0)`: `VARCHAR` and
/// `VARCHAR(0)` are different declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TypeDimension {
    /// No argument was written.
    #[default]
    Unspecified,
    /// The argument as written.
    Specified(u32),
}

impl TypeDimension {
    /// The declared value, if any.
    pub fn value(self) -> Option<u32> {
        match self {
            TypeDimension::Unspecified => None,
            TypeDimension::Specified(v) => Some(v),
        }
    }
}

/// A declared column type and what it means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnType {
    /// Declared type text exactly as written (e.g. `"VARCHAR(50)"`).
    pub declared: String,
    /// Semantic type derived from the declared name.
    pub data_type: DataType,
    /// Size argument of character and binary types.
    pub length: TypeDimension,
    /// First size argument of numeric and temporal types.
    pub precision: TypeDimension,
    /// Second size argument of numeric types.
    pub scale: TypeDimension,
}

impl ColumnType {
    /// A type with no size arguments.
    pub fn new(declared: impl Into<String>, data_type: DataType) -> Self {
        Self {
            declared: declared.into(),
            data_type,
            length: TypeDimension::Unspecified,
            precision: TypeDimension::Unspecified,
            scale: TypeDimension::Unspecified,
        }
    }

    /// Sets the declared length.
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = TypeDimension::Specified(length);
        self
    }

    /// Sets the declared precision and, when given, the scale.
    pub fn with_precision(mut self, precision: u32, scale: Option<u32>) -> Self {
        self.precision = TypeDimension::Specified(precision);
        if let Some(scale) = scale {
            self.scale = TypeDimension::Specified(scale);
        }
        self
    }
}

/// Whether a generated column is computed on write or on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GeneratedKind {
    /// Computed when the row is written and stored with it.
    Stored,
    /// Computed each time the column is read.
    #[default]
    Virtual,
}

/// Expression backing a generated column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedColumn {
    /// Expression source text, without the surrounding parentheses.
    pub expression: String,
    pub kind: GeneratedKind,
}

/// A table column.
///
/// # Examples
///
/// ```
/// use db_schema_core::{Column, ColumnType, DataType};
///
/// let column = Column::new("name", ColumnType::new("VARCHAR(50)", DataType::VarChar).with_length(50))
///     .not_null()
///     .with_default("'x'");
/// assert!(!column.nullable);
/// assert_eq!(column.default.as_deref(), Some("'x'"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as stored in the catalog.
    pub name: String,
    /// Zero-based position in the table.
    pub ordinal: usize,
    /// Declared type, resolved.
    pub column_type: ColumnType,
    /// Storage affinity, for dialects that have one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,
    /// `false` when the column is declared `NOT NULL`.
    pub nullable: bool,
    /// Default expression, as opaque source text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Collating sequence named by `COLLATE`; `None` means the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// Set for `GENERATED ALWAYS AS (...)` columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<GeneratedColumn>,
    /// Values come from a monotonically increasing key generator.
    pub autoincrement: bool,
    /// Hidden column of a virtual table.
    #[serde(default)]
    pub hidden: bool,
}

impl Column {
    /// A nullable column with no default, collation or generation rule.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            ordinal: 0,
            column_type,
            affinity: None,
            nullable: true,
            default: None,
            collation: None,
            generated: None,
            autoincrement: false,
            hidden: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_affinity(mut self, affinity: Affinity) -> Self {
        self.affinity = Some(affinity);
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }
}

/// Referential action of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ForeignKeyAction {
    /// Checked at statement end; the default.
    #[default]
    NoAction,
    /// Rejects the change immediately.
    Restrict,
    SetNull,
    SetDefault,
    /// Applies the parent change to the child rows.
    Cascade,
}

impl fmt::Display for ForeignKeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ForeignKeyAction::NoAction => "NO ACTION",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
            ForeignKeyAction::Cascade => "CASCADE",
        })
    }
}

/// The primary key of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    /// Constraint name, when one was given with `CONSTRAINT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Key columns in key order.
    pub columns: Vec<String>,
}

/// A `UNIQUE` constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueKey {
    /// Constraint name, when one was given with `CONSTRAINT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Columns that must be unique together.
    pub columns: Vec<String>,
}

/// A foreign key. An empty `target_columns` refers to the target table's
/// primary key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name, when one was given with `CONSTRAINT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Referencing columns of this table.
    pub columns: Vec<String>,
    /// Referenced table, qualified with this table's schema.
    pub target_table: Identifier,
    /// Referenced columns, paired with `columns` by position.
    pub target_columns: Vec<String>,
    /// Action when a referenced row is deleted.
    pub on_delete: ForeignKeyAction,
    /// Action when a referenced key is updated.
    pub on_update: ForeignKeyAction,
}

/// A `CHECK` constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConstraint {
    /// Constraint name, when one was given with `CONSTRAINT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Condition source text, without the surrounding parentheses.
    pub expression: String,
}

/// Sort direction of an index column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// One column (or expression) of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Column name, or the expression's source text.
    pub expression: String,
    /// `true` when `expression` is not a bare column name.
    pub is_expression: bool,
    /// Collating sequence named by `COLLATE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    pub order: SortOrder,
}

impl IndexColumn {
    /// An ascending index entry on a named column.
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            expression: name.into(),
            is_expression: false,
            collation: None,
            order: SortOrder::Ascending,
        }
    }

    /// An ascending index entry on an expression.
    pub fn expression(text: impl Into<String>) -> Self {
        Self {
            expression: text.into(),
            is_expression: true,
            collation: None,
            order: SortOrder::Ascending,
        }
    }

    pub fn descending(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    pub fn with_collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }
}

/// Why an index exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum IndexOrigin {
    /// Created by an explicit `CREATE INDEX`.
    #[default]
    CreateIndex,
    /// Backs a `UNIQUE` constraint.
    UniqueConstraint,
    /// Backs a `PRIMARY KEY` constraint.
    PrimaryKey,
}

/// An index on a table.
///
/// `columns` lists key columns first, followed by any auxiliary columns
/// the engine stores alongside them; `key_column_count` marks the split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    /// Index name, qualified with its schema.
    pub name: Identifier,
    /// Indexed table, qualified with its schema.
    pub table: Identifier,
    /// Rejects duplicate keys.
    pub unique: bool,
    /// Key columns, then auxiliary columns.
    pub columns: Vec<IndexColumn>,
    /// Number of leading entries of `columns` that form the key.
    pub key_column_count: usize,
    /// Partial-index predicate, as opaque source text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    /// Whether the index was declared or created for a constraint.
    pub origin: IndexOrigin,
}

impl Index {
    /// An index whose columns are all key columns.
    pub fn new(name: Identifier, table: Identifier, columns: Vec<IndexColumn>) -> Self {
        Self {
            name,
            table,
            unique: false,
            key_column_count: columns.len(),
            columns,
            predicate: None,
            origin: IndexOrigin::CreateIndex,
        }
    }

    /// Marks the index as unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    pub fn with_origin(mut self, origin: IndexOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Key columns only.
    pub fn key_columns(&self) -> &[IndexColumn] {
        &self.columns[..self.key_column_count.min(self.columns.len())]
    }
}

/// When a trigger fires relative to its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerTiming {
    Before,
    After,
    InsteadOf,
}

impl fmt::Display for TriggerTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriggerTiming::Before => "BEFORE",
            TriggerTiming::After => "AFTER",
            TriggerTiming::InsteadOf => "INSTEAD OF",
        })
    }
}

/// Statement kind that fires a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriggerEvent::Insert => "INSERT",
            TriggerEvent::Update => "UPDATE",
            TriggerEvent::Delete => "DELETE",
        })
    }
}

/// A trigger attached to a table or view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    /// Trigger name, qualified with its schema.
    pub name: Identifier,
    /// Table or view the trigger is attached to.
    pub table: Identifier,
    pub timing: TriggerTiming,
    pub event: TriggerEvent,
    /// Columns named in `UPDATE OF`; empty for any column.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update_columns: Vec<String>,
    /// `WHEN` condition source text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    /// Statements between `BEGIN` and `END`, as source text.
    pub body: String,
}

/// A table with everything hanging off it.
///
/// # Examples
///
/// ```
/// use db_schema_core::*;
///
/// let table = Table::new(Identifier::new("users").unwrap().with_schema("main"))
///     .with_column(Column::new("id", ColumnType::new("INTEGER", DataType::Integer)))
///     .with_column(Column::new("email", ColumnType::new("TEXT", DataType::Text)).not_null())
///     .with_primary_key(PrimaryKey { name: None, columns: vec!["id".into()] });
///
/// assert_eq!(table.columns[1].ordinal, 1);
/// assert!(table.find_column("EMAIL", IdentifierComparer::IgnoreCase).is_some());
/// assert!(validate_table(&table, IdentifierComparer::IgnoreCase).is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Table name, qualified with its schema.
    pub name: Identifier,
    /// Columns in declaration order; `ordinal` matches the position.
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKey>,
    #[serde(default)]
    pub unique_keys: Vec<UniqueKey>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default)]
    pub checks: Vec<CheckConstraint>,
    /// Declared indexes and indexes backing constraints.
    #[serde(default)]
    pub indexes: Vec<Index>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    /// SQLite `WITHOUT ROWID`: rows are stored in primary-key order.
    #[serde(default)]
    pub without_rowid: bool,
    /// SQLite `STRICT`: declared types are enforced.
    #[serde(default)]
    pub strict: bool,
}

impl Table {
    /// An empty table with no columns or constraints.
    pub fn new(name: Identifier) -> Self {
        Self {
            name,
            columns: Vec::new(),
            primary_key: None,
            unique_keys: Vec::new(),
            foreign_keys: Vec::new(),
            checks: Vec::new(),
            indexes: Vec::new(),
            triggers: Vec::new(),
            without_rowid: false,
            strict: false,
        }
    }

    /// Appends a column, assigning its ordinal.
    pub fn with_column(mut self, mut column: Column) -> Self {
        column.ordinal = self.columns.len();
        self.columns.push(column);
        self
    }

    pub fn with_primary_key(mut self, key: PrimaryKey) -> Self {
        self.primary_key = Some(key);
        self
    }

    pub fn with_unique_key(mut self, key: UniqueKey) -> Self {
        self.unique_keys.push(key);
        self
    }

    pub fn with_foreign_key(mut self, key: ForeignKey) -> Self {
        self.foreign_keys.push(key);
        self
    }

    pub fn with_check(mut self, check: CheckConstraint) -> Self {
        self.checks.push(check);
        self
    }

    /// Looks up a column by name under `comparer`.
    pub fn find_column(&self, name: &str, comparer: IdentifierComparer) -> Option<&Column> {
        self.columns.iter().find(|c| comparer.eq_str(&c.name, name))
    }

    /// Looks up an index by local name under `comparer`.
    pub fn find_index(&self, name: &str, comparer: IdentifierComparer) -> Option<&Index> {
        self.indexes
            .iter()
            .find(|i| comparer.eq_str(i.name.local_name(), name))
    }
}
