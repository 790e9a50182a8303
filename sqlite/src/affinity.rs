//! Declared type name to affinity and data type.
//!
//! SQLite stores whatever type name a column was declared with and derives
//! its storage behaviour from substrings of that name. [`affinity_of`]
//! applies SQLite's rules; [`resolve_type`] additionally picks a
//! [`DataType`] and extracts length, precision and scale from a trailing
//! argument list.
//!
//! # Examples
//!
//! ```
//! use db_schema_core::{Affinity, DataType, TypeDimension};
//! use db_schema_sqlite::resolve_type;
//!
//! let resolved = resolve_type("VARCHAR(255)");
//! assert_eq!(resolved.affinity, Affinity::Text);
//! assert_eq!(resolved.column_type.data_type, DataType::VarChar);
//! assert_eq!(resolved.column_type.length, TypeDimension::Specified(255));
//!
//! let resolved = resolve_type("NUMERIC(10,2)");
//! assert_eq!(resolved.affinity, Affinity::Numeric);
//! assert_eq!(resolved.column_type.precision, TypeDimension::Specified(10));
//! assert_eq!(resolved.column_type.scale, TypeDimension::Specified(2));
//! ```

use std::sync::LazyLock;

use db_schema_core::{Affinity, ColumnType, DataType};
use regex::Regex;
use serde::Serialize;

static TYPE_ARGS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(.*?)\s*\(\s*([^()]*?)\s*\)\s*$").expect("static regex must compile")
});

/// Affinity and data type of one declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedType {
    pub affinity: Affinity,
    pub column_type: ColumnType,
}

/// Applies SQLite's affinity rules to a declared type name.
///
/// Rules are checked in order: `INT` gives Integer; `CHAR`, `CLOB` or
/// `TEXT` give Text; `BLOB` or no type gives Blob; `REAL`, `FLOA` or
/// `DOUB` give Real; anything else is Numeric.
pub fn affinity_of(declared: &str) -> Affinity {
    let upper = declared.to_ascii_uppercase();
    if upper.contains("INT") {
        Affinity::Integer
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        Affinity::Text
    } else if upper.contains("BLOB") || upper.trim().is_empty() {
        Affinity::Blob
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        Affinity::Real
    } else {
        Affinity::Numeric
    }
}

/// Resolves a declared type into its affinity and [`ColumnType`].
///
/// Missing or non-numeric size arguments leave the corresponding
/// dimension [`Unspecified`](db_schema_core::TypeDimension::Unspecified).
pub fn resolve_type(declared: &str) -> ResolvedType {
    let affinity = affinity_of(declared);

    let (base, args) = match TYPE_ARGS_RE.captures(declared) {
        Some(caps) => {
            let args: Vec<Option<u32>> = caps[2]
                .split(',')
                .map(|arg| arg.trim().trim_start_matches('+').parse().ok())
                .collect();
            (normalize(&caps[1]), args)
        }
        None => (normalize(declared), Vec::new()),
    };

    let data_type = data_type_of(&base, affinity);
    let mut column_type = ColumnType::new(declared, data_type);
    match args.as_slice() {
        [Some(length), ..] if data_type.is_sized_by_length() => {
            column_type = column_type.with_length(*length);
        }
        [Some(precision)] => column_type = column_type.with_precision(*precision, None),
        [Some(precision), scale, ..] => column_type = column_type.with_precision(*precision, *scale),
        _ => {}
    }

    ResolvedType {
        affinity,
        column_type,
    }
}

/// Uppercases and collapses internal whitespace.
fn normalize(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_ascii_uppercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn data_type_of(base: &str, affinity: Affinity) -> DataType {
    match base {
        "BOOLEAN" | "BOOL" => return DataType::Boolean,
        "TINYINT" => return DataType::TinyInt,
        "SMALLINT" | "INT2" => return DataType::SmallInt,
        "INTEGER" | "INT" | "MEDIUMINT" | "INT4" => return DataType::Integer,
        "BIGINT" | "INT8" | "UNSIGNED BIG INT" => return DataType::BigInt,
        "DECIMAL" => return DataType::Decimal,
        "NUMERIC" => return DataType::Numeric,
        "REAL" => return DataType::Real,
        "FLOAT" => return DataType::Float,
        "DOUBLE" | "DOUBLE PRECISION" => return DataType::Double,
        "CHAR" | "CHARACTER" => return DataType::Char,
        "VARCHAR" | "VARYING CHARACTER" | "CHARACTER VARYING" => return DataType::VarChar,
        "NCHAR" | "NATIVE CHARACTER" => return DataType::NChar,
        "NVARCHAR" => return DataType::NVarChar,
        "TEXT" => return DataType::Text,
        "CLOB" => return DataType::Clob,
        "BLOB" | "" => return DataType::Blob,
        "BINARY" => return DataType::Binary,
        "VARBINARY" => return DataType::VarBinary,
        "DATE" => return DataType::Date,
        "TIME" => return DataType::Time,
        "DATETIME" => return DataType::DateTime,
        "TIMESTAMP" => return DataType::Timestamp,
        "UUID" | "GUID" | "UNIQUEIDENTIFIER" => return DataType::Uuid,
        "JSON" | "JSONB" => return DataType::Json,
        _ => {}
    }

    // Order matters: longer names shadow the shorter names they contain.
    const SUBSTRINGS: &[(&str, DataType)] = &[
        ("BOOL", DataType::Boolean),
        ("TIMESTAMP", DataType::Timestamp),
        ("DATETIME", DataType::DateTime),
        ("DATE", DataType::Date),
        ("TIME", DataType::Time),
        ("UUID", DataType::Uuid),
        ("GUID", DataType::Uuid),
        ("JSON", DataType::Json),
        ("VARBINARY", DataType::VarBinary),
        ("BINARY", DataType::Binary),
        ("BIGINT", DataType::BigInt),
        ("SMALLINT", DataType::SmallInt),
        ("TINYINT", DataType::TinyInt),
        ("NVARCHAR", DataType::NVarChar),
        ("VARCHAR", DataType::VarChar),
        ("NCHAR", DataType::NChar),
        ("CHAR", DataType::Char),
        ("CLOB", DataType::Clob),
        ("DECIMAL", DataType::Decimal),
        ("DOUB", DataType::Double),
        ("FLOA", DataType::Float),
    ];
    if let Some((_, data_type)) = SUBSTRINGS.iter().find(|(needle, _)| base.contains(needle)) {
        return *data_type;
    }

    match affinity {
        Affinity::Integer => DataType::Integer,
        Affinity::Text => DataType::Text,
        Affinity::Blob => DataType::Blob,
        Affinity::Real => DataType::Real,
        Affinity::Numeric => DataType::Unknown,
    }
}
