//! Error types for SQLite DDL parsing and catalog reading.
//!
//! DDL errors come in three kinds, each carrying the object name and the
//! raw SQL so a failed object can be diagnosed without re-reading the
//! catalog:
//!
//! - [`TokenizationError`]: malformed lexical input, wrapped in
//!   [`DdlError::Tokenize`];
//! - [`DdlParseError`]: tokens that match no grammar production;
//! - [`UnsupportedConstructError`]: recognised grammar this crate cannot
//!   model.
//!
//! Catalog-level failures use [`SqliteError`].

use std::fmt;

use db_schema_core::{IdentifierError, ResolveError};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

/// What went wrong while tokenizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizationErrorReason {
    UnterminatedString,
    UnterminatedQuotedIdentifier,
    UnterminatedComment,
    UnexpectedCharacter(char),
}

impl fmt::Display for TokenizationErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedString => f.write_str("unterminated string literal"),
            Self::UnterminatedQuotedIdentifier => f.write_str("unterminated quoted identifier"),
            Self::UnterminatedComment => f.write_str("unterminated block comment"),
            Self::UnexpectedCharacter(c) => write!(f, "unexpected character {c:?}"),
        }
    }
}

/// Malformed lexical input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} at byte {position}")]
pub struct TokenizationError {
    /// Byte offset where the offending token starts.
    pub position: usize,
    pub reason: TokenizationErrorReason,
}

/// A token sequence that does not match the statement's grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to parse DDL of '{object_name}' at byte {position}: {message}")]
pub struct DdlParseError {
    pub object_name: String,
    pub raw_sql: String,
    pub message: String,
    pub position: usize,
}

/// Recognised DDL that cannot be modelled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported construct in DDL of '{object_name}': {message}")]
pub struct UnsupportedConstructError {
    pub object_name: String,
    pub raw_sql: String,
    pub message: String,
}

/// Any failure to turn one object's DDL into an AST.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DdlError {
    #[error("failed to tokenize DDL of '{object_name}': {source}")]
    Tokenize {
        object_name: String,
        raw_sql: String,
        #[source]
        source: TokenizationError,
    },

    #[error(transparent)]
    Parse(#[from] DdlParseError),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedConstructError),
}

impl DdlError {
    pub fn object_name(&self) -> &str {
        match self {
            DdlError::Tokenize { object_name, .. } => object_name,
            DdlError::Parse(e) => &e.object_name,
            DdlError::Unsupported(e) => &e.object_name,
        }
    }

    pub fn raw_sql(&self) -> &str {
        match self {
            DdlError::Tokenize { raw_sql, .. } => raw_sql,
            DdlError::Parse(e) => &e.raw_sql,
            DdlError::Unsupported(e) => &e.raw_sql,
        }
    }

    /// Byte offset of the failure, when one is known.
    pub fn position(&self) -> Option<usize> {
        match self {
            DdlError::Tokenize { source, .. } => Some(source.position),
            DdlError::Parse(e) => Some(e.position),
            DdlError::Unsupported(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DdlError::Tokenize { .. } => "tokenization",
            DdlError::Parse(_) => "syntax",
            DdlError::Unsupported(_) => "unsupported",
        }
    }
}

impl Serialize for DdlError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("DdlError", 5)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("object_name", self.object_name())?;
        s.serialize_field("message", &self.to_string())?;
        s.serialize_field("position", &self.position())?;
        s.serialize_field("raw_sql", self.raw_sql())?;
        s.end()
    }
}

/// Errors that can occur while reading a SQLite catalog.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// DDL of a requested object could not be parsed.
    #[error("DDL error: {0}")]
    Ddl(#[from] DdlError),

    /// A catalog name could not be turned into an identifier.
    #[error("identifier error: {0}")]
    Identifier(#[from] IdentifierError),

    /// Identifier resolution was cancelled.
    #[error("resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// The requested object does not exist.
    #[error("object not found: {0}")]
    ObjectNotFound(String),
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddl_error_accessors() {
        let err = DdlError::Tokenize {
            object_name: "t".into(),
            raw_sql: "CREATE TABLE t (a 'x)".into(),
            source: TokenizationError {
                position: 18,
                reason: TokenizationErrorReason::UnterminatedString,
            },
        };
        assert_eq!(err.object_name(), "t");
        assert_eq!(err.position(), Some(18));
        assert_eq!(err.kind(), "tokenization");
        assert!(err.to_string().contains("unterminated string literal at byte 18"));
    }

    #[test]
    fn test_ddl_error_serializes_message() {
        let err = DdlError::from(UnsupportedConstructError {
            object_name: "v".into(),
            raw_sql: "CREATE VIRTUAL TABLE v USING fts5(a)".into(),
            message: "virtual tables".into(),
        });
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "unsupported");
        assert_eq!(json["object_name"], "v");
        assert!(json["position"].is_null());
    }
}
