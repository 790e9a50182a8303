//! Recursive-descent parsers for SQLite `CREATE TABLE`, `CREATE INDEX` and
//! `CREATE TRIGGER` statements.
//!
//! Each entry point takes the object's name (used only in error reports)
//! and its DDL text, and returns an owned syntax tree. Expressions such as
//! defaults, checks, partial-index predicates and trigger bodies are kept
//! as opaque source text.
//!
//! # Examples
//!
//! ```
//! use db_schema_core::Affinity;
//! use db_schema_sqlite::{TableConstraint, parse_create_table};
//!
//! let table = parse_create_table(
//!     "t1",
//!     "CREATE TABLE t1 (id INTEGER PRIMARY KEY AUTOINCREMENT, name VARCHAR(50) NOT NULL DEFAULT 'x')",
//! )
//! .unwrap();
//!
//! assert_eq!(table.columns[0].affinity, Affinity::Integer);
//! assert!(table.columns[0].autoincrement);
//! assert_eq!(table.columns[1].default.as_deref(), Some("'x'"));
//! assert!(matches!(
//!     &table.constraints[0],
//!     TableConstraint::PrimaryKey { columns, .. } if columns == &["id"]
//! ));
//! ```

mod ast;
mod index;
mod table;
mod trigger;

pub use ast::{ColumnDef, DdlStatement, IndexDef, TableConstraint, TableDef, TriggerDef};

use tracing::debug;

use crate::error::{DdlError, DdlParseError, TokenizationError, UnsupportedConstructError};
use crate::tokenizer::{Token, TokenKind, tokenize};

/// Parses a `CREATE TABLE` statement.
///
/// # Errors
///
/// Returns [`DdlError`] when the text does not tokenize, does not match
/// the grammar, or uses `AS SELECT` or `VIRTUAL`.
pub fn parse_create_table(object_name: &str, sql: &str) -> Result<TableDef, DdlError> {
    let mut parser = Parser::new(object_name, sql)?;
    table::parse_table(&mut parser)
}

/// Parses a `CREATE INDEX` statement.
///
/// # Errors
///
/// Returns [`DdlError`] when the text does not tokenize or does not match
/// the grammar.
pub fn parse_create_index(object_name: &str, sql: &str) -> Result<IndexDef, DdlError> {
    let mut parser = Parser::new(object_name, sql)?;
    index::parse_index(&mut parser)
}

/// Parses a `CREATE TRIGGER` statement.
///
/// # Errors
///
/// Returns [`DdlError`]; a header without a recognisable timing or event
/// is an [`UnsupportedConstructError`].
pub fn parse_create_trigger(object_name: &str, sql: &str) -> Result<TriggerDef, DdlError> {
    let mut parser = Parser::new(object_name, sql)?;
    trigger::parse_trigger(&mut parser)
}

/// Parses any supported `CREATE` statement, dispatching on the object
/// kind named after `CREATE`.
///
/// # Errors
///
/// Views and virtual tables are [`UnsupportedConstructError`]s; anything
/// else that is not a table, index or trigger is a [`DdlParseError`].
pub fn parse_ddl(object_name: &str, sql: &str) -> Result<DdlStatement, DdlError> {
    let mut parser = Parser::new(object_name, sql)?;

    let mut offset = 0;
    if parser.peek_nth(offset).is_some_and(|t| t.is_keyword("CREATE")) {
        offset += 1;
    }
    while parser.peek_nth(offset).is_some_and(|t| {
        t.is_keyword("TEMP") || t.is_keyword("TEMPORARY") || t.is_keyword("UNIQUE")
    }) {
        offset += 1;
    }

    let kind = parser.peek_nth(offset);
    debug!(object = object_name, kind = ?kind.map(|t| t.text), "Dispatching DDL statement");
    match kind {
        Some(t) if t.is_keyword("TABLE") => table::parse_table(&mut parser).map(DdlStatement::Table),
        Some(t) if t.is_keyword("INDEX") => index::parse_index(&mut parser).map(DdlStatement::Index),
        Some(t) if t.is_keyword("TRIGGER") => {
            trigger::parse_trigger(&mut parser).map(DdlStatement::Trigger)
        }
        Some(t) if t.is_keyword("VIEW") => Err(parser.unsupported("views are not supported")),
        Some(t) if t.is_keyword("VIRTUAL") => {
            Err(parser.unsupported("virtual tables are not supported"))
        }
        _ => Err(parser.error("expected CREATE TABLE, CREATE INDEX or CREATE TRIGGER")),
    }
}

/// Splits a script into statements at top-level semicolons.
///
/// Semicolons inside a trigger's `BEGIN … END` block do not end the
/// statement. Returned slices exclude the terminating semicolon.
///
/// # Errors
///
/// Returns [`TokenizationError`] if the script does not tokenize.
pub fn split_statements(sql: &str) -> Result<Vec<&str>, TokenizationError> {
    let tokens = tokenize(sql)?;
    let mut statements = Vec::new();
    let mut start: Option<usize> = None;
    let mut block_depth = 0usize;

    for (i, token) in tokens.iter().enumerate() {
        let first = match start {
            Some(first) => first,
            None if token.is_punct(';') => continue,
            None => {
                start = Some(i);
                i
            }
        };

        if token.is_keyword("BEGIN") && is_trigger_statement(&tokens[first..]) {
            block_depth += 1;
        } else if token.is_keyword("CASE") && block_depth > 0 {
            block_depth += 1;
        } else if token.is_keyword("END") && block_depth > 0 {
            block_depth -= 1;
        } else if token.is_punct(';') && block_depth == 0 {
            statements.push(&sql[tokens[first].position..tokens[i - 1].end()]);
            start = None;
        }
    }

    if let (Some(first), Some(last)) = (start, tokens.last()) {
        statements.push(&sql[tokens[first].position..last.end()]);
    }
    Ok(statements)
}

fn is_trigger_statement(tokens: &[Token<'_>]) -> bool {
    let mut iter = tokens.iter().take(3);
    iter.next().is_some_and(|t| t.is_keyword("CREATE"))
        && iter.any(|t| t.is_keyword("TRIGGER"))
}

/// Token cursor shared by the statement parsers.
struct Parser<'a> {
    object_name: &'a str,
    sql: &'a str,
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(object_name: &'a str, sql: &'a str) -> Result<Self, DdlError> {
        let tokens = tokenize(sql).map_err(|source| DdlError::Tokenize {
            object_name: object_name.to_string(),
            raw_sql: sql.to_string(),
            source,
        })?;
        Ok(Self {
            object_name,
            sql,
            tokens,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_nth(&self, n: usize) -> Option<Token<'a>> {
        self.tokens.get(self.pos + n).copied()
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    /// Byte offset of the next token, or the end of input.
    fn position(&self) -> usize {
        self.peek().map_or(self.sql.len(), |t| t.position)
    }

    /// Byte offset just past the last consumed token.
    fn previous_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(0, |t| t.end())
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        self.sql[start..end].trim()
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.check_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<Token<'a>, DdlError> {
        match self.peek() {
            Some(t) if t.is_keyword(keyword) => {
                self.pos += 1;
                Ok(t)
            }
            _ => Err(self.error(format!("expected {keyword}"))),
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_word(word)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn check_punct(&self, punct: char) -> bool {
        self.peek().is_some_and(|t| t.is_punct(punct))
    }

    fn eat_punct(&mut self, punct: char) -> bool {
        if self.check_punct(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: char) -> Result<Token<'a>, DdlError> {
        match self.peek() {
            Some(t) if t.is_punct(punct) => {
                self.pos += 1;
                Ok(t)
            }
            _ => Err(self.error(format!("expected '{punct}'"))),
        }
    }

    /// Parses an object, column or constraint name. Keywords and string
    /// literals are accepted as names, as SQLite does.
    fn parse_name(&mut self, what: &str) -> Result<String, DdlError> {
        let Some(token) = self.peek() else {
            return Err(self.error(format!("expected {what}")));
        };
        let named = match token.kind {
            TokenKind::PlainIdentifier | TokenKind::QuotedIdentifier | TokenKind::Keyword => true,
            TokenKind::StringLiteral => token.text.starts_with('\''),
            _ => false,
        };
        if !named {
            return Err(self.error(format!("expected {what}")));
        }
        let name = token.value();
        if name.trim().is_empty() {
            return Err(self.error(format!("empty {what}")));
        }
        self.pos += 1;
        Ok(name.into_owned())
    }

    /// Parses `name` or `schema.name`.
    fn parse_qualified_name(&mut self, what: &str) -> Result<(Option<String>, String), DdlError> {
        let first = self.parse_name(what)?;
        if self.eat_punct('.') {
            let name = self.parse_name(what)?;
            Ok((Some(first), name))
        } else {
            Ok((None, first))
        }
    }

    fn parse_if_not_exists(&mut self) -> Result<bool, DdlError> {
        if !self.eat_keyword("IF") {
            return Ok(false);
        }
        self.expect_keyword("NOT")?;
        self.expect_keyword("EXISTS")?;
        Ok(true)
    }

    /// Parses `( name [COLLATE c] [ASC|DESC] [AUTOINCREMENT], … )`.
    ///
    /// Returns the names and whether any column carried `AUTOINCREMENT`.
    fn parse_key_columns(&mut self) -> Result<(Vec<String>, bool), DdlError> {
        self.expect_punct('(')?;
        let mut columns = Vec::new();
        let mut autoincrement = false;
        loop {
            columns.push(self.parse_name("column name")?);
            if self.eat_keyword("COLLATE") {
                self.parse_name("collation name")?;
            }
            if !self.eat_keyword("ASC") {
                self.eat_keyword("DESC");
            }
            autoincrement |= self.eat_keyword("AUTOINCREMENT");
            if !self.eat_punct(',') {
                break;
            }
        }
        self.expect_punct(')')?;
        Ok((columns, autoincrement))
    }

    /// Consumes a parenthesised group and returns its inner text.
    fn capture_parenthesized(&mut self) -> Result<&'a str, DdlError> {
        let open = self.expect_punct('(')?;
        let mut depth = 1usize;
        while let Some(token) = self.advance() {
            if token.is_punct('(') {
                depth += 1;
            } else if token.is_punct(')') {
                depth -= 1;
                if depth == 0 {
                    return Ok(self.slice(open.end(), token.position));
                }
            }
        }
        Err(self.error_at(open.position, "unbalanced parentheses"))
    }

    /// Consumes tokens up to, not including, the first token at depth zero
    /// that satisfies `stop` or is a `,` or `)`. Returns the consumed text,
    /// empty if nothing was consumed.
    fn capture_until(&mut self, stop: impl Fn(&Token<'a>) -> bool) -> Result<&'a str, DdlError> {
        let start = self.position();
        let first = self.pos;
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            if depth == 0 && (stop(&token) || token.is_punct(',') || token.is_punct(')')) {
                break;
            }
            if token.is_punct('(') {
                depth += 1;
            } else if token.is_punct(')') {
                depth -= 1;
            }
            self.pos += 1;
        }
        if depth > 0 {
            return Err(self.error_at(start, "unbalanced parentheses"));
        }
        if self.pos == first {
            return Ok("");
        }
        Ok(self.slice(start, self.previous_end()))
    }

    /// Skips `ON CONFLICT <resolution>` if present.
    fn skip_conflict_clause(&mut self) -> Result<(), DdlError> {
        if self.check_keyword("ON") && self.peek_nth(1).is_some_and(|t| t.is_keyword("CONFLICT")) {
            self.pos += 2;
            match self.advance() {
                Some(t)
                    if ["ROLLBACK", "ABORT", "FAIL", "IGNORE", "REPLACE"]
                        .iter()
                        .any(|r| t.is_keyword(r)) => {}
                _ => return Err(self.error("expected conflict resolution")),
            }
        }
        Ok(())
    }

    /// Accepts an optional trailing `;` and requires end of input.
    fn expect_end(&mut self) -> Result<(), DdlError> {
        while self.eat_punct(';') {}
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(self.error(format!("unexpected '{}' after statement", t.text))),
        }
    }

    fn error(&self, message: impl Into<String>) -> DdlError {
        self.error_at(self.position(), message)
    }

    fn error_at(&self, position: usize, message: impl Into<String>) -> DdlError {
        DdlError::Parse(DdlParseError {
            object_name: self.object_name.to_string(),
            raw_sql: self.sql.to_string(),
            message: message.into(),
            position,
        })
    }

    fn unsupported(&self, message: impl Into<String>) -> DdlError {
        DdlError::Unsupported(UnsupportedConstructError {
            object_name: self.object_name.to_string(),
            raw_sql: self.sql.to_string(),
            message: message.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ddl_dispatch() {
        let stmt = parse_ddl("t", "CREATE TEMP TABLE t (a)").unwrap();
        assert!(matches!(stmt, DdlStatement::Table(ref def) if def.temporary));

        let stmt = parse_ddl("ix", "CREATE UNIQUE INDEX ix ON t (a)").unwrap();
        assert!(matches!(stmt, DdlStatement::Index(ref def) if def.unique));

        let stmt = parse_ddl("tr", "CREATE TRIGGER tr AFTER INSERT ON t BEGIN SELECT 1; END").unwrap();
        assert_eq!(stmt.name(), "tr");
    }

    #[test]
    fn test_parse_ddl_rejects_views_and_other_statements() {
        let err = parse_ddl("v", "CREATE VIEW v AS SELECT 1").unwrap_err();
        assert_eq!(err.kind(), "unsupported");

        let err = parse_ddl("x", "DROP TABLE x").unwrap_err();
        assert_eq!(err.kind(), "syntax");
        assert_eq!(err.position(), Some(0));
    }

    #[test]
    fn test_tokenization_errors_carry_object_name() {
        let err = parse_create_table("t", "CREATE TABLE t (a TEXT DEFAULT 'x)").unwrap_err();
        assert_eq!(err.kind(), "tokenization");
        assert_eq!(err.object_name(), "t");
        assert_eq!(err.position(), Some(31));
    }

    #[test]
    fn test_split_statements() {
        let script = "CREATE TABLE a (x); ;\n\
                      CREATE TRIGGER tr AFTER INSERT ON a BEGIN\n\
                        UPDATE a SET x = CASE WHEN x > 0 THEN 1 ELSE 0 END;\n\
                        SELECT 1;\n\
                      END;\n\
                      CREATE INDEX ix ON a (x)";
        let statements = split_statements(script).unwrap();
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[0], "CREATE TABLE a (x)");
        assert!(statements[1].starts_with("CREATE TRIGGER tr"));
        assert!(statements[1].ends_with("END"));
        assert_eq!(statements[2], "CREATE INDEX ix ON a (x)");
    }

    #[test]
    fn test_capture_until_tracks_depth() {
        let mut parser = Parser::new("t", "f(a, (b)), c").unwrap();
        let text = parser.capture_until(|_| false).unwrap();
        assert_eq!(text, "f(a, (b))");
        assert!(parser.check_punct(','));
    }

    #[test]
    fn test_capture_parenthesized_unbalanced() {
        let mut parser = Parser::new("t", "(a + (b)").unwrap();
        let err = parser.capture_parenthesized().unwrap_err();
        assert_eq!(err.position(), Some(0));
    }

    #[test]
    fn test_parse_name_rejects_empty_quoted_name() {
        let mut parser = Parser::new("t", "\"\"").unwrap();
        assert!(parser.parse_name("table name").is_err());
    }
}
