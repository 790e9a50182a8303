//! Tokenizer for SQLite DDL text.
//!
//! Turns a statement into a flat vector of [`Token`]s that borrow their
//! text from the source string. Whitespace and comments are dropped.
//! Identifiers quoted with `"…"`, `` `…` `` or `[…]` all become
//! [`TokenKind::QuotedIdentifier`]; [`Token::value`] strips the quotes so
//! the three spellings name the same object.
//!
//! # Examples
//!
//! ```
//! use db_schema_sqlite::{TokenKind, tokenize};
//!
//! let tokens = tokenize("create table [My Table] (\"id\" int) -- done").unwrap();
//! assert_eq!(tokens[0].kind, TokenKind::Keyword);
//! assert_eq!(tokens[0].text, "create");
//! assert_eq!(tokens[2].kind, TokenKind::QuotedIdentifier);
//! assert_eq!(tokens[2].value(), "My Table");
//! assert_eq!(tokens.len(), 7);
//! ```

use std::borrow::Cow;

use crate::error::{TokenizationError, TokenizationErrorReason};

/// Lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Keyword,
    PlainIdentifier,
    QuotedIdentifier,
    StringLiteral,
    NumericLiteral,
    Punctuation,
    Operator,
}

/// One token: its kind, its exact source text and where it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Source text of the token, quotes included.
    pub text: &'a str,
    /// Byte offset of the token in the source.
    pub position: usize,
}

impl<'a> Token<'a> {
    /// Byte offset just past the token.
    pub fn end(&self) -> usize {
        self.position + self.text.len()
    }

    /// `true` for a keyword token spelled `keyword` in any case.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text.eq_ignore_ascii_case(keyword)
    }

    /// `true` for an unquoted word (keyword or plain identifier) spelled
    /// `word` in any case. Used for context-sensitive words such as
    /// `STRICT` and `ROWID` that SQLite does not reserve.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(self.kind, TokenKind::Keyword | TokenKind::PlainIdentifier)
            && self.text.eq_ignore_ascii_case(word)
    }

    pub fn is_punct(&self, punct: char) -> bool {
        self.kind == TokenKind::Punctuation && self.text.len() == 1 && self.text.starts_with(punct)
    }

    /// Logical value of the token.
    ///
    /// Quoted identifiers lose their quotes and doubled-quote escapes;
    /// single-quoted string literals likewise. Everything else is returned
    /// as written.
    pub fn value(&self) -> Cow<'a, str> {
        match self.kind {
            TokenKind::QuotedIdentifier => {
                let inner = &self.text[1..self.text.len() - 1];
                match self.text.as_bytes()[0] {
                    b'"' => unescape(inner, "\"\"", "\""),
                    b'`' => unescape(inner, "``", "`"),
                    _ => Cow::Borrowed(inner),
                }
            }
            TokenKind::StringLiteral if self.text.starts_with('\'') => {
                unescape(&self.text[1..self.text.len() - 1], "''", "'")
            }
            _ => Cow::Borrowed(self.text),
        }
    }
}

fn unescape<'a>(inner: &'a str, doubled: &str, single: &str) -> Cow<'a, str> {
    if inner.contains(doubled) {
        Cow::Owned(inner.replace(doubled, single))
    } else {
        Cow::Borrowed(inner)
    }
}

/// SQLite keywords, sorted for binary search.
const KEYWORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS", "ASC",
    "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST",
    "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS",
    "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT",
    "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH",
    "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL",
    "FILTER", "FIRST", "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB",
    "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED",
    "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN",
    "KEY", "LAST", "LEFT", "LIKE", "LIMIT", "MATCH", "MATERIALIZED", "NATURAL", "NO", "NOT",
    "NOTHING", "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "OR", "ORDER", "OTHERS",
    "OUTER", "OVER", "PARTITION", "PLAN", "PRAGMA", "PRECEDING", "PRIMARY", "QUERY", "RAISE",
    "RANGE", "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE", "RENAME", "REPLACE",
    "RESTRICT", "RETURNING", "RIGHT", "ROLLBACK", "ROW", "ROWS", "SAVEPOINT", "SELECT", "SET",
    "TABLE", "TEMP", "TEMPORARY", "THEN", "TIES", "TO", "TRANSACTION", "TRIGGER", "UNBOUNDED",
    "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN", "WHERE",
    "WINDOW", "WITH", "WITHOUT",
];

/// Returns `true` if `word` is an SQLite keyword, in any case.
pub fn is_keyword(word: &str) -> bool {
    KEYWORDS
        .binary_search_by(|kw| {
            kw.bytes()
                .cmp(word.bytes().map(|b| b.to_ascii_uppercase()))
        })
        .is_ok()
}

/// Splits `sql` into tokens.
///
/// # Errors
///
/// Returns [`TokenizationError`] for an unterminated string, quoted
/// identifier or block comment, or a character that cannot start a token.
pub fn tokenize(sql: &str) -> Result<Vec<Token<'_>>, TokenizationError> {
    let mut lexer = Lexer {
        src: sql,
        bytes: sql.as_bytes(),
        pos: 0,
    };
    let mut tokens = Vec::with_capacity(sql.len() / 4);
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn error(&self, position: usize, reason: TokenizationErrorReason) -> TokenizationError {
        TokenizationError { position, reason }
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>, TokenizationError> {
        self.skip_trivia()?;

        let Some(ch) = self.peek_at(0) else {
            return Ok(None);
        };
        let start = self.pos;

        let kind = match ch {
            b'\'' => {
                self.scan_quoted(b'\'', TokenizationErrorReason::UnterminatedString)?;
                TokenKind::StringLiteral
            }
            b'x' | b'X' if self.peek_at(1) == Some(b'\'') => {
                self.pos += 1;
                self.scan_quoted(b'\'', TokenizationErrorReason::UnterminatedString)?;
                TokenKind::StringLiteral
            }
            b'"' | b'`' => {
                self.scan_quoted(ch, TokenizationErrorReason::UnterminatedQuotedIdentifier)?;
                TokenKind::QuotedIdentifier
            }
            b'[' => {
                match self.bytes[self.pos..].iter().position(|&b| b == b']') {
                    Some(offset) => self.pos += offset + 1,
                    None => {
                        return Err(self.error(
                            start,
                            TokenizationErrorReason::UnterminatedQuotedIdentifier,
                        ));
                    }
                }
                TokenKind::QuotedIdentifier
            }
            b'0'..=b'9' => {
                self.scan_number();
                TokenKind::NumericLiteral
            }
            b'.' if self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) => {
                self.scan_number();
                TokenKind::NumericLiteral
            }
            c if is_ident_start(c) => {
                self.scan_word();
                if is_keyword(&self.src[start..self.pos]) {
                    TokenKind::Keyword
                } else {
                    TokenKind::PlainIdentifier
                }
            }
            b'(' | b')' | b',' | b';' | b'.' => {
                self.pos += 1;
                TokenKind::Punctuation
            }
            b'?' => {
                self.pos += 1;
                while self.peek_at(0).is_some_and(|b| b.is_ascii_digit()) {
                    self.pos += 1;
                }
                TokenKind::Operator
            }
            b':' | b'@' | b'$' => {
                self.pos += 1;
                self.scan_word();
                TokenKind::Operator
            }
            _ => {
                self.scan_operator(start)?;
                TokenKind::Operator
            }
        };

        Ok(Some(Token {
            kind,
            text: &self.src[start..self.pos],
            position: start,
        }))
    }

    fn skip_trivia(&mut self) -> Result<(), TokenizationError> {
        loop {
            while self.peek_at(0).is_some_and(|b| b.is_ascii_whitespace()) {
                self.pos += 1;
            }
            match (self.peek_at(0), self.peek_at(1)) {
                (Some(b'-'), Some(b'-')) => {
                    while self.peek_at(0).is_some_and(|b| b != b'\n') {
                        self.pos += 1;
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    let start = self.pos;
                    match self.src[self.pos + 2..].find("*/") {
                        Some(offset) => self.pos += offset + 4,
                        None => {
                            return Err(
                                self.error(start, TokenizationErrorReason::UnterminatedComment)
                            );
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Scans a token delimited by `quote`, where a doubled quote is an
    /// escaped literal quote. `self.pos` must be on the opening quote.
    fn scan_quoted(
        &mut self,
        quote: u8,
        reason: TokenizationErrorReason,
    ) -> Result<(), TokenizationError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.bytes[self.pos..].iter().position(|&b| b == quote) {
                Some(offset) => {
                    self.pos += offset + 1;
                    if self.peek_at(0) == Some(quote) {
                        self.pos += 1;
                    } else {
                        return Ok(());
                    }
                }
                None => return Err(self.error(start, reason)),
            }
        }
    }

    fn scan_number(&mut self) {
        if self.peek_at(0) == Some(b'0') && matches!(self.peek_at(1), Some(b'x' | b'X')) {
            self.pos += 2;
            while self.peek_at(0).is_some_and(|b| b.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            return;
        }

        while self.peek_at(0).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek_at(0) == Some(b'.') {
            self.pos += 1;
            while self.peek_at(0).is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek_at(0), Some(b'e' | b'E')) {
            let digits_at = match self.peek_at(1) {
                Some(b'+' | b'-') => 2,
                _ => 1,
            };
            if self.peek_at(digits_at).is_some_and(|b| b.is_ascii_digit()) {
                self.pos += digits_at;
                while self.peek_at(0).is_some_and(|b| b.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }
    }

    fn scan_word(&mut self) {
        while self.peek_at(0).is_some_and(is_ident_continue) {
            self.pos += 1;
        }
    }

    fn scan_operator(&mut self, start: usize) -> Result<(), TokenizationError> {
        let ch = self.bytes[self.pos];
        let next = self.peek_at(1);
        let len = match (ch, next) {
            (b'-', Some(b'>')) if self.peek_at(2) == Some(b'>') => 3,
            (b'-', Some(b'>'))
            | (b'|', Some(b'|'))
            | (b'<', Some(b'=' | b'>' | b'<'))
            | (b'>', Some(b'=' | b'>'))
            | (b'=', Some(b'='))
            | (b'!', Some(b'=')) => 2,
            (b'+' | b'-' | b'*' | b'/' | b'%' | b'&' | b'|' | b'~' | b'<' | b'>' | b'=', _) => 1,
            _ => {
                let c = self.src[start..].chars().next().unwrap_or('\0');
                return Err(self.error(start, TokenizationErrorReason::UnexpectedCharacter(c)));
            }
        };
        self.pos += len;
        Ok(())
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<TokenKind> {
        tokenize(sql).unwrap().iter().map(|t| t.kind).collect()
    }

    fn texts(sql: &str) -> Vec<&str> {
        tokenize(sql).unwrap().iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_keyword_table_is_sorted() {
        assert!(KEYWORDS.windows(2).all(|w| w[0] < w[1]));
        assert!(is_keyword("primary"));
        assert!(is_keyword("Autoincrement"));
        assert!(!is_keyword("strict"));
        assert!(!is_keyword("users"));
    }

    #[test]
    fn test_keywords_keep_original_casing() {
        let tokens = tokenize("CrEaTe TABLE users").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[0].text, "CrEaTe");
        assert!(tokens[0].is_keyword("CREATE"));
        assert_eq!(tokens[2].kind, TokenKind::PlainIdentifier);
        assert_eq!(tokens[2].text, "users");
    }

    #[test]
    fn test_quote_styles_normalize_to_same_value() {
        let tokens = tokenize(r#""My ""Tbl""" `My "Tbl"` [My "Tbl"]"#).unwrap();
        assert_eq!(tokens.len(), 3);
        for token in &tokens {
            assert_eq!(token.kind, TokenKind::QuotedIdentifier);
            assert_eq!(token.value(), r#"My "Tbl""#);
        }
    }

    #[test]
    fn test_string_literal_escapes() {
        let tokens = tokenize("'it''s' X'0aff'").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].text, "'it''s'");
        assert_eq!(tokens[0].value(), "it's");
        assert_eq!(tokens[1].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[1].value(), "X'0aff'");
    }

    #[test]
    fn test_comments_and_whitespace_are_dropped() {
        let sql = "a -- line comment\n /* block\n comment */ b";
        assert_eq!(texts(sql), vec!["a", "b"]);
        assert_eq!(tokenize(sql).unwrap()[1].position, sql.len() - 1);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(texts("1 2.5 .5 1e10 3E-2 0x1F 7."), vec!["1", "2.5", ".5", "1e10", "3E-2", "0x1F", "7."]);
        assert!(kinds("1 2.5 0x1F").iter().all(|k| *k == TokenKind::NumericLiteral));
    }

    #[test]
    fn test_operators_and_punctuation() {
        assert_eq!(
            texts("a||b <= >= <> != == -> ->> << >> - ~ ( ) , ; ."),
            vec!["a", "||", "b", "<=", ">=", "<>", "!=", "==", "->", "->>", "<<", ">>", "-", "~", "(", ")", ",", ";", "."]
        );
        let tokens = tokenize("(,);").unwrap();
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Punctuation));
        assert!(tokens[0].is_punct('('));
    }

    #[test]
    fn test_bind_parameters_are_operators() {
        let tokens = tokenize("?1 :name @p $v").unwrap();
        assert_eq!(tokens.iter().map(|t| t.text).collect::<Vec<_>>(), vec!["?1", ":name", "@p", "$v"]);
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Operator));
    }

    #[test]
    fn test_unicode_identifiers() {
        let tokens = tokenize("CREATE TABLE tävling (名前 TEXT)").unwrap();
        assert_eq!(tokens[2].text, "tävling");
        assert_eq!(tokens[4].text, "名前");
        assert_eq!(tokens[4].kind, TokenKind::PlainIdentifier);
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("DEFAULT 'abc").unwrap_err();
        assert_eq!(err.position, 8);
        assert_eq!(err.reason, TokenizationErrorReason::UnterminatedString);
    }

    #[test]
    fn test_unterminated_identifiers() {
        for sql in ["\"abc", "`abc", "[abc"] {
            let err = tokenize(sql).unwrap_err();
            assert_eq!(err.position, 0);
            assert_eq!(err.reason, TokenizationErrorReason::UnterminatedQuotedIdentifier);
        }
    }

    #[test]
    fn test_unterminated_comment() {
        let err = tokenize("a /* never closed").unwrap_err();
        assert_eq!(err.position, 2);
        assert_eq!(err.reason, TokenizationErrorReason::UnterminatedComment);
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("a # b").unwrap_err();
        assert_eq!(err.position, 2);
        assert_eq!(err.reason, TokenizationErrorReason::UnexpectedCharacter('#'));
    }

    #[test]
    fn test_concurrent_tokenize() {
        let sql = "CREATE TABLE t (a INTEGER PRIMARY KEY, b TEXT)";
        let expected = tokenize(sql).unwrap();
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4).map(|_| s.spawn(|| tokenize(sql).unwrap())).collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }
}
