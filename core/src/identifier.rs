//! Qualified object names and dialect-aware comparison.
//!
//! An [`Identifier`] names a catalog object with up to four parts: server,
//! database, schema and local name. Only the local name is mandatory.
//! Identifiers are immutable once built and deliberately do not implement
//! `PartialEq`: whether `Users` and `users` name the same object depends on
//! the dialect, so comparisons always go through an [`IdentifierComparer`].
//!
//! # Examples
//!
//! ```
//! use db_schema_core::{Identifier, IdentifierComparer};
//!
//! let a = Identifier::parse("main.Users").unwrap();
//! let b = Identifier::new("users").unwrap().with_schema("MAIN");
//!
//! assert!(IdentifierComparer::IgnoreCase.equals(&a, &b));
//! assert!(!IdentifierComparer::Ordinal.equals(&a, &b));
//! assert_eq!(a.to_string(), "main.Users");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while constructing an [`Identifier`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// The local name is empty or whitespace-only.
    #[error("identifier local name cannot be empty")]
    EmptyLocalName,
    /// A dotted name has more than four parts.
    #[error("identifier '{0}' has more than four parts")]
    TooManyParts(String),
    /// A quoted part in a dotted name is never closed.
    #[error("unterminated quote in identifier '{0}'")]
    UnterminatedQuote(String),
}

/// A possibly partially-qualified object name.
///
/// Build one with [`Identifier::new`] or [`Identifier::parse`] and add
/// qualifiers with the `with_*` methods. An empty local name is rejected at
/// construction, so every `Identifier` in circulation names something.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "IdentifierParts")]
pub struct Identifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<String>,
    local_name: String,
}

/// Unvalidated serde image of an [`Identifier`].
#[derive(Deserialize)]
struct IdentifierParts {
    #[serde(default)]
    server: Option<String>,
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    schema: Option<String>,
    local_name: String,
}

impl TryFrom<IdentifierParts> for Identifier {
    type Error = IdentifierError;

    fn try_from(parts: IdentifierParts) -> Result<Self, Self::Error> {
        let mut id = Identifier::new(parts.local_name)?;
        id.server = parts.server;
        id.database = parts.database;
        id.schema = parts.schema;
        Ok(id)
    }
}

impl Identifier {
    /// Creates an unqualified identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::EmptyLocalName`] if `local_name` is empty
    /// or whitespace-only.
    pub fn new(local_name: impl Into<String>) -> Result<Self, IdentifierError> {
        let local_name = local_name.into();
        if local_name.trim().is_empty() {
            return Err(IdentifierError::EmptyLocalName);
        }
        Ok(Self {
            server: None,
            database: None,
            schema: None,
            local_name,
        })
    }

    /// Parses a dotted name such as `db.schema.table`.
    ///
    /// Parts are assigned right to left: the last part is the local name,
    /// the one before it the schema, and so on. Parts may be quoted with
    /// `"…"`, `` `…` `` or `[…]`, in which case dots inside them are
    /// literal. An empty middle part (`db..table`) leaves that qualifier
    /// unset.
    ///
    /// # Examples
    ///
    /// ```
    /// use db_schema_core::Identifier;
    ///
    /// let id = Identifier::parse("srv.sales..\"Order.Lines\"").unwrap();
    /// assert_eq!(id.server(), Some("srv"));
    /// assert_eq!(id.database(), Some("sales"));
    /// assert_eq!(id.schema(), None);
    /// assert_eq!(id.local_name(), "Order.Lines");
    /// ```
    pub fn parse(text: &str) -> Result<Self, IdentifierError> {
        let parts = split_dotted(text)?;
        if parts.len() > 4 {
            return Err(IdentifierError::TooManyParts(text.to_string()));
        }

        let mut parts = parts.into_iter().rev();
        let local = parts.next().unwrap_or_default();
        let mut id = Identifier::new(local)?;
        id.schema = parts.next().filter(|p| !p.is_empty());
        id.database = parts.next().filter(|p| !p.is_empty());
        id.server = parts.next().filter(|p| !p.is_empty());
        Ok(id)
    }

    /// Returns a copy qualified with the given schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Returns a copy qualified with the given database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Returns a copy qualified with the given server.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Returns a copy with a different local name and the same qualifiers.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::EmptyLocalName`] for an empty name.
    pub fn with_local_name(&self, local_name: impl Into<String>) -> Result<Self, IdentifierError> {
        let mut id = Identifier::new(local_name)?;
        id.server = self.server.clone();
        id.database = self.database.clone();
        id.schema = self.schema.clone();
        Ok(id)
    }

    /// Fills every missing qualifier from `defaults`, keeping explicit parts.
    pub fn qualify(&self, defaults: &IdentifierDefaults) -> Self {
        Self {
            server: self.server.clone().or_else(|| defaults.server.clone()),
            database: self.database.clone().or_else(|| defaults.database.clone()),
            schema: self.schema.clone().or_else(|| defaults.schema.clone()),
            local_name: self.local_name.clone(),
        }
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Returns the parts in server, database, schema, local-name order.
    pub fn parts(&self) -> [Option<&str>; 4] {
        [
            self.server(),
            self.database(),
            self.schema(),
            Some(self.local_name()),
        ]
    }
}

/// Prints the dotted form [`Identifier::parse`] reads back: parts that are
/// not plain words are double-quoted, and a missing middle qualifier is
/// left empty (`srv.db..t`).
impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self.parts();
        let first = parts.iter().position(Option::is_some).unwrap_or(3);
        for (i, part) in parts[first..].iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match part {
                Some(part) if is_plain_part(part) => f.write_str(part)?,
                Some(part) => write!(f, "\"{}\"", part.replace('"', "\"\""))?,
                None => {}
            }
        }
        Ok(())
    }
}

fn is_plain_part(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Qualifiers used to complete a partially-qualified [`Identifier`].
///
/// # Examples
///
/// ```
/// use db_schema_core::{Identifier, IdentifierDefaults};
///
/// let defaults = IdentifierDefaults::new().with_schema("main");
/// let id = Identifier::new("users").unwrap().qualify(&defaults);
/// assert_eq!(id.to_string(), "main.users");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentifierDefaults {
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
}

impl IdentifierDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

/// Equality rule applied to identifier parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierComparer {
    /// Exact, case-sensitive comparison.
    Ordinal,
    /// Unicode case-insensitive comparison.
    #[default]
    IgnoreCase,
}

impl IdentifierComparer {
    /// Compares two name fragments.
    pub fn eq_str(self, a: &str, b: &str) -> bool {
        match self {
            Self::Ordinal => a == b,
            Self::IgnoreCase => a
                .chars()
                .flat_map(char::to_lowercase)
                .eq(b.chars().flat_map(char::to_lowercase)),
        }
    }

    /// Compares two identifiers part by part. A part present on one side and
    /// absent on the other makes them unequal.
    pub fn equals(self, a: &Identifier, b: &Identifier) -> bool {
        a.parts()
            .into_iter()
            .zip(b.parts())
            .all(|pair| match pair {
                (None, None) => true,
                (Some(x), Some(y)) => self.eq_str(x, y),
                _ => false,
            })
    }

    /// Compares only the local names of two identifiers.
    pub fn same_local_name(self, a: &Identifier, b: &Identifier) -> bool {
        self.eq_str(a.local_name(), b.local_name())
    }
}

/// Case convention a catalog stores unquoted names in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseFolding {
    Lower,
    Upper,
}

impl CaseFolding {
    pub fn fold(self, text: &str) -> String {
        match self {
            Self::Lower => text.to_lowercase(),
            Self::Upper => text.to_uppercase(),
        }
    }
}

fn split_dotted(text: &str) -> Result<Vec<String>, IdentifierError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = text.trim().chars().peekable();

    while let Some(ch) = chars.next() {
        let close = match ch {
            '"' => Some('"'),
            '`' => Some('`'),
            '[' => Some(']'),
            _ => None,
        };
        match close {
            Some(close) if current.is_empty() => loop {
                match chars.next() {
                    Some(c) if c == close => {
                        if close != ']' && chars.peek() == Some(&close) {
                            chars.next();
                            current.push(close);
                        } else {
                            break;
                        }
                    }
                    Some(c) => current.push(c),
                    None => return Err(IdentifierError::UnterminatedQuote(text.to_string())),
                }
            },
            _ if ch == '.' => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    parts.push(current);
    Ok(parts)
}
