//! Identifier rules of the supported database dialects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::identifier::{CaseFolding, IdentifierComparer, IdentifierDefaults};
use crate::resolve::{CaseFoldingStrategy, ResolutionStrategy};

/// A database dialect with its identifier conventions.
///
/// # Examples
///
/// ```
/// use db_schema_core::{Dialect, Identifier};
///
/// let dialect = Dialect::PostgreSql;
/// let order = dialect
///     .resolution_strategy()
///     .resolution_order(&Identifier::new("Orders").unwrap(), &dialect.defaults());
/// let names: Vec<String> = order.iter().map(ToString::to_string).collect();
/// assert_eq!(names, ["public.Orders", "public.orders"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    SqlServer,
    MySql,
    PostgreSql,
    Oracle,
    #[default]
    Sqlite,
}

impl Dialect {
    pub const ALL: [Dialect; 5] = [
        Dialect::SqlServer,
        Dialect::MySql,
        Dialect::PostgreSql,
        Dialect::Oracle,
        Dialect::Sqlite,
    ];

    /// Equality rule for identifiers under this dialect's default settings.
    pub fn comparer(self) -> IdentifierComparer {
        match self {
            Dialect::SqlServer | Dialect::MySql | Dialect::Sqlite => IdentifierComparer::IgnoreCase,
            Dialect::PostgreSql | Dialect::Oracle => IdentifierComparer::Ordinal,
        }
    }

    /// Case the catalog stores unquoted names in.
    pub fn case_folding(self) -> CaseFolding {
        match self {
            Dialect::Oracle => CaseFolding::Upper,
            Dialect::SqlServer | Dialect::MySql | Dialect::PostgreSql | Dialect::Sqlite => {
                CaseFolding::Lower
            }
        }
    }

    /// Schema assumed when a name omits one.
    pub fn default_schema(self) -> Option<&'static str> {
        match self {
            Dialect::SqlServer => Some("dbo"),
            Dialect::PostgreSql => Some("public"),
            Dialect::Sqlite => Some("main"),
            Dialect::MySql | Dialect::Oracle => None,
        }
    }

    /// Default qualifiers for this dialect.
    pub fn defaults(self) -> IdentifierDefaults {
        match self.default_schema() {
            Some(schema) => IdentifierDefaults::new().with_schema(schema),
            None => IdentifierDefaults::new(),
        }
    }

    /// The standard resolution strategy for this dialect.
    pub fn resolution_strategy(self) -> Box<dyn ResolutionStrategy> {
        Box::new(CaseFoldingStrategy::new(self.case_folding()))
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::SqlServer => "sqlserver",
            Dialect::MySql => "mysql",
            Dialect::PostgreSql => "postgresql",
            Dialect::Oracle => "oracle",
            Dialect::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlserver" | "mssql" => Ok(Dialect::SqlServer),
            "mysql" => Ok(Dialect::MySql),
            "postgresql" | "postgres" => Ok(Dialect::PostgreSql),
            "oracle" => Ok(Dialect::Oracle),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(format!("unknown dialect: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Identifier;

    #[test]
    fn test_oracle_folds_upper() {
        let dialect = Dialect::Oracle;
        let id = Identifier::parse("hr.emp").unwrap();
        let names: Vec<String> = dialect
            .resolution_strategy()
            .resolution_order(&id, &dialect.defaults())
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, ["hr.emp", "hr.EMP", "HR.EMP"]);
    }

    #[test]
    fn test_from_str_round_trips_names() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.name().parse::<Dialect>().unwrap(), dialect);
        }
        assert_eq!("Postgres".parse::<Dialect>().unwrap(), Dialect::PostgreSql);
        assert!("db2".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_default_schemas() {
        assert_eq!(Dialect::Sqlite.default_schema(), Some("main"));
        assert_eq!(Dialect::SqlServer.default_schema(), Some("dbo"));
        assert_eq!(Dialect::MySql.default_schema(), None);
        assert!(Dialect::Sqlite.comparer() == IdentifierComparer::IgnoreCase);
    }
}
