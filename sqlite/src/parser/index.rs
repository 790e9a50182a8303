use db_schema_core::IndexColumn;
use tracing::debug;

use super::Parser;
use super::ast::IndexDef;
use crate::error::DdlError;
use crate::tokenizer::TokenKind;

pub(super) fn parse_index(p: &mut Parser<'_>) -> Result<IndexDef, DdlError> {
    p.expect_keyword("CREATE")?;
    let unique = p.eat_keyword("UNIQUE");
    p.expect_keyword("INDEX")?;
    let if_not_exists = p.parse_if_not_exists()?;
    let (schema, name) = p.parse_qualified_name("index name")?;
    p.expect_keyword("ON")?;
    let table = p.parse_name("table name")?;

    p.expect_punct('(')?;
    let mut columns = Vec::new();
    loop {
        columns.push(parse_indexed_column(p)?);
        if !p.eat_punct(',') {
            break;
        }
    }
    p.expect_punct(')')?;

    let predicate = if p.eat_keyword("WHERE") {
        let text = p.capture_until(|t| t.is_punct(';'))?;
        if text.is_empty() {
            return Err(p.error("expected predicate after WHERE"));
        }
        Some(text.to_string())
    } else {
        None
    };
    p.expect_end()?;

    debug!(index = %name, table = %table, columns = columns.len(), "Parsed CREATE INDEX");
    Ok(IndexDef {
        schema,
        name,
        table,
        unique,
        if_not_exists,
        columns,
        predicate,
    })
}

/// Parses `expr-or-name [COLLATE name] [ASC|DESC]`.
fn parse_indexed_column(p: &mut Parser<'_>) -> Result<IndexColumn, DdlError> {
    let first = p.pos;
    let text = p.capture_until(|t| {
        t.is_keyword("COLLATE") || t.is_keyword("ASC") || t.is_keyword("DESC")
    })?;
    if text.is_empty() {
        return Err(p.error("expected indexed column"));
    }

    let single = (p.pos == first + 1).then(|| p.tokens[first]);
    let mut column = match single {
        Some(token)
            if matches!(
                token.kind,
                TokenKind::PlainIdentifier | TokenKind::QuotedIdentifier | TokenKind::Keyword
            ) =>
        {
            IndexColumn::column(token.value())
        }
        _ => IndexColumn::expression(text),
    };

    if p.eat_keyword("COLLATE") {
        column = column.with_collation(p.parse_name("collation name")?);
    }
    if p.eat_keyword("DESC") {
        column = column.descending();
    } else {
        p.eat_keyword("ASC");
    }
    Ok(column)
}

#[cfg(test)]
mod tests {
    use db_schema_core::SortOrder;

    use super::super::parse_create_index;

    #[test]
    fn test_unique_index_with_collation_and_order() {
        let def = parse_create_index("ix1", "CREATE UNIQUE INDEX ix1 ON t1 (name COLLATE NOCASE DESC)").unwrap();
        assert!(def.unique);
        assert_eq!(def.table, "t1");
        assert_eq!(def.columns.len(), 1);
        let column = &def.columns[0];
        assert_eq!(column.expression, "name");
        assert!(!column.is_expression);
        assert_eq!(column.collation.as_deref(), Some("NOCASE"));
        assert_eq!(column.order, SortOrder::Descending);
    }

    #[test]
    fn test_defaults_to_ascending() {
        let def = parse_create_index("ix", "CREATE INDEX ix ON t (a, b ASC)").unwrap();
        assert!(!def.unique);
        assert!(def.columns.iter().all(|c| c.order == SortOrder::Ascending));
        assert!(def.predicate.is_none());
    }

    #[test]
    fn test_expression_columns_and_partial_predicate() {
        let def = parse_create_index(
            "ix_lower",
            "CREATE INDEX IF NOT EXISTS main.ix_lower ON \"Users\" (lower(email), \"Last Name\" DESC) \
             WHERE deleted_at IS NULL AND (status = 'active');",
        )
        .unwrap();
        assert!(def.if_not_exists);
        assert_eq!(def.schema.as_deref(), Some("main"));
        assert_eq!(def.table, "Users");
        assert_eq!(def.columns[0].expression, "lower(email)");
        assert!(def.columns[0].is_expression);
        assert_eq!(def.columns[1].expression, "Last Name");
        assert!(!def.columns[1].is_expression);
        assert_eq!(
            def.predicate.as_deref(),
            Some("deleted_at IS NULL AND (status = 'active')")
        );
    }

    #[test]
    fn test_malformed_index() {
        for sql in [
            "CREATE INDEX ix t (a)",
            "CREATE INDEX ix ON t ()",
            "CREATE INDEX ix ON t (a) WHERE",
            "CREATE INDEX ix ON t (a COLLATE)",
        ] {
            let err = parse_create_index("ix", sql).unwrap_err();
            assert_eq!(err.kind(), "syntax", "{sql}");
        }
    }
}
