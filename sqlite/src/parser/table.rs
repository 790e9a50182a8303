use db_schema_core::{ForeignKeyAction, GeneratedColumn, GeneratedKind};
use tracing::debug;

use super::Parser;
use super::ast::{ColumnDef, TableConstraint, TableDef};
use crate::affinity::resolve_type;
use crate::error::DdlError;
use crate::tokenizer::{Token, TokenKind};

/// Keywords that start a column constraint and so end a type name or a
/// `DEFAULT` expression.
const COLUMN_CONSTRAINT_KEYWORDS: &[&str] = &[
    "CONSTRAINT",
    "PRIMARY",
    "NOT",
    "NULL",
    "UNIQUE",
    "CHECK",
    "DEFAULT",
    "COLLATE",
    "REFERENCES",
    "GENERATED",
    "AS",
];

fn starts_column_constraint(token: &Token<'_>) -> bool {
    COLUMN_CONSTRAINT_KEYWORDS
        .iter()
        .any(|kw| token.is_keyword(kw))
}

pub(super) fn parse_table(p: &mut Parser<'_>) -> Result<TableDef, DdlError> {
    p.expect_keyword("CREATE")?;
    let temporary = p.eat_keyword("TEMP") || p.eat_keyword("TEMPORARY");
    if p.check_keyword("VIRTUAL") {
        return Err(p.unsupported("virtual tables are not supported"));
    }
    p.expect_keyword("TABLE")?;
    let if_not_exists = p.parse_if_not_exists()?;
    let (schema, name) = p.parse_qualified_name("table name")?;

    if p.check_keyword("AS") {
        return Err(p.unsupported("CREATE TABLE ... AS SELECT is not supported"));
    }
    p.expect_punct('(')?;

    let mut def = TableDef {
        schema,
        name,
        temporary,
        if_not_exists,
        columns: Vec::new(),
        constraints: Vec::new(),
        without_rowid: false,
        strict: false,
    };

    loop {
        if starts_table_constraint(p) {
            parse_table_constraint(p, &mut def)?;
        } else {
            parse_column(p, &mut def)?;
        }
        if !p.eat_punct(',') {
            break;
        }
    }
    p.expect_punct(')')?;

    parse_table_options(p, &mut def)?;
    p.expect_end()?;

    mark_primary_key_columns(&mut def);
    debug!(
        table = %def.name,
        columns = def.columns.len(),
        constraints = def.constraints.len(),
        "Parsed CREATE TABLE"
    );
    Ok(def)
}

fn starts_table_constraint(p: &Parser<'_>) -> bool {
    p.peek().is_some_and(|t| {
        ["CONSTRAINT", "PRIMARY", "UNIQUE", "CHECK", "FOREIGN"]
            .iter()
            .any(|kw| t.is_keyword(kw))
    })
}

fn parse_column(p: &mut Parser<'_>, def: &mut TableDef) -> Result<(), DdlError> {
    let name_position = p.position();
    let name = p.parse_name("column name")?;
    if def.column(&name).is_some() {
        return Err(p.error_at(name_position, format!("duplicate column name: {name}")));
    }

    let declared_type = parse_type_name(p)?;
    let resolved = resolve_type(&declared_type);
    let mut column = ColumnDef {
        name,
        declared_type,
        affinity: resolved.affinity,
        column_type: resolved.column_type,
        nullable: true,
        default: None,
        collation: None,
        generated: None,
        autoincrement: false,
        primary_key: false,
        hidden: false,
    };

    loop {
        let constraint_name = if p.eat_keyword("CONSTRAINT") {
            Some(p.parse_name("constraint name")?)
        } else {
            None
        };

        if p.eat_keyword("PRIMARY") {
            p.expect_keyword("KEY")?;
            if !p.eat_keyword("ASC") {
                p.eat_keyword("DESC");
            }
            p.skip_conflict_clause()?;
            let autoincrement = p.eat_keyword("AUTOINCREMENT");
            column.primary_key = true;
            column.autoincrement |= autoincrement;
            def.constraints.push(TableConstraint::PrimaryKey {
                name: constraint_name,
                columns: vec![column.name.clone()],
                autoincrement,
            });
        } else if p.eat_keyword("NOT") {
            p.expect_keyword("NULL")?;
            p.skip_conflict_clause()?;
            column.nullable = false;
        } else if p.eat_keyword("NULL") {
            p.skip_conflict_clause()?;
        } else if p.eat_keyword("UNIQUE") {
            p.skip_conflict_clause()?;
            def.constraints.push(TableConstraint::Unique {
                name: constraint_name,
                columns: vec![column.name.clone()],
            });
        } else if p.eat_keyword("CHECK") {
            let expression = p.capture_parenthesized()?.to_string();
            def.constraints.push(TableConstraint::Check {
                name: constraint_name,
                expression,
            });
        } else if p.eat_keyword("DEFAULT") {
            column.default = Some(parse_default(p)?);
        } else if p.eat_keyword("COLLATE") {
            column.collation = Some(p.parse_name("collation name")?);
        } else if p.eat_keyword("REFERENCES") {
            let fk = parse_references(p, constraint_name, vec![column.name.clone()])?;
            def.constraints.push(fk);
        } else if p.check_keyword("GENERATED") || p.check_keyword("AS") {
            if p.eat_keyword("GENERATED") {
                p.expect_keyword("ALWAYS")?;
            }
            p.expect_keyword("AS")?;
            let expression = p.capture_parenthesized()?.to_string();
            let kind = if p.eat_word("STORED") {
                GeneratedKind::Stored
            } else {
                p.eat_keyword("VIRTUAL");
                GeneratedKind::Virtual
            };
            column.generated = Some(GeneratedColumn { expression, kind });
        } else if constraint_name.is_some() {
            return Err(p.error("expected column constraint after CONSTRAINT name"));
        } else {
            break;
        }
    }

    if !p.check_punct(',') && !p.check_punct(')') {
        return Err(p.error(format!(
            "unexpected token in definition of column '{}'",
            column.name
        )));
    }

    def.columns.push(column);
    Ok(())
}

/// Collects type-name words and an optional `(n[,m])` argument list.
fn parse_type_name(p: &mut Parser<'_>) -> Result<String, DdlError> {
    let mut words: Vec<String> = Vec::new();
    while let Some(token) = p.peek() {
        let is_word = match token.kind {
            TokenKind::PlainIdentifier | TokenKind::QuotedIdentifier => true,
            TokenKind::Keyword => !starts_column_constraint(&token),
            _ => false,
        };
        if !is_word {
            break;
        }
        words.push(token.value().into_owned());
        p.advance();
    }

    let mut declared = words.join(" ");
    if !words.is_empty() && p.check_punct('(') {
        let open = p.expect_punct('(')?;
        let mut args = Vec::new();
        loop {
            let arg = p.capture_until(|_| false)?;
            if arg.is_empty() {
                return Err(p.error("expected type argument"));
            }
            args.push(arg.split_whitespace().collect::<String>());
            if !p.eat_punct(',') {
                break;
            }
        }
        if !p.eat_punct(')') {
            return Err(p.error_at(open.position, "unbalanced parentheses in type name"));
        }
        declared.push('(');
        declared.push_str(&args.join(","));
        declared.push(')');
    }
    Ok(declared)
}

/// Captures a `DEFAULT` value as source text.
fn parse_default(p: &mut Parser<'_>) -> Result<String, DdlError> {
    let Some(first) = p.peek() else {
        return Err(p.error("expected default value"));
    };
    if first.is_punct('(') {
        p.capture_parenthesized()?;
        return Ok(p.slice(first.position, p.previous_end()).to_string());
    }
    if first.is_punct(',') || first.is_punct(')') {
        return Err(p.error("expected default value"));
    }

    // The first token is always part of the value, even `NULL`.
    p.advance();
    p.capture_until(starts_column_constraint)?;
    Ok(p.slice(first.position, p.previous_end()).to_string())
}

/// Parses the clause after `REFERENCES`.
fn parse_references(
    p: &mut Parser<'_>,
    name: Option<String>,
    columns: Vec<String>,
) -> Result<TableConstraint, DdlError> {
    let target_position = p.position();
    let target_table = p.parse_name("referenced table")?;
    let target_columns = if p.check_punct('(') {
        p.parse_key_columns()?.0
    } else {
        Vec::new()
    };

    let mut on_delete = ForeignKeyAction::NoAction;
    let mut on_update = ForeignKeyAction::NoAction;
    loop {
        if p.check_keyword("ON") && !p.peek_nth(1).is_some_and(|t| t.is_keyword("CONFLICT")) {
            p.advance();
            if p.eat_keyword("DELETE") {
                on_delete = parse_action(p)?;
            } else if p.eat_keyword("UPDATE") {
                on_update = parse_action(p)?;
            } else {
                return Err(p.error("expected DELETE or UPDATE after ON"));
            }
        } else if p.eat_keyword("MATCH") {
            p.parse_name("match type")?;
        } else if p.check_keyword("NOT") && p.peek_nth(1).is_some_and(|t| t.is_keyword("DEFERRABLE")) {
            p.advance();
            p.advance();
            parse_initially(p)?;
        } else if p.eat_keyword("DEFERRABLE") {
            parse_initially(p)?;
        } else {
            break;
        }
    }

    if !target_columns.is_empty() && target_columns.len() != columns.len() {
        return Err(p.error_at(
            target_position,
            format!(
                "foreign key has {} column(s) but references {} column(s) of {target_table}",
                columns.len(),
                target_columns.len()
            ),
        ));
    }

    Ok(TableConstraint::ForeignKey {
        name,
        columns,
        target_table,
        target_columns,
        on_delete,
        on_update,
    })
}

fn parse_action(p: &mut Parser<'_>) -> Result<ForeignKeyAction, DdlError> {
    if p.eat_keyword("SET") {
        if p.eat_keyword("NULL") {
            return Ok(ForeignKeyAction::SetNull);
        }
        if p.eat_keyword("DEFAULT") {
            return Ok(ForeignKeyAction::SetDefault);
        }
        return Err(p.error("expected NULL or DEFAULT after SET"));
    }
    if p.eat_keyword("CASCADE") {
        return Ok(ForeignKeyAction::Cascade);
    }
    if p.eat_keyword("RESTRICT") {
        return Ok(ForeignKeyAction::Restrict);
    }
    if p.eat_keyword("NO") {
        p.expect_keyword("ACTION")?;
        return Ok(ForeignKeyAction::NoAction);
    }
    Err(p.error("expected foreign key action"))
}

fn parse_initially(p: &mut Parser<'_>) -> Result<(), DdlError> {
    if p.eat_keyword("INITIALLY") && !(p.eat_keyword("DEFERRED") || p.eat_keyword("IMMEDIATE")) {
        return Err(p.error("expected DEFERRED or IMMEDIATE"));
    }
    Ok(())
}

fn parse_table_constraint(p: &mut Parser<'_>, def: &mut TableDef) -> Result<(), DdlError> {
    let name = if p.eat_keyword("CONSTRAINT") {
        Some(p.parse_name("constraint name")?)
    } else {
        None
    };

    let constraint = if p.eat_keyword("PRIMARY") {
        p.expect_keyword("KEY")?;
        let (columns, autoincrement) = p.parse_key_columns()?;
        p.skip_conflict_clause()?;
        TableConstraint::PrimaryKey {
            name,
            columns,
            autoincrement,
        }
    } else if p.eat_keyword("UNIQUE") {
        let (columns, _) = p.parse_key_columns()?;
        p.skip_conflict_clause()?;
        TableConstraint::Unique { name, columns }
    } else if p.eat_keyword("CHECK") {
        let expression = p.capture_parenthesized()?.to_string();
        TableConstraint::Check { name, expression }
    } else if p.eat_keyword("FOREIGN") {
        p.expect_keyword("KEY")?;
        let (columns, _) = p.parse_key_columns()?;
        p.expect_keyword("REFERENCES")?;
        parse_references(p, name, columns)?
    } else {
        return Err(p.error("expected table constraint"));
    };

    def.constraints.push(constraint);
    Ok(())
}

/// Parses `WITHOUT ROWID` and `STRICT`, comma separated.
fn parse_table_options(p: &mut Parser<'_>, def: &mut TableDef) -> Result<(), DdlError> {
    loop {
        if p.eat_keyword("WITHOUT") {
            if !p.eat_word("ROWID") {
                return Err(p.error("expected ROWID after WITHOUT"));
            }
            def.without_rowid = true;
        } else if p.eat_word("STRICT") {
            def.strict = true;
        } else {
            return Ok(());
        }
        if !p.eat_punct(',') {
            return Ok(());
        }
    }
}

/// Flags columns named by a table-level primary key.
fn mark_primary_key_columns(def: &mut TableDef) {
    let Some(TableConstraint::PrimaryKey {
        columns,
        autoincrement,
        ..
    }) = def
        .constraints
        .iter()
        .find(|c| matches!(c, TableConstraint::PrimaryKey { .. }))
        .cloned()
    else {
        return;
    };

    for column in &mut def.columns {
        if columns.iter().any(|c| c.eq_ignore_ascii_case(&column.name)) {
            column.primary_key = true;
            if autoincrement && columns.len() == 1 {
                column.autoincrement = true;
            }
        }
    }
}
