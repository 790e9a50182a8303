use db_schema_core::{TriggerEvent, TriggerTiming};
use tracing::debug;

use super::Parser;
use super::ast::TriggerDef;
use crate::error::DdlError;
use crate::tokenizer::Token;

fn event_of(token: &Token<'_>) -> Option<TriggerEvent> {
    if token.is_keyword("INSERT") {
        Some(TriggerEvent::Insert)
    } else if token.is_keyword("UPDATE") {
        Some(TriggerEvent::Update)
    } else if token.is_keyword("DELETE") {
        Some(TriggerEvent::Delete)
    } else {
        None
    }
}

fn timing_of(token: &Token<'_>) -> Option<TriggerTiming> {
    if token.is_keyword("BEFORE") {
        Some(TriggerTiming::Before)
    } else if token.is_keyword("AFTER") {
        Some(TriggerTiming::After)
    } else if token.is_keyword("INSTEAD") {
        Some(TriggerTiming::InsteadOf)
    } else {
        None
    }
}

pub(super) fn parse_trigger(p: &mut Parser<'_>) -> Result<TriggerDef, DdlError> {
    p.expect_keyword("CREATE")?;
    let temporary = p.eat_keyword("TEMP") || p.eat_keyword("TEMPORARY");
    p.expect_keyword("TRIGGER")?;
    let if_not_exists = p.parse_if_not_exists()?;
    let (schema, name) = p.parse_qualified_name("trigger name")?;

    // The header runs up to the first ON; nothing in the body is scanned.
    let header_start = p.pos;
    let Some(on_index) = p.tokens[header_start..]
        .iter()
        .position(|t| t.is_keyword("ON"))
        .map(|offset| header_start + offset)
    else {
        return Err(p.error_at(p.sql.len(), "expected ON <table> in trigger header"));
    };
    let header = &p.tokens[header_start..on_index];
    let header_text = match (header.first(), header.last()) {
        (Some(first), Some(last)) => &p.sql[first.position..last.end()],
        _ => "",
    };
    let table_hint = p
        .tokens
        .get(on_index + 1)
        .map_or_else(String::new, |t| t.value().into_owned());

    let (timing, event_from) = match header.first().and_then(event_of) {
        Some(_) => (TriggerTiming::After, 0),
        None => match header
            .iter()
            .enumerate()
            .find_map(|(i, t)| timing_of(t).map(|timing| (timing, i + 1)))
        {
            Some(found) => found,
            None => {
                return Err(p.unsupported(format!(
                    "trigger on '{table_hint}' has no recognisable timing in header '{header_text}'"
                )));
            }
        },
    };

    let Some((event_index, event)) = header
        .iter()
        .enumerate()
        .skip(event_from)
        .find_map(|(i, t)| event_of(t).map(|event| (i, event)))
    else {
        return Err(p.unsupported(format!(
            "trigger on '{table_hint}' has no recognisable event in header '{header_text}'"
        )));
    };

    let mut update_columns = Vec::new();
    if event == TriggerEvent::Update
        && header.get(event_index + 1).is_some_and(|t| t.is_keyword("OF"))
    {
        update_columns = header[event_index + 2..]
            .iter()
            .filter(|t| !t.is_punct(','))
            .map(|t| t.value().into_owned())
            .collect();
    }

    p.pos = on_index + 1;
    let (_, table) = p.parse_qualified_name("table name")?;

    let for_each_row = if p.eat_keyword("FOR") {
        p.expect_keyword("EACH")?;
        p.expect_keyword("ROW")?;
        true
    } else {
        false
    };

    let when = if p.eat_keyword("WHEN") {
        let text = p.capture_until(|t| t.is_keyword("BEGIN"))?;
        if text.is_empty() {
            return Err(p.error("expected condition after WHEN"));
        }
        Some(text.to_string())
    } else {
        None
    };

    let begin = p.expect_keyword("BEGIN")?;
    let Some(end_index) = p.tokens[p.pos..]
        .iter()
        .rposition(|t| t.is_keyword("END"))
        .map(|offset| p.pos + offset)
    else {
        return Err(p.error_at(p.sql.len(), "expected END after trigger body"));
    };
    let body = p.slice(begin.end(), p.tokens[end_index].position).to_string();
    if body.is_empty() {
        return Err(p.error_at(begin.end(), "empty trigger body"));
    }
    p.pos = end_index + 1;
    p.expect_end()?;

    debug!(trigger = %name, table = %table, %timing, %event, "Parsed CREATE TRIGGER");
    Ok(TriggerDef {
        schema,
        name,
        temporary,
        if_not_exists,
        table,
        timing,
        event,
        update_columns,
        for_each_row,
        when,
        body,
    })
}
