use serde_json::Value;

use crate::errors::{Result, StateError};
use crate::parser::Parser;

/// Parsed list reference from a `list='...'` query argument.
///
/// `[0].listValue` addresses a field of the first entry of the default list,
/// `[-1]` the whole last entry, `events[2].id` a field of the third entry of
/// the named list `events`. A path with no index qualifier requests the full
/// ordered sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPath {
    /// Named list; `None` addresses the context's default list.
    pub list: Option<String>,
    pub access: Access,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    /// The entire ordered sequence of entries.
    Full,
    /// One entry by position, optionally narrowed to a nested field.
    Entry { index: i64, fields: Vec<String> },
}

pub fn parse_list_path(input: &str) -> Result<ListPath> {
    parse_inner(input.trim())
        .map_err(|e| StateError::Query(format!("invalid list path: {}", e.message())))
}

fn parse_inner(input: &str) -> std::result::Result<ListPath, crate::parser::ParseError> {
    let mut p = Parser::new(input);
    let list = match p.peek_char() {
        Some(c) if c == '_' || c.is_ascii_alphanumeric() => Some(p.parse_identifier()?),
        _ => None,
    };
    if p.eof() {
        return Ok(ListPath { list, access: Access::Full });
    }
    p.expect('[')?;
    let index = p.parse_int()?;
    p.expect(']')?;
    let mut fields = Vec::new();
    while p.consume_char('.') {
        fields.push(p.parse_identifier()?);
    }
    if !p.eof() {
        return Err("trailing input".to_string().into());
    }
    Ok(ListPath { list, access: Access::Entry { index, fields } })
}

/// Translate a possibly-negative position into a vector index.
/// Out of range is a miss, not an error.
pub fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let resolved = if index < 0 { len as i64 + index } else { index };
    if (0..len as i64).contains(&resolved) {
        Some(resolved as usize)
    } else {
        None
    }
}

/// Select one entry by position and walk the field path into it.
pub fn resolve_entry<'a>(entries: &'a [Value], index: i64, fields: &[String]) -> Option<&'a Value> {
    let mut current = entries.get(resolve_index(entries.len(), index)?)?;
    for field in fields {
        current = current.get(field)?;
    }
    Some(current)
}
