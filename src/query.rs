use std::sync::Arc;

use serde_json::Value;

use crate::context::ContextManager;
use crate::errors::{Result, StateError};
use crate::parser::{ParseError, Parser};
use crate::path::{parse_list_path, resolve_entry, Access};
use crate::value::{is_blank, render_value};

/// Reserved meta property: number of committed transactions.
pub const UPDATE_COUNT: &str = "updateCount";
/// Reserved meta property: current length of the context's default list.
pub const LIST_SIZE: &str = "listSize";

/// A parsed `state` query: which context to read, exactly one of `property`
/// or `list`, and an optional fallback for a single missing value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateQuery {
    pub context: String,
    pub property: Option<String>,
    pub list: Option<String>,
    pub default: Option<String>,
}

impl StateQuery {
    pub fn property(context: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            property: Some(property.into()),
            ..Self::default()
        }
    }

    pub fn list(context: impl Into<String>, list: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            list: Some(list.into()),
            ..Self::default()
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Parse helper arguments, e.g. `context='ctx1' property='v' default='x'`.
    /// Values may be single- or double-quoted, or bare tokens (already
    /// rendered by the surrounding template engine).
    pub fn parse(args: &str) -> Result<Self> {
        let mut query = StateQuery::default();
        let mut p = Parser::new(args);
        loop {
            p.skip_ws();
            if p.eof() {
                break;
            }
            let name = p.parse_identifier().map_err(invalid_query)?;
            p.expect('=').map_err(invalid_query)?;
            let value = match p.peek_char() {
                Some('\'') | Some('"') => p.parse_quoted_string(),
                _ => p.parse_bare(),
            }
            .map_err(invalid_query)?;
            match name.as_str() {
                "context" => query.context = value,
                "property" => query.property = Some(value),
                "list" => query.list = Some(value),
                "default" => query.default = Some(value),
                other => {
                    return Err(StateError::Query(format!("unknown argument '{other}'")));
                }
            }
        }
        Ok(query)
    }
}

fn invalid_query(e: ParseError) -> StateError {
    StateError::Query(format!("invalid state query: {}", e.message()))
}

/// Interprets parsed queries against context snapshots. Read-only: it never
/// touches store state.
pub struct QueryResolver {
    manager: Arc<ContextManager>,
}

impl QueryResolver {
    pub fn new(manager: Arc<ContextManager>) -> Self {
        Self { manager }
    }

    /// Resolve a query to a raw value. Missing data is never an error here
    /// and falls back to the default / empty value rules; only a malformed
    /// query is.
    pub fn resolve(&self, query: &StateQuery) -> Result<Value> {
        if is_blank(&query.context) {
            return Err(StateError::Query("'context' cannot be empty".into()));
        }
        match (&query.property, &query.list) {
            (Some(_), Some(_)) | (None, None) => Err(StateError::Query(
                "Either 'property' or 'list' has to be set".into(),
            )),
            (Some(property), None) => Ok(self.resolve_property(query, property)),
            (None, Some(list)) => self.resolve_list(query, list),
        }
    }

    fn resolve_property(&self, query: &StateQuery, property: &str) -> Value {
        let snapshot = self.manager.get_context_copy(&query.context);
        match property {
            // An existing context always reports its real counters; the
            // default only applies when the context does not exist.
            UPDATE_COUNT => match &snapshot {
                Some(snapshot) => Value::String(snapshot.update_count.to_string()),
                None => fallback(query, "0"),
            },
            LIST_SIZE => match &snapshot {
                Some(snapshot) => {
                    Value::String(snapshot.list(None).map_or(0, Vec::len).to_string())
                }
                None => fallback(query, "0"),
            },
            _ => match snapshot.and_then(|mut s| s.properties.remove(property)) {
                // A stored `null` passes through, distinct from missing.
                Some(value) => value,
                None => fallback(query, ""),
            },
        }
    }

    fn resolve_list(&self, query: &StateQuery, list: &str) -> Result<Value> {
        let path = parse_list_path(list)?;
        let snapshot = self.manager.get_context_copy(&query.context);
        let entries = snapshot.as_ref().and_then(|s| s.list(path.list.as_deref()));
        Ok(match path.access {
            // The full sequence is returned as-is, empty when absent; a
            // default is only meaningful for a single missing field.
            Access::Full => Value::Array(entries.cloned().unwrap_or_default()),
            Access::Entry { index, fields } => entries
                .and_then(|entries| resolve_entry(entries, index, &fields))
                .cloned()
                .unwrap_or_else(|| fallback(query, "")),
        })
    }

    /// Render a query result for template output; failures become the
    /// inline `[ERROR: <message>]` marker instead of aborting the template.
    pub fn render(&self, query: &StateQuery) -> String {
        match self.resolve(query) {
            Ok(value) => render_value(&value),
            Err(e) => format!("[ERROR: {e}]"),
        }
    }

    /// Parse-and-render entry point for template helpers.
    pub fn render_args(&self, args: &str) -> String {
        match StateQuery::parse(args).and_then(|query| self.resolve(&query)) {
            Ok(value) => render_value(&value),
            Err(e) => format!("[ERROR: {e}]"),
        }
    }
}

fn fallback(query: &StateQuery, builtin: &str) -> Value {
    Value::String(query.default.clone().unwrap_or_else(|| builtin.to_string()))
}
