use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::errors::{Result, StateError};
use crate::render::TemplateRenderer;
use crate::store::StateStore;
use crate::transaction::{Mutation, Position, TransactionManager};
use crate::value::is_blank;

/// Name under which trigger configurations and queries without an explicit
/// list name address a context's list.
pub const DEFAULT_LIST: &str = "list";

/// The state a set of related requests shares, keyed by context name.
///
/// `properties` and `lists` are distinct namespaces: list access always
/// carries an index path, so a property and a list of the same name cannot
/// collide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    pub name: String,
    pub properties: HashMap<String, Value>,
    pub lists: HashMap<String, Vec<Value>>,
    /// Incremented once per committed transaction, not once per property.
    pub update_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_written_at: DateTime<Utc>,
}

impl ContextSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            properties: HashMap::new(),
            lists: HashMap::new(),
            update_count: 0,
            created_at: now,
            last_written_at: now,
        }
    }

    /// Entries of the named list, or of the default list when `None`.
    pub fn list(&self, name: Option<&str>) -> Option<&Vec<Value>> {
        self.lists.get(name.unwrap_or(DEFAULT_LIST))
    }

    pub(crate) fn apply(&mut self, mutation: &Mutation) {
        match mutation {
            Mutation::SetProperty { name, value } => {
                self.properties.insert(name.clone(), value.clone());
            }
            Mutation::PushEntry { list, position, entry } => {
                let entries = self.lists.entry(list.clone()).or_default();
                match position {
                    Position::First => entries.insert(0, entry.clone()),
                    Position::Last => entries.push(entry.clone()),
                }
            }
        }
    }
}

/// Trigger configuration, decided once at the boundary so the manager can
/// match exhaustively instead of probing map shapes at runtime.
///
/// Raw parameter shapes: `{context, state: {...}}` records properties,
/// `{context, list: {addFirst|addLast: {...}}}` appends a list entry,
/// `{context}` alone deletes the context. `context` and all map values are
/// template strings, rendered against the triggering event's model.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerConfig {
    Record {
        context: String,
        properties: BTreeMap<String, String>,
    },
    Append {
        context: String,
        position: Position,
        entry: BTreeMap<String, String>,
    },
    Delete {
        context: String,
    },
}

impl TriggerConfig {
    pub fn from_parameters(parameters: &Value) -> Result<Self> {
        let config = parameters
            .as_object()
            .ok_or_else(|| StateError::Configuration("parameters must be an object".into()))?;
        let context = config
            .get("context")
            .and_then(Value::as_str)
            .filter(|s| !is_blank(s))
            .ok_or_else(|| StateError::Configuration("no context specified".into()))?
            .to_string();

        match (config.get("state"), config.get("list")) {
            (Some(_), Some(_)) => Err(StateError::Configuration(
                "'state' and 'list' cannot be combined".into(),
            )),
            (Some(state), None) => Ok(TriggerConfig::Record {
                context,
                properties: template_map(state, "no state specified")?,
            }),
            (None, Some(list)) => {
                let ops = list
                    .as_object()
                    .ok_or_else(|| StateError::Configuration("no list entry specified".into()))?;
                let (position, entry) = match (ops.get("addFirst"), ops.get("addLast")) {
                    (Some(entry), None) => (Position::First, entry),
                    (None, Some(entry)) => (Position::Last, entry),
                    _ => {
                        return Err(StateError::Configuration(
                            "list requires exactly one of 'addFirst' or 'addLast'".into(),
                        ))
                    }
                };
                Ok(TriggerConfig::Append {
                    context,
                    position,
                    entry: template_map(entry, "no list entry specified")?,
                })
            }
            (None, None) => Ok(TriggerConfig::Delete { context }),
        }
    }
}

fn template_map(value: &Value, empty_message: &str) -> Result<BTreeMap<String, String>> {
    let map = value
        .as_object()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| StateError::Configuration(empty_message.into()))?;
    map.iter()
        .map(|(name, template)| {
            let template = template.as_str().ok_or_else(|| {
                StateError::Configuration(format!("template for '{name}' must be a string"))
            })?;
            Ok((name.clone(), template.to_string()))
        })
        .collect()
}

/// Owns all context mutation. Every write goes through one transaction, so
/// multi-property records are all-or-nothing and the update counter moves
/// once per call.
pub struct ContextManager {
    store: Arc<StateStore>,
    transactions: Arc<TransactionManager>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl ContextManager {
    pub fn new(
        store: Arc<StateStore>,
        transactions: Arc<TransactionManager>,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        Self {
            store,
            transactions,
            renderer,
        }
    }

    /// Boundary entry for a decoded trigger: resolve the context name
    /// template first, then dispatch. A blank resolved name always rejects
    /// the event, never silently ignores it.
    pub fn apply(&self, config: &TriggerConfig, model: &Value) -> Result<()> {
        match config {
            TriggerConfig::Record { context, properties } => {
                let context = self.resolve_context(context, model)?;
                self.record_properties(&context, properties, model)
            }
            TriggerConfig::Append { context, position, entry } => {
                let context = self.resolve_context(context, model)?;
                self.append_to_list(&context, DEFAULT_LIST, entry, *position, model)
            }
            TriggerConfig::Delete { context } => {
                let context = self.resolve_context(context, model)?;
                self.delete_context(&context)
            }
        }
    }

    /// Render every template and write the results into the context as a
    /// single transaction. Creates the context if absent.
    pub fn record_properties(
        &self,
        context: &str,
        templates: &BTreeMap<String, String>,
        model: &Value,
    ) -> Result<()> {
        self.require_context(context)?;
        if templates.is_empty() {
            return Err(StateError::Configuration("no state specified".into()));
        }
        let mut txn = self.transactions.begin(context);
        for (name, template) in templates {
            txn.stage(Mutation::SetProperty {
                name: name.clone(),
                value: Value::String(self.renderer.render(template, model)),
            });
        }
        self.transactions.commit(txn);
        info!(context, properties = %templates.keys().join(", "), "recorded state");
        Ok(())
    }

    /// Render one entry object and push it at the requested end of the
    /// named list, as a single transaction.
    pub fn append_to_list(
        &self,
        context: &str,
        list: &str,
        entry_templates: &BTreeMap<String, String>,
        position: Position,
        model: &Value,
    ) -> Result<()> {
        self.require_context(context)?;
        if entry_templates.is_empty() {
            return Err(StateError::Configuration("no list entry specified".into()));
        }
        let entry: serde_json::Map<String, Value> = entry_templates
            .iter()
            .map(|(field, template)| {
                (
                    field.clone(),
                    Value::String(self.renderer.render(template, model)),
                )
            })
            .collect();
        let mut txn = self.transactions.begin(context);
        txn.stage(Mutation::PushEntry {
            list: list.to_string(),
            position,
            entry: Value::Object(entry),
        });
        self.transactions.commit(txn);
        info!(context, list, ?position, "appended list entry");
        Ok(())
    }

    /// Remove the context immediately, regardless of TTL. Idempotent: no
    /// error when it does not exist.
    pub fn delete_context(&self, context: &str) -> Result<()> {
        self.require_context(context)?;
        self.store.delete(context);
        info!(context, "deleted context");
        Ok(())
    }

    /// Read-only snapshot for the query resolver and for inspection.
    pub fn get_context_copy(&self, context: &str) -> Option<ContextSnapshot> {
        self.store.get(context)
    }

    fn resolve_context(&self, template: &str, model: &Value) -> Result<String> {
        let context = self.renderer.render(template, model);
        self.require_context(&context)?;
        Ok(context)
    }

    fn require_context(&self, context: &str) -> Result<()> {
        if is_blank(context) {
            return Err(StateError::Configuration("context is blank".into()));
        }
        Ok(())
    }
}
