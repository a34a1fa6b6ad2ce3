//! Context state for stateful request mocking.
//!
//! A mock server is normally stateless: every request is answered from its
//! stub alone. This crate lets a triggering event (request matched, response
//! about to be served) record named properties and ordered lists under a
//! *context*, and lets later responses read them back through a small query
//! surface, including derived meta values (`updateCount`, `listSize`) and
//! negative list indices.
//!
//! ```
//! use mock_state::StateExtension;
//! use serde_json::json;
//!
//! let ext = StateExtension::with_defaults();
//! ext.on_serve_event(
//!     &json!({"context": "ctx1", "state": {"v": "{{request.body.value}}"}}),
//!     &json!({"request": {"body": {"value": "X"}}}),
//! )
//! .unwrap();
//!
//! assert_eq!(ext.render_state("context='ctx1' property='v'"), "X");
//! assert_eq!(ext.render_state("context='ctx1' property='updateCount'"), "1");
//! ```

pub mod context;
pub mod errors;
pub mod path;
pub mod query;
pub mod render;
pub mod store;
pub mod transaction;
pub mod value;

mod parser;

use std::sync::Arc;

use serde_json::Value;

use context::{ContextManager, TriggerConfig};
use errors::Result;
use query::QueryResolver;
use render::{PathRenderer, TemplateRenderer};
use store::{StateStore, StoreConfig};
use transaction::TransactionManager;

pub use context::{ContextSnapshot, DEFAULT_LIST};
pub use errors::StateError;
pub use query::{StateQuery, LIST_SIZE, UPDATE_COUNT};
pub use store::StoreConfig as Config;
pub use transaction::Position;

/// Constructs the state services once and wires them together: the store
/// owns all records, the transaction manager serializes writers per context,
/// the context manager is the only mutation path, and the resolver only ever
/// reads snapshots.
pub struct StateExtension {
    manager: Arc<ContextManager>,
    resolver: QueryResolver,
}

impl StateExtension {
    pub fn new(config: StoreConfig, renderer: Arc<dyn TemplateRenderer>) -> Self {
        let store = Arc::new(StateStore::new(config));
        let transactions = Arc::new(TransactionManager::new(Arc::clone(&store)));
        let manager = Arc::new(ContextManager::new(store, transactions, renderer));
        let resolver = QueryResolver::new(Arc::clone(&manager));
        Self { manager, resolver }
    }

    /// Default store TTL and the built-in placeholder renderer.
    pub fn with_defaults() -> Self {
        Self::new(StoreConfig::default(), Arc::new(PathRenderer))
    }

    /// Post-serve hook: decode the raw trigger parameters and apply the
    /// mutation as one transaction against the target context.
    pub fn on_serve_event(&self, parameters: &Value, model: &Value) -> Result<()> {
        let config = TriggerConfig::from_parameters(parameters)?;
        self.manager.apply(&config, model)
    }

    /// Template-helper hook: resolve a `state` query such as
    /// `context='ctx1' property='v' default='fallback'`. Malformed queries
    /// render inline as `[ERROR: <message>]`.
    pub fn render_state(&self, args: &str) -> String {
        self.resolver.render_args(args)
    }

    pub fn manager(&self) -> &ContextManager {
        &self.manager
    }

    pub fn resolver(&self) -> &QueryResolver {
        &self.resolver
    }
}

impl Default for StateExtension {
    fn default() -> Self {
        Self::with_defaults()
    }
}
