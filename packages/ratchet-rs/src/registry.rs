//! Step registry: named, independently invokable units of work.
//!
//! Handlers are registered once at startup and dispatched by name when the
//! executor reaches their step. A handler receives the shared application
//! dependencies, the attempt's identity ([`StepContext`]), and its input
//! ([`StepInput`]), and settles with a JSON value or a classified
//! [`StepError`].
//!
//! # At-Least-Once
//!
//! The engine may invoke a handler more than once for the same step (retry
//! after a transient failure, resume after a crash). Handlers with external
//! side effects must be safe to repeat: find-or-create by workflow id, never
//! blind insert.
//!
//! # Example
//!
//! ```ignore
//! let mut registry = StepRegistry::new();
//! registry.register("site:scrape", |deps: Arc<Deps>, ctx, input| async move {
//!     let url = input.args["site_url"].as_str().unwrap_or_default().to_string();
//!     let page = deps.scraper.scrape(&url).await.map_err(classify)?;
//!     Ok(serde_json::to_value(page).unwrap_or(Value::Null))
//! });
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::core::{StepContext, StepError, StepInput};

/// Type-erased step handler.
pub type StepFn<D> = Arc<
    dyn Fn(Arc<D>, StepContext, StepInput) -> BoxFuture<'static, Result<Value, StepError>>
        + Send
        + Sync,
>;

/// Catalog of named step handlers for one application.
///
/// Registration is a startup concern; dispatch is the hot path. An unknown
/// name at dispatch time is a permanent failure (retrying cannot register
/// the step), while a duplicate registration is a wiring bug and panics.
pub struct StepRegistry<D> {
    handlers: HashMap<&'static str, StepFn<D>>,
}

impl<D: Send + Sync + 'static> Default for StepRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Send + Sync + 'static> StepRegistry<D> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a step handler under a stable name.
    ///
    /// The name is the durable identity of the step: it appears in journal
    /// entries and must not change once workflows reference it.
    ///
    /// # Panics
    ///
    /// Panics if a handler is already registered under this name.
    pub fn register<F, Fut>(&mut self, name: &'static str, handler: F)
    where
        F: Fn(Arc<D>, StepContext, StepInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, StepError>> + Send + 'static,
    {
        if self.handlers.contains_key(name) {
            panic!("step already registered: {}", name);
        }
        self.handlers.insert(
            name,
            Arc::new(move |deps, ctx, input| Box::pin(handler(deps, ctx, input))),
        );
    }

    /// Invoke the handler registered under `name`.
    pub async fn dispatch(
        &self,
        name: &str,
        deps: Arc<D>,
        ctx: StepContext,
        input: StepInput,
    ) -> Result<Value, StepError> {
        match self.handlers.get(name) {
            Some(handler) => handler(deps, ctx, input).await,
            None => Err(StepError::permanent(format!(
                "no step registered for name: {}",
                name
            ))),
        }
    }

    /// Check if a step name is registered.
    pub fn has(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Number of registered steps.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<D> std::fmt::Debug for StepRegistry<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("registered_steps", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
