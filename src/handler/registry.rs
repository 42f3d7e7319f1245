//! Handler registry
//!
//! Maps handler names (as they appear in configuration) to handler
//! functions. Populated before the stream table is built and not touched
//! afterwards, so it needs no interior locking.

use std::collections::HashMap;

use super::{builtin, handler_fn, Handler};

/// Name → handler table
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the stock handlers
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Register a handler under `name`
    ///
    /// Registering an existing name replaces the previous handler.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.register_handler(name, handler_fn(handler));
    }

    /// Register an already shared handler
    pub fn register_handler(&mut self, name: impl Into<String>, handler: Handler) {
        let name = name.into();
        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::warn!(handler = %name, "Handler re-registered, previous one replaced");
        } else {
            tracing::debug!(handler = %name, "Handler registered");
        }
    }

    /// Look up a handler by exact name
    pub fn lookup(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).cloned()
    }

    /// Check whether a handler is registered
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered handler names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Drop every registered handler
    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
