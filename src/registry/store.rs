//! Stream table implementation
//!
//! Built once from configuration before the server starts, then shared
//! read-only (behind an `Arc`) by every connection worker. No lock is
//! needed because nothing mutates it after construction.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{StreamSpec, StreamingConfig};
use crate::handler::{default_handler, handler_fn, Handler, HandlerRegistry};

use super::entry::{HandlerBinding, StreamEntry};

/// Endpoint → stream table
#[derive(Debug, Default, Clone)]
pub struct StreamTable {
    streams: HashMap<String, StreamEntry>,
}

impl StreamTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every configured stream against `handlers`
    ///
    /// Unknown handler names are bound to the placeholder handler.
    /// Disabled streams are kept (so they can answer 503) but no handler is
    /// resolved for them, and they never displace an enabled stream on the
    /// same endpoint.
    pub fn from_config(config: &StreamingConfig, handlers: &HandlerRegistry) -> Self {
        let mut table = Self::new();

        tracing::info!(streams = config.streams.len(), "Registering configured streams");

        for spec in &config.streams {
            if !spec.enabled {
                if let Some(live) = table.get(&spec.endpoint).filter(|e| e.enabled) {
                    tracing::warn!(
                        endpoint = %spec.endpoint,
                        current = %live.name,
                        ignored = %spec.name,
                        "Duplicate endpoint, disabled stream ignored"
                    );
                    continue;
                }
            }
            table.insert(Self::resolve(spec, handlers));
        }

        let placeholders = table.placeholder_streams().len();
        tracing::info!(
            registered = table.len(),
            placeholders = placeholders,
            "Stream table built"
        );

        table
    }

    fn resolve(spec: &StreamSpec, handlers: &HandlerRegistry) -> StreamEntry {
        let (handler, binding) = if !spec.enabled {
            tracing::info!(stream = %spec.name, "Stream disabled in config");
            (handler_fn(default_handler), HandlerBinding::Disabled)
        } else if let Some(handler) = handlers.lookup(&spec.handler) {
            (handler, HandlerBinding::Registered)
        } else {
            tracing::warn!(
                stream = %spec.name,
                handler = %spec.handler,
                "No handler found, using placeholder handler"
            );
            (handler_fn(default_handler), HandlerBinding::Placeholder)
        };

        tracing::debug!(
            endpoint = %spec.endpoint,
            stream = %spec.name,
            handler = %spec.handler,
            interval_ms = spec.interval_ms,
            "Resolved stream"
        );

        StreamEntry {
            name: spec.name.clone(),
            endpoint: spec.endpoint.clone(),
            interval: spec.interval(),
            enabled: spec.enabled,
            handler,
            handler_name: spec.handler.clone(),
            binding,
            description: spec.description.clone(),
        }
    }

    /// Insert an entry keyed by its endpoint
    ///
    /// A duplicate endpoint replaces the earlier entry, which is returned.
    pub fn insert(&mut self, entry: StreamEntry) -> Option<StreamEntry> {
        let endpoint = entry.endpoint.clone();
        let new_name = entry.name.clone();
        let replaced = self.streams.insert(endpoint.clone(), entry);

        if let Some(ref old) = replaced {
            tracing::warn!(
                endpoint = %endpoint,
                previous = %old.name,
                current = %new_name,
                "Duplicate endpoint, previous stream replaced"
            );
        }

        replaced
    }

    /// Register a stream programmatically with an explicit handler
    pub fn register(
        &mut self,
        name: impl Into<String>,
        endpoint: impl Into<String>,
        interval: std::time::Duration,
        handler: Handler,
        description: impl Into<String>,
    ) -> Option<StreamEntry> {
        let entry =
            StreamEntry::new(name, endpoint, interval, handler).with_description(description);
        self.insert(entry)
    }

    /// Look up the stream served at `endpoint`
    pub fn get(&self, endpoint: &str) -> Option<&StreamEntry> {
        self.streams.get(endpoint)
    }

    /// Number of streams
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Iterate over all entries (unordered)
    pub fn iter(&self) -> impl Iterator<Item = &StreamEntry> {
        self.streams.values()
    }

    /// All endpoints, sorted
    pub fn endpoints(&self) -> Vec<&str> {
        let mut endpoints: Vec<&str> = self.streams.keys().map(String::as_str).collect();
        endpoints.sort_unstable();
        endpoints
    }

    /// Enabled streams running on the placeholder handler
    pub fn placeholder_streams(&self) -> Vec<&StreamEntry> {
        self.streams.values().filter(|e| e.is_placeholder()).collect()
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.streams.clear();
    }

    /// Freeze the table for sharing across workers
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry.register("known", |name: &str| {
            format!("{{\"stream\":\"{name}\",\"ok\":true}}")
        });
        registry
    }

    #[test]
    fn test_from_config_resolves_handlers() {
        let config = StreamingConfig::default()
            .with_stream(StreamSpec::new("a", "/a", "known", 100).description("first"));

        let table = StreamTable::from_config(&config, &registry());
        let entry = table.get("/a").unwrap();

        assert_eq!(entry.name, "a");
        assert_eq!(entry.interval, Duration::from_millis(100));
        assert_eq!(entry.binding, HandlerBinding::Registered);
        assert_eq!(entry.description, "first");
        assert_eq!(entry.produce(), "{\"stream\":\"a\",\"ok\":true}");
    }

    #[test]
    fn test_unknown_handler_uses_placeholder() {
        let config =
            StreamingConfig::default().with_stream(StreamSpec::new("mem", "/mem", "nope", 100));

        let table = StreamTable::from_config(&config, &registry());
        let entry = table.get("/mem").unwrap();

        assert!(entry.enabled);
        assert!(entry.is_placeholder());
        assert_eq!(table.placeholder_streams().len(), 1);

        let value: serde_json::Value = serde_json::from_str(&entry.produce()).unwrap();
        assert_eq!(value["status"], "placeholder");
        assert_eq!(value["stream"], "mem");
    }

    #[test]
    fn test_disabled_stream_kept_but_disabled() {
        let config = StreamingConfig::default()
            .with_stream(StreamSpec::new("off", "/off", "known", 100).disabled());

        let table = StreamTable::from_config(&config, &registry());
        let entry = table.get("/off").unwrap();

        assert!(!entry.enabled);
        assert_eq!(entry.binding, HandlerBinding::Disabled);
        assert!(table.placeholder_streams().is_empty());
    }

    #[test]
    fn test_duplicate_endpoint_last_wins() {
        let config = StreamingConfig::default()
            .with_stream(StreamSpec::new("first", "/dup", "known", 100))
            .with_stream(StreamSpec::new("second", "/dup", "known", 200));

        let table = StreamTable::from_config(&config, &registry());

        assert_eq!(table.len(), 1);
        assert_eq!(table.get("/dup").unwrap().name, "second");
    }

    #[test]
    fn test_disabled_duplicate_keeps_enabled_stream() {
        let config = StreamingConfig::default()
            .with_stream(StreamSpec::new("live", "/dup", "known", 100))
            .with_stream(StreamSpec::new("old", "/dup", "known", 100).disabled());

        let table = StreamTable::from_config(&config, &registry());
        let entry = table.get("/dup").unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(entry.name, "live");
        assert!(entry.enabled);
        assert_eq!(entry.binding, HandlerBinding::Registered);
    }

    #[test]
    fn test_enabled_duplicate_replaces_disabled_stream() {
        let config = StreamingConfig::default()
            .with_stream(StreamSpec::new("old", "/dup", "known", 100).disabled())
            .with_stream(StreamSpec::new("live", "/dup", "known", 100));

        let table = StreamTable::from_config(&config, &registry());
        let entry = table.get("/dup").unwrap();

        assert_eq!(entry.name, "live");
        assert!(entry.enabled);
    }

    #[test]
    fn test_insert_returns_replaced() {
        let mut table = StreamTable::new();
        let handler = handler_fn(default_handler);

        assert!(table
            .register("one", "/x", Duration::from_millis(10), handler.clone(), "")
            .is_none());
        let replaced = table
            .register("two", "/x", Duration::from_millis(10), handler, "")
            .unwrap();

        assert_eq!(replaced.name, "one");
    }

    #[test]
    fn test_endpoints_sorted() {
        let config = StreamingConfig::default()
            .with_stream(StreamSpec::new("b", "/b", "known", 100))
            .with_stream(StreamSpec::new("a", "/a", "known", 100));

        let table = StreamTable::from_config(&config, &registry());
        assert_eq!(table.endpoints(), vec!["/a", "/b"]);
    }

    #[test]
    fn test_lookup_miss_and_clear() {
        let config =
            StreamingConfig::default().with_stream(StreamSpec::new("a", "/a", "known", 100));
        let mut table = StreamTable::from_config(&config, &registry());

        assert!(table.get("/missing").is_none());
        assert!(table.get("/a/").is_none());

        table.clear();
        assert!(table.is_empty());
    }
}
