//! Stream handlers
//!
//! A handler produces one JSON snapshot per invocation for a named stream.
//! Handlers are looked up by the name used in the configuration file; a
//! name with no registered implementation falls back to
//! [`default_handler`], which emits a `"status":"placeholder"` payload so a
//! misconfigured stream stays visible instead of breaking the server.

pub mod builtin;
pub mod registry;

use std::sync::Arc;

pub use registry::HandlerRegistry;

/// Handler function: stream name in, single-line JSON payload out
pub type Handler = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Message carried by placeholder payloads
pub const PLACEHOLDER_MESSAGE: &str =
    "This is a default handler. Implement a custom handler for this stream.";

/// Fallback handler for streams whose configured handler is not registered
pub fn default_handler(stream_name: &str) -> String {
    serde_json::json!({
        "timestamp": chrono::Utc::now().timestamp(),
        "stream": stream_name,
        "status": "placeholder",
        "message": PLACEHOLDER_MESSAGE,
    })
    .to_string()
}

/// Wrap a closure or function into a [`Handler`]
pub fn handler_fn<F>(f: F) -> Handler
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_handler_payload() {
        let payload = default_handler("mem");
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(value["stream"], "mem");
        assert_eq!(value["status"], "placeholder");
        assert_eq!(value["message"], PLACEHOLDER_MESSAGE);
        assert!(value["timestamp"].as_i64().unwrap() > 0);
        assert!(!payload.contains('\n'));
    }

    #[test]
    fn test_default_handler_escapes_name() {
        let payload = default_handler("we\"ird\nname");
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(value["stream"], "we\"ird\nname");
        assert!(!payload.contains('\n'));
    }
}
