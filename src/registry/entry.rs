//! Stream entry types
//!
//! A resolved stream: configuration plus the handler it is bound to.

use std::time::Duration;

use crate::handler::Handler;

/// How a stream's handler was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerBinding {
    /// Configured handler name was found in the registry
    Registered,
    /// Handler name unknown, bound to the placeholder handler
    Placeholder,
    /// Stream disabled in configuration, no handler resolved
    Disabled,
}

/// Entry for a single stream in the table
#[derive(Clone)]
pub struct StreamEntry {
    /// Display name, passed to the handler on every invocation
    pub name: String,

    /// HTTP path the stream is served on
    pub endpoint: String,

    /// Pacing between two frames
    pub interval: Duration,

    /// Whether requests are served (disabled streams answer 503)
    pub enabled: bool,

    /// Resolved handler
    pub handler: Handler,

    /// Handler name as written in configuration
    pub handler_name: String,

    /// Resolution outcome
    pub binding: HandlerBinding,

    /// Free-form description
    pub description: String,
}

impl StreamEntry {
    /// Create an enabled entry bound to a registered handler
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        interval: Duration,
        handler: Handler,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            interval,
            enabled: true,
            handler,
            handler_name: String::new(),
            binding: HandlerBinding::Registered,
            description: String::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Invoke the handler for this stream
    pub fn produce(&self) -> String {
        (self.handler)(&self.name)
    }

    /// Whether the entry fell back to the placeholder handler
    pub fn is_placeholder(&self) -> bool {
        self.binding == HandlerBinding::Placeholder
    }
}

impl std::fmt::Debug for StreamEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamEntry")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("interval", &self.interval)
            .field("enabled", &self.enabled)
            .field("handler_name", &self.handler_name)
            .field("binding", &self.binding)
            .field("description", &self.description)
            .finish()
    }
}
