//! Streaming configuration file
//!
//! The `streaming` section of the application config. It can be loaded on
//! its own or extracted from a complete application config document:
//!
//! ```json
//! {
//!   "streaming": {
//!     "enabled": true,
//!     "server": { "host": "127.0.0.1", "port": 8080, "max_connections": 10 },
//!     "streams": [
//!       { "name": "mem", "endpoint": "/stream/memory",
//!         "handler": "stream_system_memory", "interval_ms": 1000 }
//!     ]
//!   }
//! }
//! ```

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Top-level streaming configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamingConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub streams: Vec<StreamSpec>,
}

/// Listener settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_connections", alias = "maxConnections")]
    pub max_connections: u32,
}

/// One configured stream
#[derive(Debug, Clone, Deserialize)]
pub struct StreamSpec {
    pub name: String,

    pub endpoint: String,

    /// Name of the handler to resolve through the handler registry
    #[serde(alias = "handlerName")]
    pub handler: String,

    #[serde(default = "default_interval_ms", alias = "intervalMs")]
    pub interval_ms: u64,

    #[serde(default = "default_stream_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub description: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> u32 {
    10
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_stream_enabled() -> bool {
    true
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
        }
    }
}

impl ServerSection {
    /// Resolve `host:port` to a socket address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let target = format!("{}:{}", self.host, self.port);
        target
            .to_socket_addrs()
            .map_err(|e| Error::InvalidAddress(format!("{target}: {e}")))?
            .next()
            .ok_or(Error::InvalidAddress(target))
    }
}

impl StreamSpec {
    /// Create an enabled stream spec
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        handler: impl Into<String>,
        interval_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            handler: handler.into(),
            interval_ms,
            enabled: true,
            description: String::new(),
        }
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark the stream disabled
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Pacing interval between frames
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl StreamingConfig {
    /// Parse a JSON document
    ///
    /// Accepts either the streaming object itself or a whole application
    /// config that nests it under a `"streaming"` key.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let section = match value.get("streaming") {
            Some(nested) => nested.clone(),
            None => value,
        };
        Ok(serde_json::from_value(section)?)
    }

    /// Load and parse a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;

        tracing::info!(
            path = %path.display(),
            enabled = config.enabled,
            streams = config.streams.len(),
            "Loaded streaming config"
        );

        Ok(config)
    }

    /// Check values that deserialize fine but cannot be served
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(Error::Config("server host is empty".into()));
        }

        for stream in &self.streams {
            if !stream.endpoint.starts_with('/') {
                return Err(Error::Config(format!(
                    "stream '{}': endpoint '{}' must start with '/'",
                    stream.name, stream.endpoint
                )));
            }
            if stream.interval_ms == 0 {
                return Err(Error::Config(format!(
                    "stream '{}': interval_ms must be greater than zero",
                    stream.name
                )));
            }
        }

        Ok(())
    }

    /// Add a stream (builder style, mostly for tests and embedding)
    pub fn with_stream(mut self, stream: StreamSpec) -> Self {
        self.streams.push(stream);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamingConfig::from_json_str("{}").unwrap();

        assert!(!config.enabled);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.max_connections, 10);
        assert!(config.streams.is_empty());
    }

    #[test]
    fn test_nested_application_config() {
        let json = r#"{
            "app": { "name": "Demo" },
            "window": { "width": 800 },
            "streaming": {
                "enabled": true,
                "server": { "host": "0.0.0.0", "port": 9000, "max_connections": 4 },
                "streams": [
                    { "name": "mem", "endpoint": "/stream/memory",
                      "handler": "stream_system_memory", "interval_ms": 500,
                      "enabled": true, "description": "Memory usage" }
                ]
            }
        }"#;

        let config = StreamingConfig::from_json_str(json).unwrap();

        assert!(config.enabled);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.max_connections, 4);
        assert_eq!(config.streams.len(), 1);

        let stream = &config.streams[0];
        assert_eq!(stream.name, "mem");
        assert_eq!(stream.endpoint, "/stream/memory");
        assert_eq!(stream.handler, "stream_system_memory");
        assert_eq!(stream.interval(), Duration::from_millis(500));
        assert_eq!(stream.description, "Memory usage");
    }

    #[test]
    fn test_camel_case_aliases() {
        let json = r#"{
            "server": { "maxConnections": 2 },
            "streams": [
                { "name": "a", "endpoint": "/a", "handlerName": "h", "intervalMs": 250 }
            ]
        }"#;

        let config = StreamingConfig::from_json_str(json).unwrap();

        assert_eq!(config.server.max_connections, 2);
        assert_eq!(config.streams[0].handler, "h");
        assert_eq!(config.streams[0].interval_ms, 250);
        assert!(config.streams[0].enabled);
    }

    #[test]
    fn test_invalid_json() {
        let result = StreamingConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let config = StreamingConfig::default().with_stream(StreamSpec::new("x", "x", "h", 100));
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = StreamingConfig::default().with_stream(StreamSpec::new("x", "/x", "h", 0));
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_bind_addr() {
        let section = ServerSection {
            host: "127.0.0.1".into(),
            port: 8123,
            max_connections: 1,
        };

        let addr = section.bind_addr().unwrap();
        assert_eq!(addr.port(), 8123);
        assert!(addr.ip().is_loopback());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "sse-telemetry-config-{}.json",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"{ "enabled": true, "streams": [
                { "name": "t", "endpoint": "/t", "handler": "h" } ] }"#,
        )
        .unwrap();

        let config = StreamingConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(config.enabled);
        assert_eq!(config.streams[0].interval_ms, 1000);
    }
}
