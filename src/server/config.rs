//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::config::StreamingConfig;
use crate::error::Result;

/// Listen backlog used when neither a backlog nor a connection cap is set
pub const DEFAULT_LISTEN_BACKLOG: u32 = 128;

/// Size of the single read that must contain the request line
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Listen backlog (0 = derive from `max_connections`)
    pub listen_backlog: u32,

    /// Buffer for the one read that carries the request line
    pub read_buffer_size: usize,

    /// How long a new connection may take to send its request line
    pub request_timeout: Duration,

    /// Enable TCP_NODELAY so small SSE frames are not delayed
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            max_connections: 0, // Unlimited
            listen_backlog: 0,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            request_timeout: Duration::from_secs(10),
            tcp_nodelay: true,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Derive from the `server` section of a streaming config
    pub fn from_streaming(config: &StreamingConfig) -> Result<Self> {
        Ok(Self {
            bind_addr: config.server.bind_addr()?,
            max_connections: config.server.max_connections as usize,
            ..Default::default()
        })
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the listen backlog
    pub fn listen_backlog(mut self, backlog: u32) -> Self {
        self.listen_backlog = backlog;
        self
    }

    /// Set the request read buffer size
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(64);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Backlog actually passed to `listen`
    pub fn effective_backlog(&self) -> u32 {
        if self.listen_backlog > 0 {
            self.listen_backlog
        } else if self.max_connections > 0 {
            u32::try_from(self.max_connections).unwrap_or(u32::MAX)
        } else {
            DEFAULT_LISTEN_BACKLOG
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamSpec;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8080);
        assert!(config.bind_addr.ip().is_loopback());
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert!(config.tcp_nodelay);
        assert_eq!(config.effective_backlog(), DEFAULT_LISTEN_BACKLOG);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 9001);
    }

    #[test]
    fn test_from_streaming() {
        let mut streaming = StreamingConfig::default()
            .with_stream(StreamSpec::new("m", "/m", "h", 1000));
        streaming.server.port = 9100;
        streaming.server.max_connections = 3;

        let config = ServerConfig::from_streaming(&streaming).unwrap();

        assert_eq!(config.bind_addr.port(), 9100);
        assert_eq!(config.max_connections, 3);
        assert_eq!(config.effective_backlog(), 3);
    }

    #[test]
    fn test_explicit_backlog_wins() {
        let config = ServerConfig::default().max_connections(5).listen_backlog(64);
        assert_eq!(config.effective_backlog(), 64);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .read_buffer_size(1024)
            .request_timeout(Duration::from_millis(250))
            .tcp_nodelay(false);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.read_buffer_size, 1024);
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert!(!config.tcp_nodelay);
    }

    #[test]
    fn test_read_buffer_size_floor() {
        let config = ServerConfig::default().read_buffer_size(1);
        assert_eq!(config.read_buffer_size, 64);
    }
}
