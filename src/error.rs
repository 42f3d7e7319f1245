//! Error types
//!
//! Crate-wide error type for configuration loading and server lifecycle.

use std::net::SocketAddr;

use thiserror::Error;

use crate::server::ServerState;

/// Errors returned by the streaming server and its configuration layer
#[derive(Error, Debug)]
pub enum Error {
    /// Generic I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Creating, binding or listening on the server socket failed
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Host/port pair does not resolve to a socket address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Configuration is structurally valid JSON but semantically wrong
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation not permitted in the current lifecycle state
    #[error("Operation '{operation}' not allowed in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: ServerState,
    },
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
