//! Streaming server
//!
//! One accept task plus one worker task per accepted connection:
//!
//! ```text
//!   StreamingServer::start()
//!        │ bind + listen(backlog)
//!        ▼
//!   [accept task] ──accept()──► ConnectionSet.insert(record)
//!        │                              │
//!        │ spawn                        │ drained and joined by stop()
//!        ▼                              ▼
//!   [worker] read request ─► 400/404/405/503 ─► close
//!        │ 200 + SSE headers
//!        └─► loop { handler() ─► "event: data" frame ─► wait(interval) }
//!               ends on peer EOF/error, write failure or shutdown
//! ```

pub mod config;
pub mod connection;
pub mod connections;
pub mod listener;
pub mod state;

pub use config::ServerConfig;
pub use connection::{ConnectionOutcome, StreamEnd};
pub use connections::{ConnectionRecord, ConnectionSet};
pub use listener::StreamingServer;
pub use state::ServerState;
