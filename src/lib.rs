//! Embedded Server-Sent-Events telemetry server
//!
//! Streams JSON snapshots from named handlers to HTTP clients. Each
//! configured stream is served on its own path and paced by its own
//! interval.
//!
//! ```no_run
//! use sse_telemetry::{HandlerRegistry, StreamingConfig, StreamingServer};
//!
//! # async fn example() -> sse_telemetry::Result<()> {
//! let config = StreamingConfig::load("app_config.json")?;
//! let handlers = HandlerRegistry::with_builtin();
//!
//! let mut server = StreamingServer::from_streaming_config(&config, &handlers, ())?;
//! server.start().await?;
//! println!("streaming on {}", server.server_url());
//!
//! tokio::signal::ctrl_c().await?;
//! server.stop().await;
//! server.cleanup()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;

pub use config::{ServerSection, StreamSpec, StreamingConfig};
pub use error::{Error, Result};
pub use handler::{default_handler, handler_fn, Handler, HandlerRegistry};
pub use registry::{HandlerBinding, StreamEntry, StreamTable};
pub use server::{ServerConfig, ServerState, StreamingServer};
pub use stats::StatsSnapshot;
