//! Stream table
//!
//! Maps HTTP paths to resolved streams. Each configured stream's handler
//! name is resolved once through the [`HandlerRegistry`](crate::handler::HandlerRegistry):
//!
//! ```text
//!   StreamingConfig.streams ──► HandlerRegistry.lookup(handler)
//!                                   │ hit            │ miss
//!                                   ▼                ▼
//!                             Registered        Placeholder (default_handler)
//!                                   └──────┬─────────┘
//!                                          ▼
//!                          StreamTable { endpoint → StreamEntry }
//!                                          │ Arc, read-only
//!                     ┌────────────────────┼────────────────────┐
//!                     ▼                    ▼                    ▼
//!                 [worker]             [worker]             [worker]
//! ```

pub mod entry;
pub mod store;

pub use entry::{HandlerBinding, StreamEntry};
pub use store::StreamTable;
