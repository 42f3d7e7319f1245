//! Wire protocol: HTTP request line, error responses and SSE frames

pub mod http;
pub mod sse;

pub use http::{error_response, HttpError, RequestLine, Status, SSE_RESPONSE_HEADERS};
pub use sse::{SseEvent, DATA_EVENT};
