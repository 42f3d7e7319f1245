//! Minimal HTTP/1.1 handling
//!
//! Only the request line is parsed; headers and body are ignored. Responses
//! are either a short `text/plain` error with `Connection: close`, or the
//! event-stream header block that opens an SSE response.

use bytes::{BufMut, Bytes, BytesMut};

/// Header block sent once before the first SSE frame
pub const SSE_RESPONSE_HEADERS: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Type: text/event-stream\r\n\
Cache-Control: no-cache\r\n\
Connection: keep-alive\r\n\
Access-Control-Allow-Origin: *\r\n\
\r\n";

/// Request line parse failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// No bytes or only whitespace before the first line break
    EmptyRequest,
    /// Request line is not valid UTF-8
    InvalidEncoding,
    /// Request line does not have exactly three tokens
    MalformedRequestLine(usize),
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::EmptyRequest => write!(f, "Empty request"),
            HttpError::InvalidEncoding => write!(f, "Request line is not valid UTF-8"),
            HttpError::MalformedRequestLine(n) => {
                write!(f, "Malformed request line: expected 3 tokens, got {}", n)
            }
        }
    }
}

impl std::error::Error for HttpError {}

/// Parsed `METHOD PATH VERSION` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub path: String,
    pub version: String,
}

impl RequestLine {
    /// Parse the first line of a raw request buffer
    pub fn parse(buf: &[u8]) -> Result<Self, HttpError> {
        let end = buf
            .iter()
            .position(|&b| b == b'\n')
            .unwrap_or(buf.len());
        let line = std::str::from_utf8(&buf[..end]).map_err(|_| HttpError::InvalidEncoding)?;

        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [] => Err(HttpError::EmptyRequest),
            [method, path, version] => Ok(Self {
                method: (*method).to_string(),
                path: (*path).to_string(),
                version: (*version).to_string(),
            }),
            other => Err(HttpError::MalformedRequestLine(other.len())),
        }
    }

    /// Whether this is a GET request
    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}

/// Status codes the server emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    ServiceUnavailable,
}

impl Status {
    /// Numeric status code
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::MethodNotAllowed => 405,
            Status::ServiceUnavailable => 503,
        }
    }

    /// Reason phrase
    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::MethodNotAllowed => "Method Not Allowed",
            Status::ServiceUnavailable => "Service Unavailable",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

/// Build a complete `text/plain` response that closes the connection
pub fn error_response(status: Status, body: &str) -> Bytes {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );

    let mut buf = BytesMut::with_capacity(head.len() + body.len());
    buf.put_slice(head.as_bytes());
    buf.put_slice(body.as_bytes());
    buf.freeze()
}
