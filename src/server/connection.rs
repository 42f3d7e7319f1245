//! Per-connection worker
//!
//! Reads one request, answers terminal errors with a plain HTTP response,
//! and otherwise streams SSE frames from the resolved handler until the
//! peer goes away or the server shuts down.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::protocol::{error_response, RequestLine, SseEvent, Status, SSE_RESPONSE_HEADERS};
use crate::registry::{StreamEntry, StreamTable};
use crate::stats::ServerStats;

/// Shared state every worker needs
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub streams: Arc<StreamTable>,
    pub stats: Arc<ServerStats>,
    pub read_buffer_size: usize,
    pub request_timeout: Duration,
}

/// Why an established stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Peer closed its side or the socket reported an error
    PeerClosed,
    /// Writing a frame failed
    WriteFailed,
    /// Server is shutting down
    Shutdown,
}

/// How a connection finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// Peer sent nothing (EOF, timeout, or shutdown before the request)
    NoRequest,
    /// Request answered with a terminal error status
    Responded(Status),
    /// SSE stream ran and ended
    Streamed { events: u64, end: StreamEnd },
}

/// Resolves once the server signals shutdown (or the signal is dropped)
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// A single client connection
pub(crate) struct Connection<S> {
    id: u64,
    peer_addr: SocketAddr,
    stream: S,
    ctx: WorkerContext,
    shutdown: watch::Receiver<bool>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        id: u64,
        peer_addr: SocketAddr,
        stream: S,
        ctx: WorkerContext,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id,
            peer_addr,
            stream,
            ctx,
            shutdown,
        }
    }

    /// Serve the connection to completion
    ///
    /// The stream is dropped (closing the socket) when this returns.
    pub async fn run(mut self) -> io::Result<ConnectionOutcome> {
        let mut buf = vec![0u8; self.ctx.read_buffer_size];

        let n = tokio::select! {
            _ = shutdown_requested(&mut self.shutdown) => return Ok(ConnectionOutcome::NoRequest),
            res = tokio::time::timeout(self.ctx.request_timeout, self.stream.read(&mut buf)) => {
                match res {
                    Ok(read) => read?,
                    Err(_) => {
                        tracing::debug!(
                            conn_id = self.id,
                            peer = %self.peer_addr,
                            "Request timeout"
                        );
                        return Ok(ConnectionOutcome::NoRequest);
                    }
                }
            }
        };

        if n == 0 {
            return Ok(ConnectionOutcome::NoRequest);
        }

        let request = match RequestLine::parse(&buf[..n]) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(conn_id = self.id, error = %e, "Bad request");
                return self.respond(Status::BadRequest, "Bad Request").await;
            }
        };

        tracing::debug!(
            conn_id = self.id,
            peer = %self.peer_addr,
            method = %request.method,
            path = %request.path,
            "HTTP request"
        );

        if !request.is_get() {
            return self.respond(Status::MethodNotAllowed, "Method Not Allowed").await;
        }

        let streams = Arc::clone(&self.ctx.streams);
        let entry = match streams.get(&request.path) {
            Some(entry) => entry,
            None => return self.respond(Status::NotFound, "Stream not found").await,
        };

        if !entry.enabled {
            return self.respond(Status::ServiceUnavailable, "Stream disabled").await;
        }

        self.stream_events(entry).await
    }

    async fn respond(&mut self, status: Status, body: &str) -> io::Result<ConnectionOutcome> {
        let response = error_response(status, body);
        self.stream.write_all(&response).await?;
        self.stream.flush().await?;
        self.ctx.stats.add_bytes(response.len());

        // Peer may already be gone; the response was written either way
        let _ = self.stream.shutdown().await;

        tracing::debug!(conn_id = self.id, status = %status, "Request rejected");
        Ok(ConnectionOutcome::Responded(status))
    }

    async fn stream_events(&mut self, entry: &StreamEntry) -> io::Result<ConnectionOutcome> {
        self.stream.write_all(SSE_RESPONSE_HEADERS).await?;
        self.stream.flush().await?;
        self.ctx.stats.stream_opened();
        self.ctx.stats.add_bytes(SSE_RESPONSE_HEADERS.len());

        tracing::info!(
            conn_id = self.id,
            peer = %self.peer_addr,
            stream = %entry.name,
            endpoint = %entry.endpoint,
            interval_ms = entry.interval.as_millis() as u64,
            "SSE stream opened"
        );

        let mut events = 0u64;
        let end = loop {
            let frame = SseEvent::data(entry.produce()).encode();

            if let Err(e) = self.write_frame(&frame).await {
                tracing::debug!(conn_id = self.id, error = %e, "Failed to send SSE event");
                break StreamEnd::WriteFailed;
            }
            events += 1;
            self.ctx.stats.event_sent(frame.len());
            tracing::trace!(
                conn_id = self.id,
                events = events,
                bytes = frame.len(),
                "SSE event sent"
            );

            if let Some(end) = self.wait_next_tick(entry.interval).await {
                break end;
            }
        };

        tracing::info!(
            conn_id = self.id,
            peer = %self.peer_addr,
            stream = %entry.name,
            events = events,
            reason = ?end,
            "SSE stream closed"
        );

        Ok(ConnectionOutcome::Streamed { events, end })
    }

    async fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.stream.write_all(frame).await?;
        self.stream.flush().await
    }

    /// Sleep until the next frame is due while watching the socket
    ///
    /// Returns `Some` when the stream must end before the deadline.
    async fn wait_next_tick(&mut self, interval: Duration) -> Option<StreamEnd> {
        let deadline = Instant::now() + interval;
        let mut probe = [0u8; 256];

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return None,
                _ = shutdown_requested(&mut self.shutdown) => return Some(StreamEnd::Shutdown),
                res = self.stream.read(&mut probe) => match res {
                    Ok(0) => return Some(StreamEnd::PeerClosed),
                    // Anything the client sends after the request is ignored
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::debug!(
                            conn_id = self.id,
                            error = %e,
                            "Socket error while streaming"
                        );
                        return Some(StreamEnd::PeerClosed);
                    }
                },
            }
        }
    }
}
