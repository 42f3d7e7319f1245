//! Streaming server listener
//!
//! Owns the listening socket, the accept task and the connection set, and
//! drives the `Initialized → Running → Stopped` lifecycle.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::config::StreamingConfig;
use crate::error::{Error, Result};
use crate::handler::HandlerRegistry;
use crate::protocol::{error_response, Status};
use crate::registry::StreamTable;
use crate::server::config::ServerConfig;
use crate::server::connection::{shutdown_requested, Connection, WorkerContext};
use crate::server::connections::{ConnectionRecord, ConnectionSet};
use crate::server::state::ServerState;
use crate::stats::{ServerStats, StatsSnapshot};

/// How long a rejected client gets to send its request before the 503
const REJECT_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Embedded SSE streaming server
///
/// `H` is an opaque handle to the host application. The server stores it
/// and hands it back through [`host`](Self::host) but never uses it.
pub struct StreamingServer<H = ()> {
    config: ServerConfig,
    streams: Arc<StreamTable>,
    host: Arc<H>,
    state: ServerState,
    stats: Arc<ServerStats>,
    connections: Arc<ConnectionSet>,
    running: Arc<AtomicBool>,
    shutdown_tx: Option<watch::Sender<bool>>,
    accept_handle: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl<H: Send + Sync + 'static> StreamingServer<H> {
    /// Create a server around an already resolved stream table
    pub fn new(config: ServerConfig, streams: StreamTable, host: H) -> Self {
        Self {
            config,
            streams: streams.into_shared(),
            host: Arc::new(host),
            state: ServerState::Initialized,
            stats: Arc::new(ServerStats::new()),
            connections: Arc::new(ConnectionSet::new()),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx: None,
            accept_handle: None,
            local_addr: None,
        }
    }

    /// Validate the config, resolve its streams through `handlers` and
    /// create the server
    pub fn from_streaming_config(
        streaming: &StreamingConfig,
        handlers: &HandlerRegistry,
        host: H,
    ) -> Result<Self> {
        streaming.validate()?;
        let config = ServerConfig::from_streaming(streaming)?;
        let streams = StreamTable::from_config(streaming, handlers);

        tracing::info!(
            addr = %config.bind_addr,
            streams = streams.len(),
            "Streaming server initialized"
        );

        Ok(Self::new(config, streams, host))
    }

    /// Bind the listener and start accepting connections
    ///
    /// Does nothing if the server is already running. A bind or listen
    /// failure leaves the state unchanged.
    pub async fn start(&mut self) -> Result<()> {
        if self.state.is_running() {
            tracing::debug!("Streaming server already running");
            return Ok(());
        }
        if !self.state.can_start() {
            return Err(Error::InvalidState {
                operation: "start",
                state: self.state,
            });
        }

        let addr = self.config.bind_addr;
        let listener = self.bind(addr)?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let connection_semaphore = if self.config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(self.config.max_connections)))
        } else {
            None
        };

        let accept_loop = AcceptLoop {
            listener,
            shutdown: shutdown_rx,
            running: Arc::clone(&self.running),
            connections: Arc::clone(&self.connections),
            connection_semaphore,
            next_conn_id: AtomicU64::new(1),
            tcp_nodelay: self.config.tcp_nodelay,
            ctx: WorkerContext {
                streams: Arc::clone(&self.streams),
                stats: Arc::clone(&self.stats),
                read_buffer_size: self.config.read_buffer_size,
                request_timeout: self.config.request_timeout,
            },
        };

        self.running.store(true, Ordering::Release);
        self.accept_handle = Some(tokio::spawn(accept_loop.run()));
        self.shutdown_tx = Some(shutdown_tx);
        self.local_addr = Some(local_addr);
        self.state = ServerState::Running;

        tracing::info!(
            addr = %local_addr,
            streams = self.streams.len(),
            "Streaming server listening"
        );
        Ok(())
    }

    fn bind(&self, addr: SocketAddr) -> Result<TcpListener> {
        let bind_err = |source: std::io::Error| Error::Bind { addr, source };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;

        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;
        socket
            .listen(self.config.effective_backlog())
            .map_err(bind_err)
    }

    /// Stop accepting, close every connection and join every worker
    ///
    /// Does nothing unless the server is running.
    pub async fn stop(&mut self) {
        if !self.state.is_running() {
            return;
        }

        tracing::info!("Stopping streaming server");

        self.running.store(false, Ordering::Release);
        if let Some(tx) = self.shutdown_tx.take() {
            tx.send_replace(true);
        }

        // The accept task owns the listener; the socket closes when it exits
        if let Some(handle) = self.accept_handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Accept task did not exit cleanly");
            }
        }

        let records = self.connections.drain();
        let count = records.len();
        for record in records {
            tracing::debug!(
                conn_id = record.id,
                peer = %record.peer_addr,
                age_ms = record.accepted_at.elapsed().as_millis() as u64,
                "Joining connection worker"
            );
            record.join().await;
        }

        self.local_addr = None;
        self.state = ServerState::Stopped;

        tracing::info!(joined = count, "Streaming server stopped");
    }

    /// Release the stream table
    ///
    /// Must not be called while running; call [`stop`](Self::stop) first.
    pub fn cleanup(&mut self) -> Result<()> {
        if !self.state.can_cleanup() {
            return Err(Error::InvalidState {
                operation: "cleanup",
                state: self.state,
            });
        }

        self.streams = Arc::new(StreamTable::new());
        self.state = ServerState::Cleaned;

        tracing::info!("Streaming server cleaned up");
        Ok(())
    }

    /// Current lifecycle state
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Whether the accept loop is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Address actually bound (only while running)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Base URL clients should connect to
    pub fn server_url(&self) -> String {
        format!("http://{}", self.local_addr.unwrap_or(self.config.bind_addr))
    }

    /// Server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Resolved stream table
    pub fn stream_table(&self) -> &StreamTable {
        &self.streams
    }

    /// Host application handle
    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Counters snapshot
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of tracked connection records
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

/// State moved into the accept task
struct AcceptLoop {
    listener: TcpListener,
    shutdown: watch::Receiver<bool>,
    running: Arc<AtomicBool>,
    connections: Arc<ConnectionSet>,
    connection_semaphore: Option<Arc<Semaphore>>,
    next_conn_id: AtomicU64,
    tcp_nodelay: bool,
    ctx: WorkerContext,
}

impl AcceptLoop {
    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = shutdown_requested(&mut self.shutdown) => break,
                res = self.listener.accept() => match res {
                    Ok((socket, peer_addr)) => self.handle_connection(socket, peer_addr),
                    Err(e) => {
                        if !self.running.load(Ordering::Acquire) {
                            break;
                        }
                        tracing::error!(error = %e, "Failed to accept connection");
                    }
                },
            }
        }

        tracing::debug!("Accept loop stopped");
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        self.connections.prune_finished();

        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    self.ctx.stats.connection_rejected();
                    let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
                    let handle = tokio::spawn(reject_connection(socket, self.ctx.stats.clone()));
                    self.connections
                        .insert(ConnectionRecord::new(conn_id, peer_addr, handle));
                    return;
                }
            }
        } else {
            None
        };

        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(conn_id = conn_id, peer = %peer_addr, "New connection");

        if self.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(conn_id = conn_id, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let active = ActiveConnection::open(Arc::clone(&self.ctx.stats), permit);

        let connection = Connection::new(
            conn_id,
            peer_addr,
            socket,
            self.ctx.clone(),
            self.shutdown.clone(),
        );

        let handle = tokio::spawn(async move {
            // Dropped on return and on unwind alike
            let _active = active;

            match connection.run().await {
                Ok(outcome) => {
                    tracing::debug!(conn_id = conn_id, outcome = ?outcome, "Connection closed");
                }
                Err(e) => {
                    tracing::debug!(conn_id = conn_id, error = %e, "Connection error");
                }
            }
        });

        self.connections
            .insert(ConnectionRecord::new(conn_id, peer_addr, handle));
    }
}

/// A running worker, as seen by the stats and the connection cap
///
/// Frees the cap slot before the worker stops counting as active.
struct ActiveConnection {
    stats: Arc<ServerStats>,
    permit: Option<OwnedSemaphorePermit>,
}

impl ActiveConnection {
    fn open(stats: Arc<ServerStats>, permit: Option<OwnedSemaphorePermit>) -> Self {
        stats.connection_opened();
        Self { stats, permit }
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!("Connection worker panicked");
        }
        drop(self.permit.take());
        self.stats.connection_closed();
    }
}

/// Answer a connection over the cap with 503
///
/// The request is consumed first so closing the socket sends FIN rather
/// than a reset that could discard the response.
async fn reject_connection(mut socket: TcpStream, stats: Arc<ServerStats>) {
    let mut buf = [0u8; 1024];
    match tokio::time::timeout(REJECT_READ_TIMEOUT, socket.read(&mut buf)).await {
        Ok(Ok(n)) => tracing::trace!(bytes = n, "Read request from rejected client"),
        Ok(Err(e)) => tracing::debug!(error = %e, "Read from rejected client failed"),
        Err(_) => tracing::debug!("Rejected client sent no request"),
    }

    let response = error_response(Status::ServiceUnavailable, "Too many connections");
    match socket.write_all(&response).await {
        Ok(()) => stats.add_bytes(response.len()),
        Err(e) => tracing::debug!(error = %e, "Failed to send 503 to rejected client"),
    }
    if let Err(e) = socket.shutdown().await {
        tracing::debug!(error = %e, "Failed to shut down rejected connection");
    }
}
