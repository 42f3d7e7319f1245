//! Active connection set
//!
//! Structural bookkeeping only: the accept loop inserts a record per
//! spawned worker, and `stop()` drains the set to join every worker.
//! Workers never touch the set themselves.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use tokio::task::JoinHandle;

/// One accepted connection and its worker
#[derive(Debug)]
pub struct ConnectionRecord {
    /// Connection ID, unique per server
    pub id: u64,
    /// Remote peer address
    pub peer_addr: SocketAddr,
    /// When the connection was accepted
    pub accepted_at: Instant,
    handle: JoinHandle<()>,
}

impl ConnectionRecord {
    pub fn new(id: u64, peer_addr: SocketAddr, handle: JoinHandle<()>) -> Self {
        Self {
            id,
            peer_addr,
            accepted_at: Instant::now(),
            handle,
        }
    }

    /// Whether the worker has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker to exit
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::warn!(
                conn_id = self.id,
                peer = %self.peer_addr,
                error = %e,
                "Connection worker did not exit cleanly"
            );
        }
    }
}

/// Mutex-guarded set of connection records
#[derive(Debug, Default)]
pub struct ConnectionSet {
    inner: Mutex<HashMap<u64, ConnectionRecord>>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, ConnectionRecord>> {
        // Records stay structurally valid even if a holder panicked
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a record
    pub fn insert(&self, record: ConnectionRecord) {
        self.lock().insert(record.id, record);
    }

    /// Drop records whose worker already exited, returning how many
    pub fn prune_finished(&self) -> usize {
        let mut inner = self.lock();
        let before = inner.len();
        inner.retain(|_, record| !record.is_finished());
        before - inner.len()
    }

    /// Number of records (finished workers not yet pruned included)
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Take every record out of the set
    pub fn drain(&self) -> Vec<ConnectionRecord> {
        self.lock().drain().map(|(_, record)| record).collect()
    }
}
