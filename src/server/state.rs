//! Server lifecycle state machine
//!
//! ```text
//!   new() ──► Initialized ──start()──► Running ──stop()──► Stopped
//!                 │                       ▲                  │
//!                 │                       └─────start()──────┤
//!                 └──────────cleanup()──────► Cleaned ◄──cleanup()
//! ```

/// Lifecycle state of a [`StreamingServer`](super::StreamingServer)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Stream table resolved, no socket yet
    Initialized,
    /// Listening and accepting connections
    Running,
    /// Listener closed and every worker joined
    Stopped,
    /// Stream table released; the server cannot be started again
    Cleaned,
}

impl ServerState {
    /// Whether `start()` may bind a new listener from this state
    pub fn can_start(self) -> bool {
        matches!(self, ServerState::Initialized | ServerState::Stopped)
    }

    /// Whether `cleanup()` is permitted
    pub fn can_cleanup(self) -> bool {
        self != ServerState::Running
    }

    /// Whether the server is accepting connections
    pub fn is_running(self) -> bool {
        self == ServerState::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert!(ServerState::Initialized.can_start());
        assert!(ServerState::Stopped.can_start());
        assert!(!ServerState::Running.can_start());
        assert!(!ServerState::Cleaned.can_start());

        assert!(ServerState::Initialized.can_cleanup());
        assert!(ServerState::Stopped.can_cleanup());
        assert!(!ServerState::Running.can_cleanup());

        assert!(ServerState::Running.is_running());
        assert!(!ServerState::Stopped.is_running());
    }
}
