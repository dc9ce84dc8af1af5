//! Live-session table for the streamable HTTP transport.
//!
//! Sessions are identified by server-assigned opaque ids. Closed sessions
//! are removed from the table outright, so a lookup miss covers both
//! "never existed" and "already closed" and ids are never reused.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Queue depth for server-to-client messages awaiting the standalone
/// stream. Messages beyond this are dropped rather than blocking.
const STREAM_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// `initialize` has been answered; the client has not yet confirmed
    /// with `notifications/initialized`.
    Uninitialized,
    Active,
}

#[derive(Debug)]
pub struct SessionHandle {
    id: Arc<str>,
    state: RwLock<SessionState>,
    stream_tx: RwLock<Option<mpsc::Sender<Value>>>,
}

impl SessionHandle {
    fn new(id: Arc<str>) -> Self {
        Self {
            id,
            state: RwLock::new(SessionState::Uninitialized),
            stream_tx: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn activate(&self) {
        *self.state.write() = SessionState::Active;
    }

    /// Open a fresh standalone stream channel. Any previously attached
    /// stream loses its sender and terminates, so at most one stream is
    /// live per session.
    pub fn attach_stream(&self) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        *self.stream_tx.write() = Some(tx);
        rx
    }

    /// Queue a message for the standalone stream. Messages sent while no
    /// stream is attached, or past capacity, are dropped.
    pub fn push_server_message(&self, message: Value) -> bool {
        match self.stream_tx.read().as_ref() {
            Some(tx) => tx.try_send(message).is_ok(),
            None => false,
        }
    }

    fn drop_stream(&self) {
        *self.stream_tx.write() = None;
    }
}

#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<Arc<str>, Arc<SessionHandle>>>,
}

impl SessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> Arc<SessionHandle> {
        let id: Arc<str> = Uuid::new_v4().to_string().into();
        let handle = Arc::new(SessionHandle::new(Arc::clone(&id)));
        self.sessions.write().insert(id, Arc::clone(&handle));
        tracing::info!(session = %handle.id(), "session created");
        handle
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.read().get(id).cloned()
    }

    /// Remove the session and end its standalone stream. Returns `false`
    /// for ids that are unknown or already closed.
    pub fn close(&self, id: &str) -> bool {
        let removed = self.sessions.write().remove(id);
        match removed {
            Some(handle) => {
                handle.drop_stream();
                tracing::info!(session = %id, "session closed");
                true
            }
            None => false,
        }
    }

    /// Drain the whole table, ending every attached stream. Used at
    /// shutdown.
    pub fn close_all(&self) {
        let drained: Vec<_> = self.sessions.write().drain().collect();
        for (_, handle) in &drained {
            handle.drop_stream();
        }
        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "closed all open sessions");
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
