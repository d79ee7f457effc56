use crate::models::types::{NodeNumber, SessionId};
use crate::state::transport::SessionTransport;
use parking_lot::RwLock;
use std::sync::Arc;

/// Top-level state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, nothing installed yet
    PreLogon,
    /// Pre-logon, logon or signup module is running
    LoggingOn,
    /// Authenticated and reading menu commands
    InMenu,
    /// Authenticated with a module on the stack
    InModule,
    ShuttingDown,
}

impl SessionState {
    pub fn is_logged_in(&self) -> bool {
        matches!(self, SessionState::InMenu | SessionState::InModule)
    }
}

/// The registry's view of a session: its node, its transport and who is on it.
#[derive(Debug)]
pub struct SessionHandle {
    pub node: NodeNumber,
    pub session_id: SessionId,
    transport: Arc<SessionTransport>,
    handle: RwLock<Option<String>>,
}

impl SessionHandle {
    pub fn new(node: NodeNumber, transport: Arc<SessionTransport>) -> Self {
        Self {
            node,
            session_id: SessionId::new(),
            transport,
            handle: RwLock::new(None),
        }
    }

    pub fn transport(&self) -> &Arc<SessionTransport> {
        &self.transport
    }

    /// Handle of the logged-in user, if any.
    pub fn user(&self) -> Option<String> {
        self.handle.read().clone()
    }

    pub fn set_user(&self, handle: Option<String>) {
        *self.handle.write() = handle;
    }
}
