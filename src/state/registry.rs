use crate::error::RegistryError;
use crate::models::types::NodeNumber;
use crate::state::session::SessionHandle;
use crate::state::transport::SessionTransport;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// How long one node may hold up a broadcast before it is skipped.
const SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Every live session on the board, keyed by node number.
///
/// All table operations take the same lock, so a join, leave or shutdown never
/// observes another one half done. The lock is never held across session I/O.
pub struct SessionRegistry {
    max_nodes: u16,
    send_timeout: Duration,
    sessions: Mutex<BTreeMap<NodeNumber, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new(max_nodes: u16) -> Self {
        Self {
            max_nodes,
            send_timeout: SEND_TIMEOUT,
            sessions: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Registers a session under its node. An occupied node rejects the newcomer and
    /// leaves the existing entry alone.
    pub async fn join(&self, session: Arc<SessionHandle>) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session.node) {
            tracing::warn!(node = %session.node, "node already occupied, rejecting join");
            return Err(RegistryError::NodeOccupied(session.node));
        }
        tracing::debug!(node = %session.node, "session joined");
        sessions.insert(session.node, session);
        Ok(())
    }

    /// Takes the lowest free node and registers a fresh session on it in one step.
    pub async fn open(&self, transport: Arc<SessionTransport>) -> Result<Arc<SessionHandle>, RegistryError> {
        let mut sessions = self.sessions.lock().await;
        let node = lowest_free(&sessions, self.max_nodes).ok_or(RegistryError::Full(self.max_nodes))?;
        let handle = Arc::new(SessionHandle::new(node, transport));
        sessions.insert(node, handle.clone());
        tracing::debug!(%node, session_id = %handle.session_id, "session opened");
        Ok(handle)
    }

    /// Removes the session on `node`. Returns false when nothing was there.
    pub async fn leave(&self, node: NodeNumber) -> bool {
        let removed = self.sessions.lock().await.remove(&node).is_some();
        if removed {
            tracing::debug!(%node, "session left");
        }
        removed
    }

    /// Sends `message` to every registered session and returns how many took it.
    ///
    /// Works on a snapshot of the table, sending to all nodes at once. A send that
    /// fails or stalls past the timeout is logged and skipped; the session stays
    /// registered.
    pub async fn deliver(&self, message: impl AsRef<[u8]>) -> usize {
        let message = message.as_ref();
        let targets: Vec<Arc<SessionHandle>> = self.sessions.lock().await.values().cloned().collect();

        let limit = self.send_timeout;
        let results = futures::future::join_all(targets.iter().map(|session| async move {
            let sent = tokio::time::timeout(limit, session.transport().send(message)).await;
            (session.node, sent)
        }))
        .await;

        let mut delivered = 0;
        for (node, sent) in results {
            match sent {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => tracing::warn!(%node, error = %e, "broadcast to node failed"),
                Err(_) => tracing::warn!(%node, "broadcast to node timed out"),
            }
        }
        delivered
    }

    pub async fn connections(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn get(&self, node: NodeNumber) -> Option<Arc<SessionHandle>> {
        self.sessions.lock().await.get(&node).cloned()
    }

    /// Lowest node in `1..=max_nodes` without a session, `None` when the board is full.
    pub async fn allocate_node(&self) -> Option<NodeNumber> {
        let sessions = self.sessions.lock().await;
        lowest_free(&sessions, self.max_nodes)
    }

    /// `(node, handle)` of every logged-in session, ordered by node.
    pub async fn who(&self) -> Vec<(NodeNumber, String)> {
        self.sessions
            .lock()
            .await
            .iter()
            .filter_map(|(node, s)| s.user().map(|h| (*node, h)))
            .collect()
    }

    /// Closes every session and empties the table. Safe to call more than once.
    pub async fn shutdown(&self) {
        let drained: Vec<Arc<SessionHandle>> = {
            let mut sessions = self.sessions.lock().await;
            std::mem::take(&mut *sessions).into_values().collect()
        };
        if drained.is_empty() {
            return;
        }

        tracing::info!(count = drained.len(), "closing all sessions");
        futures::future::join_all(drained.iter().map(|s| s.transport().close())).await;
    }
}

fn lowest_free(sessions: &BTreeMap<NodeNumber, Arc<SessionHandle>>, max_nodes: u16) -> Option<NodeNumber> {
    (1..=max_nodes).map(NodeNumber).find(|n| !sessions.contains_key(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::state::transport::Transport;
    use async_trait::async_trait;

    struct Null;

    #[async_trait]
    impl Transport for Null {
        fn is_active(&self) -> bool {
            true
        }
        async fn send(&self, _bytes: &[u8]) -> Result<(), TransportError> {
            Ok(())
        }
        async fn close(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn transport() -> Arc<SessionTransport> {
        let t = Arc::new(SessionTransport::new(Arc::new(Null)));
        t.activate();
        t
    }

    #[tokio::test]
    async fn allocate_takes_lowest_free_slot() {
        let reg = SessionRegistry::new(3);
        assert_eq!(reg.allocate_node().await, Some(NodeNumber(1)));

        let a = reg.open(transport()).await.unwrap();
        let b = reg.open(transport()).await.unwrap();
        let _c = reg.open(transport()).await.unwrap();
        assert_eq!((a.node, b.node), (NodeNumber(1), NodeNumber(2)));
        assert_eq!(reg.allocate_node().await, None);
        assert!(matches!(reg.open(transport()).await, Err(RegistryError::Full(3))));

        reg.leave(NodeNumber(2)).await;
        assert_eq!(reg.allocate_node().await, Some(NodeNumber(2)));
    }

    #[tokio::test]
    async fn who_lists_logged_in_sessions_only() {
        let reg = SessionRegistry::new(4);
        let a = reg.open(transport()).await.unwrap();
        let _b = reg.open(transport()).await.unwrap();
        a.set_user(Some("merlin".into()));
        assert_eq!(reg.who().await, vec![(NodeNumber(1), "merlin".to_string())]);
    }

    #[tokio::test]
    async fn shutdown_closes_everything() {
        let reg = SessionRegistry::new(4);
        let a = reg.open(transport()).await.unwrap();
        reg.shutdown().await;
        assert_eq!(reg.connections().await, 0);
        assert!(!a.transport().is_active());
        reg.shutdown().await;
    }
}
