use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use termgate::error::{RegistryError, TransportError};
use termgate::models::types::NodeNumber;
use termgate::state::transport::TransportState;
use termgate::{SessionHandle, SessionRegistry, SessionTransport, Transport};

#[derive(Default)]
struct Recorder {
    out: Mutex<Vec<u8>>,
    closes: AtomicUsize,
    broken: bool,
    stalled: bool,
}

impl Recorder {
    fn broken() -> Self {
        Self {
            broken: true,
            ..Default::default()
        }
    }

    /// A client that stopped reading: sends never complete.
    fn stalled() -> Self {
        Self {
            stalled: true,
            ..Default::default()
        }
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.out.lock()).into_owned()
    }
}

#[async_trait]
impl Transport for Recorder {
    fn is_active(&self) -> bool {
        self.closes.load(Ordering::SeqCst) == 0
    }

    async fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.broken {
            return Err(TransportError::Write("peer went away".into()));
        }
        if self.stalled {
            std::future::pending::<()>().await;
        }
        self.out.lock().extend_from_slice(bytes);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn session(node: u16, inner: Arc<Recorder>) -> Arc<SessionHandle> {
    let transport = Arc::new(SessionTransport::new(inner));
    transport.activate();
    Arc::new(SessionHandle::new(NodeNumber(node), transport))
}

#[tokio::test]
async fn join_and_leave() {
    let reg = SessionRegistry::new(8);
    reg.join(session(5, Arc::default())).await.unwrap();

    assert_eq!(reg.connections().await, 1);
    assert!(reg.get(NodeNumber(5)).await.is_some());

    assert!(reg.leave(NodeNumber(5)).await);
    assert!(!reg.leave(NodeNumber(5)).await);
    assert_eq!(reg.connections().await, 0);
}

#[tokio::test]
async fn second_join_on_a_node_is_rejected() {
    let reg = SessionRegistry::new(8);
    let first = session(3, Arc::default());
    reg.join(first.clone()).await.unwrap();

    let err = reg.join(session(3, Arc::default())).await.unwrap_err();
    assert!(matches!(err, RegistryError::NodeOccupied(NodeNumber(3))));

    let kept = reg.get(NodeNumber(3)).await.unwrap();
    assert_eq!(kept.session_id, first.session_id);
}

#[tokio::test]
async fn deliver_skips_failing_sessions() {
    let reg = SessionRegistry::new(8);
    let a = Arc::new(Recorder::default());
    let b = Arc::new(Recorder::broken());
    let c = Arc::new(Recorder::default());
    reg.join(session(1, a.clone())).await.unwrap();
    reg.join(session(2, b.clone())).await.unwrap();
    reg.join(session(3, c.clone())).await.unwrap();

    let delivered = reg.deliver("system going down").await;

    assert_eq!(delivered, 2);
    assert_eq!(a.text(), "system going down");
    assert_eq!(c.text(), "system going down");
    // the failing node stays until its own task notices
    assert!(reg.get(NodeNumber(2)).await.is_some());
}

#[tokio::test]
async fn stalled_node_does_not_hold_up_the_board() {
    let reg = Arc::new(SessionRegistry::new(8).with_send_timeout(Duration::from_millis(300)));
    let live = Arc::new(Recorder::default());
    reg.join(session(1, Arc::new(Recorder::stalled()))).await.unwrap();
    reg.join(session(2, live.clone())).await.unwrap();

    let broadcast = tokio::spawn({
        let reg = reg.clone();
        async move { reg.deliver("system going down").await }
    });
    tokio::task::yield_now().await;

    // the table stays usable while node 1 is stuck
    let table_ops = async {
        reg.join(session(3, Arc::default())).await.unwrap();
        assert!(reg.leave(NodeNumber(3)).await);
        reg.connections().await
    };
    let count = tokio::time::timeout(Duration::from_millis(100), table_ops).await.unwrap();
    assert_eq!(count, 2);

    let delivered = tokio::time::timeout(Duration::from_secs(2), broadcast).await.unwrap().unwrap();
    assert_eq!(delivered, 1);
    assert_eq!(live.text(), "system going down");
    assert!(reg.get(NodeNumber(1)).await.is_some());
}

#[tokio::test]
async fn shutdown_closes_each_transport_once() {
    let reg = SessionRegistry::new(8);
    let a = Arc::new(Recorder::default());
    let b = Arc::new(Recorder::default());
    let sa = session(1, a.clone());
    reg.join(sa.clone()).await.unwrap();
    reg.join(session(2, b.clone())).await.unwrap();

    reg.shutdown().await;
    reg.shutdown().await;

    assert_eq!(reg.connections().await, 0);
    assert_eq!(a.closes.load(Ordering::SeqCst), 1);
    assert_eq!(b.closes.load(Ordering::SeqCst), 1);

    // the session task closing on its way out is a no-op
    sa.transport().close().await;
    assert_eq!(a.closes.load(Ordering::SeqCst), 1);
    assert_eq!(sa.transport().state(), TransportState::Closed);
}

#[tokio::test]
async fn closed_transport_refuses_output() {
    let inner = Arc::new(Recorder::default());
    let s = session(1, inner.clone());
    s.transport().shutdown().await;

    assert!(matches!(s.transport().send(b"late").await, Err(TransportError::Closed)));
    assert!(inner.text().is_empty());
}
