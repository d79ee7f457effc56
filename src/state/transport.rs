use crate::error::TransportError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Upper bound on the flush a graceful shutdown waits for.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Byte stream underneath a session. Telnet is the shipped implementation; an SSL
/// stream would plug in here as well.
#[async_trait]
pub trait Transport: Send + Sync {
    fn is_active(&self) -> bool;

    async fn send(&self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Pushes out anything buffered.
    async fn flush(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransportState {
    Created = 0,
    Active = 1,
    ShuttingDown = 2,
    Closed = 3,
}

impl TransportState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TransportState::Created,
            1 => TransportState::Active,
            2 => TransportState::ShuttingDown,
            _ => TransportState::Closed,
        }
    }
}

/// Lifecycle wrapper over a [`Transport`].
///
/// `Created -> Active -> ShuttingDown -> Closed`. The session task, the registry
/// and the idle reaper may all race to close; the underlying `close` still runs
/// once. A forced close may take over a graceful shutdown stuck in its flush.
pub struct SessionTransport {
    state: AtomicU8,
    inner: Arc<dyn Transport>,
    flush_timeout: Duration,
    close_started: AtomicBool,
    closed_tx: watch::Sender<bool>,
}

impl fmt::Debug for SessionTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTransport").field("state", &self.state()).finish()
    }
}

impl SessionTransport {
    pub fn new(inner: Arc<dyn Transport>) -> Self {
        let (closed_tx, _) = watch::channel(false);
        Self {
            state: AtomicU8::new(TransportState::Created as u8),
            inner,
            flush_timeout: FLUSH_TIMEOUT,
            close_started: AtomicBool::new(false),
            closed_tx,
        }
    }

    pub fn with_flush_timeout(mut self, flush_timeout: Duration) -> Self {
        self.flush_timeout = flush_timeout;
        self
    }

    pub fn state(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Marks the connection as negotiated. Only valid from `Created`.
    pub fn activate(&self) -> bool {
        self.transition(TransportState::Created, TransportState::Active)
    }

    pub fn is_active(&self) -> bool {
        self.state() == TransportState::Active && self.inner.is_active()
    }

    pub async fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.state() != TransportState::Active {
            return Err(TransportError::Closed);
        }
        self.inner.send(bytes).await
    }

    pub async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.send(text.as_bytes()).await
    }

    /// Graceful close: flush (bounded by the flush timeout), then close. Does nothing
    /// unless the transport is active. Failures are logged, never returned.
    pub async fn shutdown(&self) {
        if !self.transition(TransportState::Active, TransportState::ShuttingDown) {
            return;
        }
        match tokio::time::timeout(self.flush_timeout, self.inner.flush()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "flush failed during shutdown"),
            Err(_) => tracing::warn!(timeout = ?self.flush_timeout, "flush timed out during shutdown"),
        }
        self.finish_close().await;
    }

    /// Forced close from any state short of `Closed`, including a shutdown that is
    /// still flushing. No-op once the underlying close has run.
    pub async fn close(&self) {
        let _ = self.transition(TransportState::Active, TransportState::ShuttingDown)
            || self.transition(TransportState::Created, TransportState::ShuttingDown);
        self.finish_close().await;
    }

    /// Resolves once the transport reached `Closed`.
    pub async fn closed(&self) {
        let mut rx = self.closed_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    async fn finish_close(&self) {
        if self.close_started.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.inner.close().await {
            tracing::warn!(error = %e, "transport close failed");
        }
        self.state.store(TransportState::Closed as u8, Ordering::Release);
        self.closed_tx.send_replace(true);
    }

    fn transition(&self, from: TransportState, to: TransportState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counting {
        sent: AtomicUsize,
        flushed: AtomicUsize,
        closed: AtomicUsize,
        fail_close: bool,
        stall_flush: bool,
    }

    #[async_trait]
    impl Transport for Counting {
        fn is_active(&self) -> bool {
            self.closed.load(Ordering::SeqCst) == 0
        }

        async fn send(&self, _bytes: &[u8]) -> Result<(), TransportError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn flush(&self) -> Result<(), TransportError> {
            self.flushed.fetch_add(1, Ordering::SeqCst);
            if self.stall_flush {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn close(&self) -> Result<(), TransportError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(TransportError::Write("boom".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn send_requires_active() {
        let inner = Arc::new(Counting::default());
        let t = SessionTransport::new(inner.clone());
        assert!(matches!(t.send(b"x").await, Err(TransportError::Closed)));
        assert!(t.activate());
        assert!(!t.activate());
        t.send(b"x").await.unwrap();
        assert_eq!(inner.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_flushes_then_closes_once() {
        let inner = Arc::new(Counting::default());
        let t = SessionTransport::new(inner.clone());
        t.activate();
        t.shutdown().await;
        t.shutdown().await;
        t.close().await;
        assert_eq!(inner.flushed.load(Ordering::SeqCst), 1);
        assert_eq!(inner.closed.load(Ordering::SeqCst), 1);
        assert_eq!(t.state(), TransportState::Closed);
        assert!(!t.is_active());
    }

    #[tokio::test]
    async fn shutdown_before_activation_does_nothing() {
        let inner = Arc::new(Counting::default());
        let t = SessionTransport::new(inner.clone());
        t.shutdown().await;
        assert_eq!(t.state(), TransportState::Created);
        t.close().await;
        assert_eq!(inner.flushed.load(Ordering::SeqCst), 0);
        assert_eq!(inner.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_failure_is_swallowed() {
        let inner = Arc::new(Counting {
            fail_close: true,
            ..Default::default()
        });
        let t = SessionTransport::new(inner.clone());
        t.activate();
        t.close().await;
        assert_eq!(t.state(), TransportState::Closed);
    }

    #[tokio::test]
    async fn closed_resolves_after_close() {
        let t = Arc::new(SessionTransport::new(Arc::new(Counting::default())));
        t.activate();
        let waiter = {
            let t = t.clone();
            tokio::spawn(async move { t.closed().await })
        };
        t.close().await;
        waiter.await.unwrap();
        // Already closed: resolves immediately.
        t.closed().await;
    }

    #[tokio::test]
    async fn close_takes_over_a_stuck_shutdown() {
        let inner = Arc::new(Counting {
            stall_flush: true,
            ..Default::default()
        });
        let t = Arc::new(SessionTransport::new(inner.clone()));
        t.activate();

        let graceful = {
            let t = t.clone();
            tokio::spawn(async move { t.shutdown().await })
        };
        tokio::task::yield_now().await;
        assert_eq!(t.state(), TransportState::ShuttingDown);

        t.close().await;
        assert_eq!(t.state(), TransportState::Closed);
        assert_eq!(inner.closed.load(Ordering::SeqCst), 1);
        tokio::time::timeout(Duration::from_millis(100), t.closed()).await.unwrap();

        graceful.abort();
        t.close().await;
        assert_eq!(inner.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_gives_up_on_a_stuck_flush() {
        let inner = Arc::new(Counting {
            stall_flush: true,
            ..Default::default()
        });
        let t = SessionTransport::new(inner.clone()).with_flush_timeout(Duration::from_millis(50));
        t.activate();

        tokio::time::timeout(Duration::from_secs(2), t.shutdown()).await.unwrap();
        assert_eq!(t.state(), TransportState::Closed);
        assert_eq!(inner.closed.load(Ordering::SeqCst), 1);
    }
}
