use crate::error::TransportError;
use crate::net::sink::ClientSink;
use crate::net::sink::telnet::TelnetSink;
use bytes::Bytes;
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;

const OUTPUT_QUEUE: usize = 64;

pub enum OutEvent {
    /// Bytes for the client, already rendered
    Data(Bytes),
    /// Flush the socket and acknowledge
    Flush(oneshot::Sender<()>),
    /// Shut the socket down and stop the writer
    Close,
}

/// Sending side of a session's writer task. Cheap to clone.
#[derive(Clone)]
pub struct OutputHandle {
    tx: mpsc::Sender<OutEvent>,
    writer: Option<AbortHandle>,
}

impl OutputHandle {
    pub fn new(tx: mpsc::Sender<OutEvent>) -> Self {
        Self { tx, writer: None }
    }

    /// Ties the handle to its writer task so a close can stop a stuck writer.
    pub fn with_writer(mut self, writer: AbortHandle) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    pub async fn data(&self, bytes: impl Into<Bytes>) -> Result<(), TransportError> {
        self.tx
            .send(OutEvent::Data(bytes.into()))
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Telnet negotiation bytes; they bypass the session lifecycle.
    pub async fn raw(&self, bytes: Vec<u8>) {
        let _ = self.tx.send(OutEvent::Data(Bytes::from(bytes))).await;
    }

    pub async fn flush(&self) -> Result<(), TransportError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(OutEvent::Flush(ack_tx))
            .await
            .map_err(|_| TransportError::Closed)?;
        ack_rx.await.map_err(|_| TransportError::Closed)
    }

    /// Queues a close behind pending output. When the queue is full the client has
    /// stopped reading, so the writer task is aborted instead.
    pub async fn close(&self) {
        match self.tx.try_send(OutEvent::Close) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("output queue full, aborting writer");
                if let Some(writer) = &self.writer {
                    writer.abort();
                }
            }
        }
    }
}

pub struct SessionOut {
    rx: mpsc::Receiver<OutEvent>,
}

impl SessionOut {
    pub fn new(rx: mpsc::Receiver<OutEvent>) -> Self {
        Self { rx }
    }

    pub async fn run<C>(mut self, mut client: C) -> anyhow::Result<()>
    where
        C: ClientSink,
    {
        while let Some(event) = self.rx.recv().await {
            match event {
                OutEvent::Data(bytes) => client.send_bytes(&bytes).await?,
                OutEvent::Flush(ack) => {
                    client.flush().await?;
                    let _ = ack.send(());
                }
                OutEvent::Close => {
                    client.close().await?;
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Spawns the writer task for a telnet socket and returns its handle.
pub fn init_session_for_telnet<W>(writer: W) -> OutputHandle
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<OutEvent>(OUTPUT_QUEUE);
    let session_out = SessionOut::new(rx);
    let sink = TelnetSink::new(writer);

    let writer = tokio::spawn(async move {
        if let Err(e) = session_out.run(sink).await {
            tracing::debug!(error = %e, "session output ended");
        }
    });

    OutputHandle::new(tx).with_writer(writer.abort_handle())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn close_on_a_full_queue_stops_the_writer() {
        let (tx, _rx) = mpsc::channel::<OutEvent>(1);
        let writer = tokio::spawn(std::future::pending::<()>());
        let out = OutputHandle::new(tx).with_writer(writer.abort_handle());

        out.data("fills the queue").await.unwrap();
        tokio::time::timeout(Duration::from_millis(100), out.close()).await.unwrap();

        assert!(writer.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn close_after_writer_exit_is_quiet() {
        let (tx, rx) = mpsc::channel::<OutEvent>(1);
        drop(rx);
        let out = OutputHandle::new(tx);
        out.close().await;
        assert!(!out.is_open());
    }
}
