pub mod telnet;

use async_trait::async_trait;

#[async_trait]
pub trait ClientSink: Send {
    async fn send_bytes(&mut self, bytes: &[u8]) -> anyhow::Result<()>;

    async fn flush(&mut self) -> anyhow::Result<()>;

    async fn close(&mut self) -> anyhow::Result<()>;
}
