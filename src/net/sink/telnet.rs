use crate::net::sink::ClientSink;
use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

const IAC: u8 = 255;

pub struct TelnetSink<W> {
    writer: W,
}

impl<W> TelnetSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W> ClientSink for TelnetSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send_bytes(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn flush(&mut self) -> anyhow::Result<()> {
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Doubles IAC bytes in outgoing data so the client does not read them as commands.
pub fn escape_iac(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &b in bytes {
        out.push(b);
        if b == IAC {
            out.push(IAC);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_pass_through() {
        let mut sink = TelnetSink::new(Vec::<u8>::new());
        sink.send_bytes(b"hello\r\n").await.unwrap();
        sink.send_bytes(b"x").await.unwrap();
        assert_eq!(sink.writer, b"hello\r\nx");
    }

    #[test]
    fn iac_is_doubled() {
        assert_eq!(escape_iac(&[1, IAC, 2]), vec![1, IAC, IAC, 2]);
    }
}
