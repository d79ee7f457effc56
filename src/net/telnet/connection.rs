use crate::error::AppResult;
use crate::input::is_multi_byte;
use crate::menu::MenuEngine;
use crate::net::output::OutputHandle;
use crate::net::telnet::negotiation::{TelnetIn, TelnetMachine};
use crate::state::transport::SessionTransport;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;

const READ_CHUNK: usize = 512;

/// Reads until the caller hangs up, the session is closed from elsewhere or the
/// idle timer runs out.
pub async fn handle_connection(
    mut reader: OwnedReadHalf,
    output: &OutputHandle,
    telnet: &mut TelnetMachine,
    engine: &mut MenuEngine,
    transport: &SessionTransport,
    idle: Option<Duration>,
) -> AppResult<()> {
    let mut buf = [0u8; READ_CHUNK];
    let mut input = InputDecoder::default();

    loop {
        let read = tokio::select! {
            _ = transport.closed() => break,
            r = read_some(&mut reader, &mut buf, idle) => r?,
        };

        let Some(n) = read else {
            tracing::info!(node = %engine.node(), "idle timeout, hanging up");
            transport.shutdown().await;
            break;
        };
        if n == 0 {
            break;
        }

        for &b in &buf[..n] {
            let response = telnet.push(b);
            if let Some(reply) = response.reply {
                output.raw(reply.to_vec()).await;
            }
            match response.event {
                Some(TelnetIn::Data(b)) => input.push(b),
                Some(TelnetIn::Naws { cols, rows }) => {
                    tracing::debug!(node = %engine.node(), cols, rows, "window size");
                }
                None => {}
            }
        }

        let text = input.take();
        if text.is_empty() {
            continue;
        }
        engine.dispatch(&text, is_multi_byte(&text)).await;
    }
    Ok(())
}

/// `Ok(None)` when the idle timer fired.
async fn read_some(reader: &mut OwnedReadHalf, buf: &mut [u8], idle: Option<Duration>) -> AppResult<Option<usize>> {
    match idle {
        Some(limit) => match tokio::time::timeout(limit, reader.read(buf)).await {
            Ok(n) => Ok(Some(n?)),
            Err(_) => Ok(None),
        },
        None => Ok(Some(reader.read(buf).await?)),
    }
}

/// Turns data bytes into text: telnet line ends (`CR LF`, `CR NUL`) collapse to `CR`
/// and a UTF-8 sequence split across reads waits for its tail.
#[derive(Debug, Default)]
struct InputDecoder {
    pending: Vec<u8>,
    last_cr: bool,
}

impl InputDecoder {
    fn push(&mut self, b: u8) {
        let after_cr = std::mem::replace(&mut self.last_cr, b == b'\r');
        if after_cr && (b == b'\n' || b == 0) {
            return;
        }
        if b == 0 {
            return;
        }
        self.pending.push(b);
    }

    fn take(&mut self) -> String {
        match std::str::from_utf8(&self.pending) {
            Ok(s) => {
                let s = s.to_string();
                self.pending.clear();
                s
            }
            Err(e) if e.error_len().is_none() => {
                let tail = self.pending.split_off(e.valid_up_to());
                let head = std::mem::replace(&mut self.pending, tail);
                String::from_utf8_lossy(&head).into_owned()
            }
            Err(_) => {
                let s = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                s
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(d: &mut InputDecoder, bytes: &[u8]) -> String {
        for &b in bytes {
            d.push(b);
        }
        d.take()
    }

    #[test]
    fn telnet_line_ends_collapse() {
        let mut d = InputDecoder::default();
        assert_eq!(decode(&mut d, b"ab\r\n"), "ab\r");
        assert_eq!(decode(&mut d, b"c\r\0"), "c\r");
    }

    #[test]
    fn lf_in_next_read_is_still_dropped() {
        let mut d = InputDecoder::default();
        assert_eq!(decode(&mut d, b"x\r"), "x\r");
        assert_eq!(decode(&mut d, b"\n"), "");
    }

    #[test]
    fn split_utf8_waits_for_tail() {
        let mut d = InputDecoder::default();
        let e = "é".as_bytes();
        assert_eq!(decode(&mut d, &e[..1]), "");
        assert_eq!(decode(&mut d, &e[1..]), "é");
    }
}
