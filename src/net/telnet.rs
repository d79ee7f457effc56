mod connection;
pub mod negotiation;

use crate::error::{AppResult, InfraError, RegistryError, TransportError};
use crate::menu::MenuEngine;
use crate::net::output::{OutputHandle, init_session_for_telnet};
use crate::net::sink::telnet::escape_iac;
use crate::net::telnet::connection::handle_connection;
use crate::net::telnet::negotiation::TelnetMachine;
use crate::services::Services;
use crate::state::registry::SessionRegistry;
use crate::state::transport::{SessionTransport, Transport};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::Instrument;

const BOARD_FULL: &str = "\r\nAll nodes are busy, please call back later.\r\n";

/// The session-facing transport of a telnet connection.
pub struct TelnetTransport {
    output: OutputHandle,
}

impl TelnetTransport {
    pub fn new(output: OutputHandle) -> Self {
        Self { output }
    }
}

#[async_trait]
impl Transport for TelnetTransport {
    fn is_active(&self) -> bool {
        self.output.is_open()
    }

    async fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        self.output.data(escape_iac(bytes)).await
    }

    async fn flush(&self) -> Result<(), TransportError> {
        self.output.flush().await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.output.close().await;
        Ok(())
    }
}

/// Run the telnet server
pub async fn serve(addr: SocketAddr, services: Arc<Services>, registry: Arc<SessionRegistry>) -> AppResult<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(InfraError::from)?;
    tracing::info!(%addr, "telnet listening");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tracing::info!(%peer, "client connected");
                let services = services.clone();
                let registry = registry.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_telnet_connection(stream, peer, services, registry).await {
                        tracing::error!(%peer, error = %e, "connection error");
                    }
                    tracing::info!(%peer, "client disconnected");
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to accept connection");
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
        }
    }
}

async fn handle_telnet_connection(
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    services: Arc<Services>,
    registry: Arc<SessionRegistry>,
) -> AppResult<()> {
    let (read_half, write_half) = stream.into_split();
    let output = init_session_for_telnet(write_half);
    let transport = Arc::new(SessionTransport::new(Arc::new(TelnetTransport::new(output.clone()))));

    let session = match registry.open(transport.clone()).await {
        Ok(session) => session,
        Err(RegistryError::Full(max)) => {
            tracing::warn!(%peer, max, "board full, turning caller away");
            output.raw(BOARD_FULL.as_bytes().to_vec()).await;
            transport.close().await;
            return Ok(());
        }
        Err(e) => {
            transport.close().await;
            return Err(e.into());
        }
    };

    let span = tracing::info_span!("session", node = %session.node, session_id = %session.session_id, %peer);
    async move {
        let mut telnet = TelnetMachine::new();
        output.raw(TelnetMachine::start_negotiation()).await;
        transport.activate();

        let mut engine = MenuEngine::new(services.clone(), registry.clone(), session.clone());
        engine.startup_module_pre_logon().await;

        let idle = services.config.idle_timeout();
        let result = handle_connection(read_half, &output, &mut telnet, &mut engine, &transport, idle).await;

        engine.terminate().await;
        transport.close().await;
        registry.leave(session.node).await;
        result
    }
    .instrument(span)
    .await
}
