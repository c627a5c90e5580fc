//! WebSocket Relay Server
//!
//! Async WebSocket front end: accepts connections, mints connection ids,
//! parses inbound frames, and hands every event to the coordinator.
//! All session state lives behind the coordinator's lock - this layer
//! only moves bytes.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::network::protocol::{ClientMessage, ServerMessage};
use crate::payout::PayoutService;
use crate::session::coordinator::{Coordinator, MatchConfig};
use crate::session::types::ConnectionId;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Reconnection window for wallet-identified players.
    pub grace_window: Duration,
    /// Delay before the mock payout acknowledgement.
    pub withdraw_ack_delay: Duration,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3001".parse().unwrap(),
            max_connections: 1000,
            grace_window: Duration::from_secs(30),
            withdraw_ack_delay: Duration::from_secs(2),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("GAMMON_BIND_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bind_addr),
            max_connections: std::env::var("GAMMON_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),
            grace_window: std::env::var("GAMMON_GRACE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.grace_window),
            withdraw_ack_delay: std::env::var("GAMMON_WITHDRAW_DELAY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.withdraw_ack_delay),
            version: defaults.version,
        }
    }
}

/// Relay server errors.
#[derive(Debug, thiserror::Error)]
pub enum RelayServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// The relay server.
pub struct RelayServer {
    /// Server configuration.
    config: ServerConfig,
    /// Matchmaking and relay core.
    coordinator: Coordinator,
    /// Mock payout collaborator.
    payout: PayoutService,
    /// Live connection count, for the accept-time limit check.
    connections: Arc<AtomicUsize>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl RelayServer {
    /// Create a new relay server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let coordinator = Coordinator::new(MatchConfig {
            grace_window: config.grace_window,
        });
        let payout = PayoutService::new(config.withdraw_ack_delay);

        Self {
            config,
            coordinator,
            payout,
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// Run the accept loop until shutdown.
    pub async fn run(&self) -> Result<(), RelayServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Relay server v{} listening on {}", self.config.version, self.config.bind_addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connections.load(Ordering::Relaxed) >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }
                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Drive a single WebSocket connection to completion.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let coordinator = self.coordinator.clone();
        let payout = self.payout.clone();
        let connections = self.connections.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        connections.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    connections.fetch_sub(1, Ordering::Relaxed);
                    return;
                }
            };

            let conn = ConnectionId::new();
            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<ServerMessage>();

            coordinator.connect(conn, msg_tx.clone()).await;
            info!(%conn, "client connected from {}", addr);

            // Outbound task: drain the channel into the socket.
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            // Inbound loop: per-connection messages are processed in
            // arrival order.
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        // Per-event failure only: drop the
                                        // frame, keep the connection.
                                        debug!(%conn, "invalid message: {}", e);
                                        continue;
                                    }
                                };
                                Self::dispatch(&coordinator, &payout, conn, &msg_tx, client_msg)
                                    .await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!(%conn, "client closed connection");
                                break;
                            }
                            Some(Err(e)) => {
                                debug!(%conn, "WebSocket error: {}", e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            sender_task.abort();
            coordinator.disconnect(conn).await;
            connections.fetch_sub(1, Ordering::Relaxed);
            info!(%conn, "client cleaned up");
        });
    }

    /// Route one parsed client message.
    async fn dispatch(
        coordinator: &Coordinator,
        payout: &PayoutService,
        conn: ConnectionId,
        msg_tx: &mpsc::UnboundedSender<ServerMessage>,
        msg: ClientMessage,
    ) {
        match msg {
            ClientMessage::FindMatch(identity) => {
                coordinator.find_match(conn, identity).await;
            }
            ClientMessage::CheckActiveGame { wallet } => {
                coordinator.check_active_game(conn, &wallet).await;
            }
            ClientMessage::GameEvent {
                room_id,
                kind,
                payload,
            } => {
                coordinator.relay_event(conn, &room_id, kind, payload).await;
            }
            ClientMessage::SyncState { room_id, state } => {
                coordinator.sync_state(conn, &room_id, state).await;
            }
            ClientMessage::ChatMessage {
                room_id,
                message,
                sender,
            } => {
                coordinator.chat(conn, &room_id, message, sender).await;
            }
            ClientMessage::RequestWithdraw { wallet, amount } => {
                payout.request_withdraw(msg_tx.clone(), wallet, amount);
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Live connection count.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.grace_window, Duration::from_secs(30));
        assert_eq!(config.bind_addr.port(), 3001);
    }

    #[tokio::test]
    async fn test_server_creation() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = RelayServer::new(config);
        assert_eq!(server.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_server_shutdown() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = RelayServer::new(config);
        server.shutdown();
        // Should not panic
    }
}
