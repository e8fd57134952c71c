//! WebSocket transport server using Axum.
//!
//! Handles HTTP upgrade to WebSocket, host-header extraction, and packet
//! routing between the wire and the per-connection sequencer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Router,
    extract::{
        ConnectInfo, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use swb_core::{Client, ConnectionMeta, PacketSink, Registry};
use swb_protocol::Packet;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::status;

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Hostname to bind to
    pub hostname: String,
    /// Maximum concurrent connections
    pub max_connections: Option<usize>,
    /// Enable verbose connection logging
    pub verbose_logging: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 7080,
            hostname: "127.0.0.1".into(),
            max_connections: Some(1024),
            verbose_logging: false,
        }
    }
}

/// Shared state for the transport server.
struct AppState {
    registry: Arc<Registry>,
    config: TransportConfig,
    /// Connected client count (for health check)
    client_count: Arc<AtomicUsize>,
}

/// The transport server — accepts WebSocket connections and shuttles
/// packets between clients and the namespace registry.
pub struct TransportServer {
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
    port: u16,
}

impl TransportServer {
    /// Start the transport server against the given registry.
    pub async fn start(
        config: TransportConfig,
        registry: Arc<Registry>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let public_status = registry.config().public_status;
        let state = Arc::new(AppState {
            registry,
            config: config.clone(),
            client_count: Arc::new(AtomicUsize::new(0)),
        });

        let mut app = Router::new()
            .route("/ws", get(ws_upgrade_handler))
            .route("/health", get(health_handler));
        if public_status {
            app = app.route("/status", get(status_handler));
        }
        let app = app.with_state(state);

        let addr: SocketAddr = format!("{}:{}", config.hostname, config.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        info!(
            "switchboard transport listening on ws://{}:{}/ws",
            config.hostname, actual_port
        );

        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
            .ok();
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            port: actual_port,
        })
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Gracefully stop the server.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("switchboard transport server stopped");
    }
}

/// `PacketSink` backed by the connection's outgoing channel.
struct ChannelSink(mpsc::UnboundedSender<Packet>);

impl PacketSink for ChannelSink {
    fn deliver(&self, packet: Packet) {
        // The connection may already be closing; drops are fine.
        let _ = self.0.send(packet);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

fn host_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    // Check connection limit
    if let Some(max) = state.config.max_connections {
        let current = state.client_count.load(Ordering::Relaxed);
        if current >= max {
            warn!("Connection rejected: max connections reached ({max})");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    }

    let meta = ConnectionMeta {
        host: host_header(&headers),
        remote_addr: Some(addr),
    };

    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, meta))
        .into_response()
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "clients": state.client_count.load(Ordering::Relaxed),
        "namespaces": state.registry.len(),
    }))
}

async fn status_handler(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let meta = ConnectionMeta {
        host: host_header(&headers),
        remote_addr: None,
    };
    let requester_is_main = state.registry.resolve_host(&meta).is_none();
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        status::render(&state.registry, requester_is_main),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket Connection Handler
// ─────────────────────────────────────────────────────────────────────────────

async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>, meta: ConnectionMeta) {
    state.client_count.fetch_add(1, Ordering::Relaxed);

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (pkt_tx, mut pkt_rx) = mpsc::unbounded_channel::<Packet>();
    let client = Client::new(
        state.registry.clone(),
        meta,
        Arc::new(ChannelSink(pkt_tx)),
    );
    info!("client connected: {}", client.id());

    loop {
        tokio::select! {
            // Incoming WebSocket message
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_packet(&client, &text, state.config.verbose_logging);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("client disconnected: {}", client.id());
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("websocket error for {}: {e}", client.id());
                        break;
                    }
                    _ => {}
                }
            }

            // Outgoing packets from the namespace layer
            packet = pkt_rx.recv() => {
                let Some(packet) = packet else { break };
                match packet.encode() {
                    Ok(text) => {
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("failed to encode packet: {e}"),
                }
            }
        }
    }

    client.close();
    state.client_count.fetch_sub(1, Ordering::Relaxed);
    info!(
        "client disconnected: {} (total: {})",
        client.id(),
        state.client_count.load(Ordering::Relaxed)
    );
}

fn handle_packet(client: &Client, text: &str, verbose: bool) {
    let packet = match Packet::decode(text) {
        Ok(p) => p,
        Err(e) => {
            warn!("bad packet from {}: {e}", client.id());
            return;
        }
    };
    if verbose {
        debug!(client = client.id(), packet = ?packet, "packet received");
    }

    match packet {
        Packet::Connect { nsp, .. } => {
            // Join failures are already delivered as CONNECT_ERROR packets.
            let _ = client.request_join(&nsp);
        }
        Packet::Disconnect { nsp } => client.leave(&nsp),
        Packet::Event { nsp, data } => client.forward_event(&nsp, data),
        // Server-to-client only; ignore if a client echoes one back.
        Packet::ConnectError { .. } => {}
    }
}
