//! Axum WebSocket endpoint the instrumented application connects to.

use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use super::broker::{Bridge, BridgeStatus, PeerConnection};

/// Server configuration options.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on. `0` picks an ephemeral port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9229,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    #[serde(flatten)]
    bridge: BridgeStatus,
}

async fn health(State(bridge): State<Bridge>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        bridge: bridge.status(),
    })
}

async fn ws_handler(ws: WebSocketUpgrade, State(bridge): State<Bridge>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_peer_socket(socket, bridge))
}

/// Pump one peer connection: outbound commands from the broker, inbound frames into it.
async fn handle_peer_socket(socket: WebSocket, bridge: Bridge) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let PeerConnection {
        generation,
        mut outbound,
    } = bridge.attach_peer();

    let send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        if let Err(e) = ws_sender.close().await {
            tracing::debug!(generation, error = %e, "Failed to close peer socket");
        }
    });

    loop {
        tokio::select! {
            _ = bridge.closed() => break,
            next = ws_receiver.next() => match next {
                Some(Ok(Message::Text(text))) => bridge.handle_frame(text.as_str()),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(generation, error = %e, "Peer socket error");
                    break;
                }
            },
        }
    }

    bridge.detach_peer(generation);
    send_task.abort();
}

/// Build the router: `/` and `/ws` accept the peer, `/health` reports status.
pub fn build_router(bridge: Bridge) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(bridge)
}

/// Bind and serve in the background. Returns the bound address.
pub async fn spawn_server(
    bridge: Bridge,
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    let app = build_router(bridge.clone());

    let handle = tokio::spawn(async move {
        let shutdown = async move { bridge.closed().await };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!(error = %e, "Bridge server stopped");
        }
    });

    Ok((local, handle))
}
