//! ConnectHandler - registration branch
//!
//! Upgrades `/?new` requests to a WebSocket, registers the agent under a
//! subdomain, sends it the `init` message and then pumps messages until the
//! socket closes.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tunl_common::Message;
use tunl_common::constants::OUTBOUND_QUEUE_CAPACITY;
use tunl_common::validation::validate_subdomain;

use super::{handle_agent_message, handle_disconnect};
use crate::registry::AgentHandle;
use crate::{AppState, text_response};

/// Handle a registration request
pub fn handle_connect(
    state: AppState,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    requested: Option<String>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!("Registration request without a usable upgrade: {}", rejection);
            return text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "WebSocket upgrade failed",
            );
        }
    };

    let requested = requested.filter(|s| !s.is_empty()).filter(|s| {
        validate_subdomain(s)
            .inspect_err(|e| info!("Ignoring requested subdomain: {}", e))
            .is_ok()
    });

    ws.on_failed_upgrade(|e| error!("WebSocket upgrade failed: {}", e))
        .on_upgrade(move |socket| run_agent_socket(state, socket, requested))
}

/// Drive one agent connection from registration to removal
async fn run_agent_socket(state: AppState, socket: WebSocket, requested: Option<String>) {
    let (sink, stream) = socket.split();
    let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);

    let handle = AgentHandle::new(outgoing_tx);
    let connection_id = handle.connection_id.clone();
    let subdomain = state.registry.register(requested.as_deref(), handle.clone());
    let url = state.config.public_url(&subdomain);

    info!(
        "+ {} ({} connected) -> {}",
        subdomain,
        state.registry.len(),
        url
    );

    let writer = tokio::spawn(write_loop(sink, outgoing_rx));

    if let Err(e) = handle.send(&Message::Init { url }).await {
        error!("Failed to queue init for {}: {}", subdomain, e);
    }
    drop(handle);

    read_loop(stream, &state, &subdomain).await;

    handle_disconnect(&state, &subdomain, &connection_id);
    writer.abort();
}

/// Forward queued messages to the socket
async fn write_loop(
    mut sink: SplitSink<WebSocket, WsMessage>,
    mut outgoing_rx: mpsc::Receiver<String>,
) {
    while let Some(text) = outgoing_rx.recv().await {
        if let Err(e) = sink.send(WsMessage::Text(text.into())).await {
            warn!("Failed to write to agent socket: {}", e);
            break;
        }
    }
    let _ = sink.close().await;
    debug!("Agent writer exiting");
}

/// Read agent messages until the socket closes
async fn read_loop(mut stream: SplitStream<WebSocket>, state: &AppState, subdomain: &str) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(WsMessage::Text(text)) => {
                handle_agent_message(&state.pending, subdomain, text.as_str());
            }
            Ok(WsMessage::Binary(data)) => match std::str::from_utf8(&data) {
                Ok(text) => handle_agent_message(&state.pending, subdomain, text),
                Err(_) => debug!("Ignoring non-UTF-8 binary frame from {}", subdomain),
            },
            Ok(WsMessage::Close(_)) => {
                debug!("Agent {} closed the connection", subdomain);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Agent {} socket error: {}", subdomain, e);
                break;
            }
        }
    }
}
