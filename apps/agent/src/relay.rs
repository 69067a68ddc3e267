//! Relay loop between the broker and the local server
//!
//! A [`Tunnel`] is one registered WebSocket connection. It is not re-established
//! when it drops; [`Tunnel::serve`] simply returns.

use anyhow::Result;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message as WsMessage,
};
use tracing::{debug, error, info, warn};
use tunl_common::constants::OUTBOUND_QUEUE_CAPACITY;
use tunl_common::{Message, TunnelError};

use crate::config::Config;
use crate::forward::{build_client, forward_request};

type WebSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A registered connection to the broker
pub struct Tunnel {
    config: Config,
    public_url: String,
    stream: WebSocket,
}

impl Tunnel {
    /// Connect to the broker and wait for the `init` message
    pub async fn connect(config: Config) -> Result<Self> {
        debug!("Connecting to {}", config.websocket_url);

        let (mut stream, _) = tokio::time::timeout(
            config.connect_timeout,
            connect_async(config.websocket_url.as_str()),
        )
        .await
        .map_err(|_| TunnelError::Timeout)?
        .map_err(|e| TunnelError::ConnectionError(e.to_string()))?;

        debug!("WebSocket connection established, waiting for init");

        let public_url = tokio::time::timeout(config.connect_timeout, wait_for_init(&mut stream))
            .await
            .map_err(|_| TunnelError::Timeout)??;

        Ok(Self {
            config,
            public_url,
            stream,
        })
    }

    /// Public URL assigned by the broker
    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    /// Relay requests until the broker closes the connection
    pub async fn serve(self) -> Result<()> {
        let Tunnel { config, stream, .. } = self;
        let client = build_client(config.request_timeout)?;

        let (write, read) = stream.split();
        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);

        let mut write_handle = tokio::spawn(spawn_write_task(write, outgoing_rx));
        let mut read_handle = tokio::spawn(spawn_read_task(
            read,
            outgoing_tx.clone(),
            client,
            config.local_address.clone(),
        ));
        let mut heartbeat_handle = tokio::spawn(spawn_heartbeat_task(
            outgoing_tx,
            config.heartbeat_interval,
        ));

        // Any task ending means the connection is gone
        tokio::select! {
            result = &mut write_handle => {
                debug!("Write task ended: {:?}", result);
            }
            result = &mut read_handle => {
                debug!("Read task ended: {:?}", result);
            }
            result = &mut heartbeat_handle => {
                debug!("Heartbeat task ended: {:?}", result);
            }
        }

        write_handle.abort();
        read_handle.abort();
        heartbeat_handle.abort();

        Ok(())
    }
}

/// Read frames until `init` arrives
async fn wait_for_init(stream: &mut WebSocket) -> tunl_common::Result<String> {
    while let Some(message) = stream.next().await {
        match message {
            Ok(WsMessage::Text(text)) => match Message::from_json(&text) {
                Ok(Message::Init { url }) => return Ok(url),
                Ok(other) => debug!("Ignoring {:?} before init", other),
                Err(e) => debug!("Ignoring malformed message before init: {}", e),
            },
            Ok(WsMessage::Close(_)) => {
                return Err(TunnelError::ConnectionError(
                    "Server closed connection during handshake".to_string(),
                ));
            }
            Err(e) => return Err(TunnelError::WebSocketError(e.to_string())),
            _ => {}
        }
    }

    Err(TunnelError::ConnectionError(
        "Connection closed before handshake".to_string(),
    ))
}

/// Write task sends outgoing frames through the WebSocket
async fn spawn_write_task(
    mut write: SplitSink<WebSocket, WsMessage>,
    mut outgoing_rx: mpsc::Receiver<WsMessage>,
) -> Result<()> {
    while let Some(message) = outgoing_rx.recv().await {
        if let Err(e) = write.send(message).await {
            error!("Failed to send message: {}", e);
            break;
        }
    }

    debug!("Write task exiting");
    Ok(())
}

/// Read task receives broker frames and dispatches them
async fn spawn_read_task(
    mut read: SplitStream<WebSocket>,
    outgoing_tx: mpsc::Sender<WsMessage>,
    client: Client,
    local_address: String,
) -> Result<()> {
    while let Some(message) = read.next().await {
        match message {
            Ok(WsMessage::Text(text)) => {
                handle_text_message(&text, &outgoing_tx, &client, &local_address);
            }
            Ok(WsMessage::Ping(data)) => {
                if let Err(e) = outgoing_tx.send(WsMessage::Pong(data)).await {
                    error!("Failed to send pong: {}", e);
                    break;
                }
            }
            Ok(WsMessage::Pong(_)) => {
                debug!("Received WebSocket pong");
            }
            Ok(WsMessage::Close(_)) => {
                info!("Server closed connection");
                break;
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    debug!("Read task exiting");
    Ok(())
}

/// Handle one protocol message from the broker
fn handle_text_message(
    text: &str,
    outgoing_tx: &mpsc::Sender<WsMessage>,
    client: &Client,
    local_address: &str,
) {
    let message = match Message::from_json(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Ignoring malformed message: {}", e);
            return;
        }
    };

    match message {
        Message::Request(request) => {
            debug!("{} {} {}", request.id, request.method, request.pathname);

            // Each request runs on its own so a slow one never blocks the rest
            let client = client.clone();
            let local_address = local_address.to_string();
            let outgoing_tx = outgoing_tx.clone();

            tokio::spawn(async move {
                let response = forward_request(&client, &local_address, request).await;
                let json = match Message::from(response).to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize response: {}", e);
                        return;
                    }
                };
                if let Err(e) = outgoing_tx.send(WsMessage::Text(json.into())).await {
                    error!("Failed to queue response: {}", e);
                }
            });
        }
        Message::Init { url } => {
            info!("Public URL: {}", url);
        }
        Message::Response(response) => {
            warn!("Received unexpected response message {}", response.id);
        }
    }
}

/// Heartbeat task sends periodic WebSocket ping frames
async fn spawn_heartbeat_task(
    outgoing_tx: mpsc::Sender<WsMessage>,
    interval: Duration,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        if let Err(e) = outgoing_tx.send(WsMessage::Ping(Default::default())).await {
            error!("Failed to send heartbeat: {}", e);
            break;
        }

        debug!("Sent heartbeat");
    }

    debug!("Heartbeat task exiting");
    Ok(())
}
