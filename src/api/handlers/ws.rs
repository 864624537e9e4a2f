// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! WebSocket endpoint for channel subscriptions
//!
//! Client messages:
//! - `{"type":"subscribe","channel":C}` answered with `subscribed`
//! - `{"type":"unsubscribe","channel":C}` answered with `unsubscribed`
//! - `{"type":"ping"}` answered with `pong`

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::api::AppState;
use crate::broadcast::{BroadcastHub, Subscription};
use crate::snapshot::unix_now;

#[derive(Debug, Deserialize)]
struct ClientMessage {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    channel: Option<String>,
}

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(mut socket: WebSocket, hub: Arc<BroadcastHub>) {
    let Subscription { id, mut rx } = hub.connect().await;

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_client_message(&hub, id, text.as_str()).await {
                        if socket.send(Message::Text(reply.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!("WebSocket {} receive error: {}", id, e);
                    break;
                }
            },
            outgoing = rx.recv() => match outgoing {
                Some(text) => {
                    if socket.send(Message::Text(text.to_string().into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    hub.disconnect(id).await;
}

/// Apply one client message; returns the reply to send, if any
pub(crate) async fn handle_client_message(hub: &BroadcastHub, id: u64, text: &str) -> Option<Value> {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Ignoring malformed message from subscriber {}: {}", id, e);
            return None;
        }
    };

    match (message.kind.as_str(), message.channel) {
        ("subscribe", Some(channel)) if !channel.is_empty() => {
            hub.subscribe(id, &channel).await;
            Some(json!({"type": "subscribed", "channel": channel, "status": "success"}))
        }
        ("unsubscribe", Some(channel)) if !channel.is_empty() => {
            hub.unsubscribe(id, &channel).await;
            Some(json!({"type": "unsubscribed", "channel": channel, "status": "success"}))
        }
        ("ping", _) => Some(json!({"type": "pong", "timestamp": unix_now()})),
        ("subscribe" | "unsubscribe", _) => None,
        (kind, _) => {
            tracing::warn!("Unknown message type from subscriber {}: {}", id, kind);
            None
        }
    }
}
