//! WebSocket Session Handler
//!
//! Handles the WebSocket upgrade and runs one session's two pumps: the
//! inbound pump forwards every received payload to the hub, and the
//! outbound pump drains the session's bounded queue back to the socket.
//! The inbound side owns the Leave signal; the hub closing the outbound
//! queue (leave or eviction) is what tells the outbound pump to stop.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::hub::{HubHandle, Payload, Session, SessionId};

use super::AppState;

/// WebSocket upgrade handler
///
/// This is the entry point for chat connections. An upgrade failure is
/// terminal for that one connection attempt only; axum replies with an
/// error response and no session is ever created.
pub async fn chat_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let hub = state.hub.clone();
    let capacity = state.config.hub.outbound_capacity;
    ws.on_upgrade(move |socket| handle_socket(socket, hub, capacity))
}

/// Run one session over an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: HubHandle, capacity: usize) {
    let (mut sink, mut stream) = socket.split();

    let (tx, mut rx) = mpsc::channel::<Payload>(capacity);
    let id = SessionId::new();

    if hub.join(Session { id, outbound: tx }).await.is_err() {
        tracing::error!(session_id = %id, "hub is gone, dropping connection");
        return;
    }
    tracing::debug!(session_id = %id, "session connected");

    // Outbound pump: drain the queue into the socket. Ends when the hub
    // closes the queue (leave or eviction) or a send fails; a send failure
    // does not issue Leave - cleanup arrives via the read side.
    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sink.send(to_ws_message(payload)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Inbound pump: forward every payload to the hub. A read error or a
    // close frame ends the pump; Leave is issued once, below.
    let hub_for_recv = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            let payload = match result {
                Ok(Message::Text(text)) => text.into_bytes(),
                Ok(Message::Binary(data)) => data,
                Ok(Message::Close(_)) => break,
                // Ping/pong are answered by axum itself
                Ok(_) => continue,
                Err(_) => break,
            };
            if hub_for_recv.forward(payload).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Sole self-reported Leave for this session. If the hub already
    // evicted it, the removal inside the hub is a no-op.
    if hub.leave(id).await.is_err() {
        tracing::debug!(session_id = %id, "hub stopped before session cleanup");
    }
    tracing::debug!(session_id = %id, "session closed");
}

/// Payloads are opaque bytes to the hub; text that arrives as text goes
/// back out as text so browser clients see plain strings.
fn to_ws_message(payload: Payload) -> Message {
    match String::from_utf8(payload) {
        Ok(text) => Message::Text(text),
        Err(err) => Message::Binary(err.into_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_payload_becomes_text_frame() {
        let msg = to_ws_message(b"hello".to_vec());
        assert!(matches!(msg, Message::Text(ref t) if t == "hello"));
    }

    #[test]
    fn test_non_utf8_payload_becomes_binary_frame() {
        let payload = vec![0xff, 0xfe, 0x00];
        let msg = to_ws_message(payload.clone());
        assert!(matches!(msg, Message::Binary(ref b) if *b == payload));
    }
}
