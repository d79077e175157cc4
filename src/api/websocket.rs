//! WebSocket event sessions
//!
//! Each connection opens one event bus session. Clients bind to wallets with
//! `join`, to every wallet with `all` (admin only) and unbind with `leave`.

use crate::api::handlers::ApiState;
use crate::events::EventEnvelope;
use crate::multisig::{MultisigError, MultisigManager};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Client command
#[derive(Debug, Clone, Deserialize)]
pub struct WsCommand {
    pub method: String,
    #[serde(default)]
    pub params: Vec<String>,
}

/// Message pushed to a client
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WsMessage {
    Reply(WsReply),
    Event(EventEnvelope),
}

/// Reply to a client command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WsReply {
    Ack { method: String },
    Error { method: String, error: String },
}

/// Execute one command for a session
pub async fn dispatch(manager: &MultisigManager, session: u64, command: WsCommand) -> WsReply {
    let param = |i: usize| command.params.get(i).map(String::as_str);

    let result = match command.method.as_str() {
        "join" => match (param(0), param(1)) {
            (Some(wallet), Some(token)) => manager.subscribe(session, wallet, token).await,
            _ => Err(MultisigError::BadToken),
        },
        "all" => match param(0) {
            Some(token) => manager.subscribe(session, "*", token).await,
            None => Err(MultisigError::BadToken),
        },
        "leave" => {
            manager.unsubscribe(session, param(0).unwrap_or("*"));
            Ok(())
        }
        other => Err(MultisigError::InvalidOptions(format!(
            "unknown method: {}",
            other
        ))),
    };

    match result {
        Ok(()) => WsReply::Ack {
            method: command.method,
        },
        Err(e) => {
            log::debug!("Session {} {} failed: {}", session, command.method, e);
            WsReply::Error {
                method: command.method,
                error: e.to_string(),
            }
        }
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.manager))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, manager: Arc<MultisigManager>) {
    let (mut sender, mut receiver) = socket.split();

    let events = manager.events();
    let (session, mut event_rx) = events.open_session();
    let (reply_tx, mut reply_rx) = mpsc::channel::<WsReply>(16);
    log::debug!("WebSocket session {} opened", session);

    // Forward events and command replies to this client
    let mut send_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                Some(reply) = reply_rx.recv() => WsMessage::Reply(reply),
                Some(event) = event_rx.recv() => WsMessage::Event(event),
                else => break,
            };

            if let Ok(json) = serde_json::to_string(&message) {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming commands
    let recv_manager = manager.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(Message::Text(text)) => {
                    let reply = match serde_json::from_str::<WsCommand>(text.as_str()) {
                        Ok(command) => dispatch(&recv_manager, session, command).await,
                        Err(e) => WsReply::Error {
                            method: String::new(),
                            error: format!("malformed command: {}", e),
                        },
                    };
                    if reply_tx.send(reply).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    events.close_session(session);
    log::debug!("WebSocket session {} closed", session);
}
