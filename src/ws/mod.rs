pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use std::sync::Arc;

use crate::hub::Outbound;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            Ok(())
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let connection = ulid::Ulid::new().to_string();
    let mut outbound = state.hub.register(&connection).await;
    tracing::info!("WebSocket connected: {}", connection);

    let welcome = ServerMessage::Welcome {
        connection_id: connection.clone(),
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if send_json(&mut sender, &welcome).await.is_err() {
        tracing::error!("Failed to send welcome message");
        state.disconnect(&connection).await;
        return;
    }

    loop {
        tokio::select! {
            // Room traffic addressed to this connection
            out = outbound.recv() => {
                match out {
                    Some(Outbound::Message(msg)) => {
                        if send_json(&mut sender, &msg).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close) => {
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                    None => break,
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message from {}: {}", connection, text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handlers::handle_message(client_msg, &connection, &state).await
                                {
                                    if send_json(&mut sender, &response).await.is_err() {
                                        tracing::error!("Failed to send response");
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::warn!("Ignoring malformed message from {}: {}", connection, e);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed: {}", connection);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.disconnect(&connection).await;
    tracing::info!("WebSocket connection closed: {}", connection);
}
