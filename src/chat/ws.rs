use axum::{
    debug_handler,
    extract::{ws::{Message as WsMessage, WebSocket}, Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    auth::bearer_token,
    notify::{ErrorEvent, EventSender, Membership, SendFailure, ServerEvent},
    users, AppError, AppResult, AppState,
};

use super::msg;

#[derive(Deserialize)]
pub(crate) struct WsQuery {
    token: Option<String>,
}

/// Frames a client may send, framed like [`ServerEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinRoom(Uuid),
    SendMessage(SendMessageFrame),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageFrame {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    /// Opaque client-side id, echoed back in `send_failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// Browsers can't set headers on a WebSocket upgrade, so the token may also
/// come in the `token` query parameter.
#[debug_handler(state = AppState)]
pub(crate) async fn chat_ws(
    Query(WsQuery { token }): Query<WsQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let user_id = match token.as_deref() {
        Some(token) => state.verifier.verify(token)?,
        None => state.verifier.verify(bearer_token(&headers)?)?,
    };
    if !users::exists(&state.db_pool, user_id).await? {
        return Err(AppError::NotFound("user"));
    }

    Ok(ws.on_upgrade(move |socket| serve_socket(socket, state, user_id)))
}

async fn serve_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    tracing::info!(user = %user_id, "socket connected");

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let (mut sender, mut receiver) = socket.split();

    let mut forward_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    tracing::error!(error = %err, "failed to encode event");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut membership: Option<Membership> = None;
    loop {
        let frame = tokio::select! {
            frame = receiver.next() => frame,
            _ = &mut forward_task => break,
        };
        let Some(Ok(frame)) = frame else {
            break;
        };

        let event = match frame {
            WsMessage::Text(text) => serde_json::from_str::<ClientEvent>(text.as_str()),
            WsMessage::Binary(bytes) => serde_json::from_slice::<ClientEvent>(&bytes),
            WsMessage::Close(_) => break,
            _ => continue,
        };

        match event {
            Ok(event) => handle_event(&state, user_id, &tx, &mut membership, event).await,
            Err(err) => {
                tracing::warn!(user = %user_id, error = %err, "malformed frame");
                let _ = tx.send(error_event(&AppError::invalid(format!("malformed frame: {err}"))));
            }
        }
    }

    drop(membership);
    forward_task.abort();
    tracing::info!(user = %user_id, "socket disconnected");
}

async fn handle_event(
    state: &AppState,
    user_id: Uuid,
    tx: &EventSender,
    membership: &mut Option<Membership>,
    event: ClientEvent,
) {
    match event {
        ClientEvent::JoinRoom(room) if room != user_id => {
            tracing::warn!(user = %user_id, room = %room, "attempt to join another user's room");
            let _ = tx.send(error_event(&AppError::Unauthenticated("can only join your own room")));
        }
        ClientEvent::JoinRoom(room) => {
            if membership.is_none() {
                *membership = Some(state.rooms.join(room, tx.clone()));
            }
            let _ = tx.send(ServerEvent::RoomJoined(room));
        }
        ClientEvent::SendMessage(frame) => {
            let SendMessageFrame { sender_id, receiver_id, content, client_id } = frame;
            let result = if sender_id != user_id {
                Err(AppError::Unauthenticated("senderId does not match the connection"))
            } else {
                msg::send_message(&state.db_pool, &state.rooms, sender_id, receiver_id, content.clone()).await
            };

            if let Err(err) = result {
                tracing::warn!(user = %user_id, receiver = %receiver_id, kind = err.kind(), error = %err, "send failed");
                let _ = tx.send(ServerEvent::SendFailed(SendFailure {
                    client_id,
                    receiver_id,
                    content,
                    error: err.kind().to_owned(),
                    message: err.public_message(),
                }));
            }
        }
    }
}

fn error_event(err: &AppError) -> ServerEvent {
    ServerEvent::Error(ErrorEvent {
        error: err.kind().to_owned(),
        message: err.public_message(),
    })
}
