use axum::{debug_handler, extract::{Path, State}, Json};
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{auth::AuthUser, notify::Rooms, AppJson, AppResult, AppState};

use super::msg::{self, Message};

#[derive(Debug, Deserialize)]
pub(crate) struct PostMessage {
    content: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn chat_history(
    AuthUser(user_id): AuthUser,
    Path(partner_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<Message>>> {
    Ok(Json(msg::history(&db_pool, user_id, partner_id).await?))
}

/// Same relay as the socket's `send_message`, for clients without a live connection.
#[debug_handler(state = AppState)]
pub(crate) async fn post_message(
    AuthUser(user_id): AuthUser,
    Path(partner_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(rooms): State<Rooms>,
    AppJson(PostMessage { content }): AppJson<PostMessage>,
) -> AppResult<Json<Message>> {
    Ok(Json(msg::send_message(&db_pool, &rooms, user_id, partner_id, content).await?))
}
