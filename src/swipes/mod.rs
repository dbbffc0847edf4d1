mod swipe;
mod unmatch;

use axum::{debug_handler, extract::{Path, State}, routing::{delete, post}, Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{auth::AuthUser, notify::Rooms, AppError, AppJson, AppResult, AppState};

pub use swipe::{swipe, SwipeOutcome};
pub use unmatch::unmatch;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/swipe", post(swipe_action))
        .route("/api/matches/{partner_id}", delete(unmatch_action))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwipeRequest {
    pub target_user_id: Uuid,
    pub direction: Option<Direction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SwipeResponse {
    #[serde(rename = "match")]
    pub matched: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnmatchResponse {
    pub unmatched: bool,
}

#[debug_handler(state = AppState)]
async fn swipe_action(
    AuthUser(user_id): AuthUser,
    State(db_pool): State<SqlitePool>,
    State(rooms): State<Rooms>,
    AppJson(SwipeRequest { target_user_id, direction }): AppJson<SwipeRequest>,
) -> AppResult<Json<SwipeResponse>> {
    let direction = direction.ok_or(AppError::invalid("direction is required"))?;
    let outcome = swipe(&db_pool, &rooms, user_id, target_user_id, direction).await?;
    Ok(Json(SwipeResponse { matched: outcome.matched }))
}

#[debug_handler(state = AppState)]
async fn unmatch_action(
    AuthUser(user_id): AuthUser,
    Path(partner_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(rooms): State<Rooms>,
) -> AppResult<Json<UnmatchResponse>> {
    let unmatched = unmatch(&db_pool, &rooms, user_id, partner_id).await?;
    Ok(Json(UnmatchResponse { unmatched }))
}
