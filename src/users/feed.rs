use axum::{debug_handler, extract::State, Json};
use sqlx::SqlitePool;

use crate::{auth::AuthUser, AppResult, AppState};

use super::{feed_for, PublicProfile, FEED_LIMIT};

#[debug_handler(state = AppState)]
pub(crate) async fn feed(
    AuthUser(user_id): AuthUser,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<PublicProfile>>> {
    let profiles = feed_for(&db_pool, user_id, FEED_LIMIT).await?;
    tracing::debug!(user = %user_id, count = profiles.len(), "feed served");
    Ok(Json(profiles))
}
