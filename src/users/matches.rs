use axum::{debug_handler, extract::State, Json};
use sqlx::SqlitePool;

use crate::{auth::AuthUser, AppError, AppResult, AppState};

use super::{exists, matches_of, PublicProfile};

#[debug_handler(state = AppState)]
pub(crate) async fn matches(
    AuthUser(user_id): AuthUser,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<PublicProfile>>> {
    if !exists(&db_pool, user_id).await? {
        return Err(AppError::NotFound("user"));
    }

    Ok(Json(matches_of(&db_pool, user_id).await?))
}
