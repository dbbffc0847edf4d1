use axum::{debug_handler, extract::State, Json};
use sqlx::SqlitePool;

use crate::{auth::AuthUser, AppResult, AppState};

use super::{profile, PublicProfile};

#[debug_handler(state = AppState)]
pub(crate) async fn me(
    AuthUser(user_id): AuthUser,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<PublicProfile>> {
    Ok(Json(profile(&db_pool, user_id).await?))
}
