use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteExecutor, SqlitePool};
use uuid::Uuid;

use crate::{auth::AuthUser, AppError, AppResult, AppState};

use super::{exists, PublicProfile, PROFILE_COLUMNS};

/// Right swipes that have not turned into a match yet, seen from one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequests {
    /// Users who swiped right on the caller.
    pub received: Vec<PublicProfile>,
    /// Users the caller swiped right on.
    pub sent: Vec<PublicProfile>,
}

const NOT_MATCHED: &str = "NOT EXISTS (
    SELECT 1 FROM matches m
    WHERE (m.user_a = ?1 AND m.user_b = u.id) OR (m.user_b = ?1 AND m.user_a = u.id)
)";

pub async fn received<'e>(db: impl SqliteExecutor<'e>, id: Uuid) -> AppResult<Vec<PublicProfile>> {
    let profiles = sqlx::query_as(&format!(
        "SELECT {PROFILE_COLUMNS} FROM swipes s JOIN users u ON u.id = s.actor_id
         WHERE s.target_id = ?1 AND {NOT_MATCHED}
         ORDER BY s.created_at DESC, s.rowid DESC"
    ))
    .bind(id)
    .fetch_all(db)
    .await?;
    Ok(profiles)
}

pub async fn sent<'e>(db: impl SqliteExecutor<'e>, id: Uuid) -> AppResult<Vec<PublicProfile>> {
    let profiles = sqlx::query_as(&format!(
        "SELECT {PROFILE_COLUMNS} FROM swipes s JOIN users u ON u.id = s.target_id
         WHERE s.actor_id = ?1 AND {NOT_MATCHED}
         ORDER BY s.created_at DESC, s.rowid DESC"
    ))
    .bind(id)
    .fetch_all(db)
    .await?;
    Ok(profiles)
}

pub async fn pending_requests(db_pool: &SqlitePool, id: Uuid) -> AppResult<PendingRequests> {
    if !exists(db_pool, id).await? {
        return Err(AppError::NotFound("user"));
    }

    Ok(PendingRequests {
        received: received(db_pool, id).await?,
        sent: sent(db_pool, id).await?,
    })
}

#[debug_handler(state = AppState)]
pub(crate) async fn requests(
    AuthUser(user_id): AuthUser,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<PendingRequests>> {
    Ok(Json(pending_requests(&db_pool, user_id).await?))
}
