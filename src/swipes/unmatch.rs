use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{db, notify::{Rooms, ServerEvent}, users, AppError, AppResult};

/// Dissolves the match between `user_id` and `partner_id` and forgets both
/// right swipes, so each shows up in the other's feed again. Message history
/// stays. Returns whether a match existed.
pub async fn unmatch(db_pool: &SqlitePool, rooms: &Rooms, user_id: Uuid, partner_id: Uuid) -> AppResult<bool> {
    if user_id == partner_id {
        return Err(AppError::invalid("cannot unmatch yourself"));
    }
    if !users::exists(db_pool, partner_id).await? {
        return Err(AppError::NotFound("match partner"));
    }

    let (user_a, user_b) = db::pair_key(user_id, partner_id);
    let mut tx = db_pool.begin().await?;

    let removed = sqlx::query("DELETE FROM matches WHERE user_a = ? AND user_b = ?")
        .bind(user_a)
        .bind(user_b)
        .execute(&mut *tx)
        .await?
        .rows_affected()
        == 1;

    sqlx::query(
        "DELETE FROM swipes WHERE (actor_id = ?1 AND target_id = ?2) OR (actor_id = ?2 AND target_id = ?1)",
    )
    .bind(user_id)
    .bind(partner_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    if removed {
        rooms.publish(partner_id, &ServerEvent::Unmatched(user_id));
        rooms.publish(user_id, &ServerEvent::Unmatched(partner_id));
        tracing::info!(user = %user_id, partner = %partner_id, "unmatched");
    } else {
        tracing::debug!(user = %user_id, partner = %partner_id, "unmatch without a match");
    }
    Ok(removed)
}
