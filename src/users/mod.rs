//! The user directory: profiles, the one-way `swipedRight` set and the
//! symmetric match relation.

mod feed;
mod matches;
mod me;
mod requests;

use axum::{routing::get, Router};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use crate::{db, AppError, AppResult, AppState};

pub use requests::{pending_requests, PendingRequests};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(feed::feed))
        .route("/api/matches", get(matches::matches))
        .route("/api/requests", get(requests::requests))
        .route("/api/me", get(me::me))
}

/// Columns of [`PublicProfile`], for queries that alias `users` as `u`.
pub(crate) const PROFILE_COLUMNS: &str = "u.id, u.name, u.role, u.college, u.bio, u.skills, u.avatar_gradient";

pub const FEED_LIMIT: u32 = 20;

/// What other users get to see: the `match_found` payload and the
/// `/api/matches` projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: Uuid,
    pub name: String,
    pub role: Option<String>,
    pub college: Option<String>,
    pub bio: Option<String>,
    #[sqlx(json)]
    pub skills: Vec<String>,
    pub avatar_gradient: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub college: Option<String>,
    pub role: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

impl NewUser {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        NewUser {
            email: email.into(),
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

fn random_gradient() -> String {
    let mut rng = rand::rng();
    let from: u32 = rng.random_range(0..=0xFF_FFFF);
    let to: u32 = rng.random_range(0..=0xFF_FFFF);
    format!("linear-gradient(135deg, #{from:06x} 0%, #{to:06x} 100%)")
}

/// Creates a user who has no password yet; such an account cannot log in.
pub async fn create_user(db_pool: &SqlitePool, new_user: NewUser) -> AppResult<PublicProfile> {
    insert_user(db_pool, new_user, None).await
}

/// Creates a user that logs in with the password `password_hash` was made from.
pub async fn register(db_pool: &SqlitePool, new_user: NewUser, password_hash: &str) -> AppResult<PublicProfile> {
    insert_user(db_pool, new_user, Some(password_hash)).await
}

async fn insert_user(db_pool: &SqlitePool, new_user: NewUser, password_hash: Option<&str>) -> AppResult<PublicProfile> {
    let email = new_user.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::invalid("email is required"));
    }

    let profile = PublicProfile {
        id: Uuid::now_v7(),
        name: new_user
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("User".to_owned()),
        role: new_user.role,
        college: new_user.college,
        bio: new_user.bio,
        skills: new_user.skills,
        avatar_gradient: random_gradient(),
    };

    let result = sqlx::query(
        "INSERT INTO users (id,email,password_hash,name,college,role,bio,skills,avatar_gradient,created_at)
         VALUES (?,?,?,?,?,?,?,?,?,?)",
    )
    .bind(profile.id)
    .bind(&email)
    .bind(password_hash)
    .bind(&profile.name)
    .bind(&profile.college)
    .bind(&profile.role)
    .bind(&profile.bio)
    .bind(sqlx::types::Json(&profile.skills))
    .bind(&profile.avatar_gradient)
    .bind(db::now_millis())
    .execute(db_pool)
    .await;

    match result {
        Ok(_) => {
            tracing::info!(user = %profile.id, %email, "user created");
            Ok(profile)
        }
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            Err(AppError::invalid(format!("a user with email {email} already exists")))
        }
        Err(err) => Err(err.into()),
    }
}

/// Id and stored password hash for `email`, if such a user exists.
pub async fn credentials<'e>(db: impl SqliteExecutor<'e>, email: &str) -> AppResult<Option<(Uuid, Option<String>)>> {
    let row = sqlx::query_as("SELECT id, password_hash FROM users WHERE email = ?")
        .bind(email.trim().to_lowercase())
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn profile<'e>(db: impl SqliteExecutor<'e>, id: Uuid) -> AppResult<PublicProfile> {
    sqlx::query_as(&format!("SELECT {PROFILE_COLUMNS} FROM users u WHERE u.id = ?"))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("user"))
}

pub async fn exists<'e>(db: impl SqliteExecutor<'e>, id: Uuid) -> AppResult<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row.is_some())
}

pub async fn swiped_right<'e>(db: impl SqliteExecutor<'e>, id: Uuid) -> AppResult<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT target_id FROM swipes WHERE actor_id = ? ORDER BY created_at, rowid")
        .bind(id)
        .fetch_all(db)
        .await?;
    Ok(rows.into_iter().map(|(target,)| target).collect())
}

/// Matched profiles, most recent match first.
pub async fn matches_of<'e>(db: impl SqliteExecutor<'e>, id: Uuid) -> AppResult<Vec<PublicProfile>> {
    let profiles = sqlx::query_as(&format!(
        "SELECT {PROFILE_COLUMNS} FROM matches m
         JOIN users u ON (m.user_a = ?1 AND u.id = m.user_b) OR (m.user_b = ?1 AND u.id = m.user_a)
         ORDER BY m.created_at DESC, m.rowid DESC"
    ))
    .bind(id)
    .fetch_all(db)
    .await?;
    Ok(profiles)
}

pub async fn is_matched<'e>(db: impl SqliteExecutor<'e>, a: Uuid, b: Uuid) -> AppResult<bool> {
    let (user_a, user_b) = db::pair_key(a, b);
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM matches WHERE user_a = ? AND user_b = ?")
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(db)
        .await?;
    Ok(row.is_some())
}

/// Swipe candidates: everyone except the caller and the users they already
/// swiped right on. Left swipes are not recorded, so those users come back.
pub async fn feed_for<'e>(db: impl SqliteExecutor<'e>, id: Uuid, limit: u32) -> AppResult<Vec<PublicProfile>> {
    let profiles = sqlx::query_as(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users u
         WHERE u.id <> ?1 AND u.id NOT IN (SELECT target_id FROM swipes WHERE actor_id = ?1)
         ORDER BY u.created_at, u.rowid
         LIMIT ?2"
    ))
    .bind(id)
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(profiles)
}
