use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{users::{self, NewUser, PublicProfile}, AppError, AppJson, AppResult, AppState};

use super::{password, Verifier};

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicProfile,
}

#[derive(Deserialize)]
pub(crate) struct SignupRequest {
    password: String,
    #[serde(flatten)]
    user: NewUser,
}

#[derive(Deserialize)]
pub(crate) struct LoginRequest {
    email: String,
    password: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn signup(
    State(db_pool): State<SqlitePool>,
    State(verifier): State<Verifier>,
    AppJson(SignupRequest { password, user }): AppJson<SignupRequest>,
) -> AppResult<(StatusCode, Json<LoginResponse>)> {
    password::validate(&password)?;
    let email = user.email.trim().to_lowercase();
    let password_hash = password::hash_blocking(password).await?;
    let profile = users::register(&db_pool, user, &password_hash).await?;

    let token = verifier.issue(profile.id, &email)?;
    Ok((StatusCode::CREATED, Json(LoginResponse { token, user: profile })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(db_pool): State<SqlitePool>,
    State(verifier): State<Verifier>,
    AppJson(LoginRequest { email, password }): AppJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let email = email.trim().to_lowercase();

    // unknown email and wrong password look the same to the caller
    let Some((user_id, Some(stored))) = users::credentials(&db_pool, &email).await? else {
        tracing::warn!(%email, "login for unknown or passwordless account");
        return Err(AppError::Unauthenticated("invalid email or password"));
    };
    if !password::verify_blocking(password, stored).await? {
        tracing::warn!(user = %user_id, "wrong password");
        return Err(AppError::Unauthenticated("invalid email or password"));
    }

    let profile = users::profile(&db_pool, user_id).await?;
    tracing::info!(user = %user_id, "welcome back");
    let token = verifier.issue(profile.id, &email)?;
    Ok(Json(LoginResponse { token, user: profile }))
}
