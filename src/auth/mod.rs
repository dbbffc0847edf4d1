//! Bearer-token identity. Tokens are HS256 JWTs carrying `{id, email, exp}`.

mod extract;
mod login;
pub mod password;

use std::sync::Arc;

use anyhow::Context;
use axum::{routing::post, Router};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppError, AppResult, AppState};

pub use extract::{bearer_token, AuthUser};
pub use login::LoginResponse;

pub const TOKEN_LIFETIME: time::Duration = time::Duration::hours(24);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/signup", post(login::signup))
        .route("/api/login", post(login::login))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    pub email: String,
    pub exp: u64,
}

/// Turns a bearer token into the user id it was issued for.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> AppResult<Uuid>;

    fn issue(&self, id: Uuid, email: &str) -> AppResult<String>;
}

pub type Verifier = Arc<dyn TokenVerifier>;

#[derive(Clone)]
pub struct JwtVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtVerifier {
    pub fn new(secret: &[u8]) -> Self {
        JwtVerifier {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    fn encode_claims(&self, claims: &Claims) -> AppResult<String> {
        Ok(encode(&Header::default(), claims, &self.encoding).context("signing token")?)
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> AppResult<Uuid> {
        match decode::<Claims>(token, &self.decoding, &Validation::default()) {
            Ok(data) => Ok(data.claims.id),
            Err(err) => {
                tracing::warn!(error = %err, "token verification failed");
                Err(AppError::Unauthenticated("invalid token"))
            }
        }
    }

    fn issue(&self, id: Uuid, email: &str) -> AppResult<String> {
        let exp = (time::OffsetDateTime::now_utc() + TOKEN_LIFETIME).unix_timestamp();
        self.encode_claims(&Claims {
            id,
            email: email.to_owned(),
            exp: exp as u64,
        })
    }
}
