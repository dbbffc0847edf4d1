use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use uuid::Uuid;

use crate::{AppError, AppResult};

use super::Verifier;

/// The authenticated caller, taken from `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

/// Pulls the token out of an `Authorization` header value. Clients that lost
/// their token tend to send the literal strings `undefined` or `null`.
pub fn bearer_token(headers: &HeaderMap) -> AppResult<&str> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Err(AppError::Unauthenticated("no token provided"));
    };
    let header = header
        .to_str()
        .map_err(|_| AppError::Unauthenticated("malformed authorization header"))?;

    match header.split_once(' ') {
        Some((scheme, token))
            if scheme.eq_ignore_ascii_case("bearer")
                && !token.is_empty()
                && token != "undefined"
                && token != "null" =>
        {
            Ok(token.trim())
        }
        _ => Err(AppError::Unauthenticated("auth failed")),
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    Verifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).inspect_err(|err| {
            tracing::warn!(method = %parts.method, uri = %parts.uri, error = %err, "request blocked");
        })?;
        let verifier = Verifier::from_ref(state);
        verifier.verify(token).map(AuthUser)
    }
}
