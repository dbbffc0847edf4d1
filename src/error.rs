use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("{0}")]
    InvalidInput(String),

    #[error("chat is only available between matched users")]
    NotMatched,

    /// Transient; callers may retry.
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// Stable machine-readable name, shared by the HTTP and socket surfaces.
    pub fn kind(&self) -> &'static str {
        use AppError::*;
        match self {
            NotFound(_) => "not_found",
            Unauthenticated(_) => "unauthenticated",
            InvalidInput(_) => "invalid_input",
            NotMatched => "not_matched",
            Storage(_) => "storage_failure",
            Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        use AppError::*;
        match self {
            NotFound(_) => StatusCode::NOT_FOUND,
            Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            InvalidInput(_) => StatusCode::BAD_REQUEST,
            NotMatched => StatusCode::FORBIDDEN,
            Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text safe to show a client. Storage and internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Storage(_) => "storage is temporarily unavailable, try again".to_owned(),
            AppError::Internal(_) => "internal server error".to_owned(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Storage(err) => tracing::error!(error = %err, "storage failure"),
            AppError::Internal(err) => tracing::error!(error = ?err, "internal error"),
            other => tracing::debug!(kind = other.kind(), error = %other, "request rejected"),
        }

        let body = json!({
            "error": self.kind(),
            "message": self.public_message(),
        });

        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_distinct_statuses() {
        assert_eq!(AppError::NotFound("user").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Unauthenticated("no token").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::invalid("empty").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotMatched.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::Storage(sqlx::Error::PoolTimedOut).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn storage_details_are_not_exposed() {
        let err = AppError::Storage(sqlx::Error::Protocol("disk I/O on /var/db".into()));
        assert_eq!(err.kind(), "storage_failure");
        assert!(!err.public_message().contains("/var/db"));
    }
}
