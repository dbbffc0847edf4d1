pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod index;
pub mod notify;
pub mod reconcile;
pub mod res;
pub mod swipes;
pub mod users;

use axum::{
    extract::{rejection::JsonRejection, FromRef, FromRequest},
    routing::get,
    Router,
};
use sqlx::SqlitePool;

pub use error::{AppError, AppResult};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub rooms: notify::Rooms,
    pub verifier: auth::Verifier,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, verifier: auth::Verifier) -> Self {
        AppState {
            db_pool,
            rooms: notify::Rooms::new(),
            verifier,
        }
    }
}

/// Every route of the service, without transport layers (CORS, tracing).
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index::index))
        .merge(auth::router())
        .merge(users::router())
        .merge(swipes::router())
        .merge(chat::router())
        .with_state(state)
}

/// `Json` whose rejections use the service's error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}
