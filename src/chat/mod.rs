mod history;
mod msg;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub use msg::{history, send_message, Message, MAX_CONTENT_CHARS};
pub use ws::{ClientEvent, SendMessageFrame};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/messages/{partner_id}",
            get(history::chat_history).post(history::post_message),
        )
        .route("/ws", get(ws::chat_ws))
}
