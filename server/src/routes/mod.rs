//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The dispatch service exposes three POST endpoints consumed by the apps
//! and by operator tooling. Each endpoint accepts only POST — other methods
//! get 405 from the router — and answers `{"success": true}` on success or
//! a plain-text error body otherwise.

pub mod notify;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/subscribeToTopic", post(notify::subscribe_to_topic))
        .route("/sendMessageToTopic", post(notify::send_message_to_topic))
        .route("/sendNewMessageNotification", post(notify::send_new_message_notification))
        .route("/healthz", get(healthz))
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
