//! Notification dispatch handlers.
//!
//! ERROR HANDLING
//! ==============
//! Malformed input maps to 400, a missing subscription target to 404, and
//! downstream provider failures to 500, always with a plain-text body.
//! Success responses are always `{"success": true}`. Absent fields and
//! empty strings are both treated as missing.

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::state::AppState;

/// Treat absent and empty-string fields alike.
fn required(field: Option<&String>) -> Option<&str> {
    field.map(String::as_str).filter(|v| !v.is_empty())
}

fn success() -> Response {
    Json(json!({ "success": true })).into_response()
}

// =============================================================================
// POST /subscribeToTopic
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    topic: Option<String>,
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// Subscribe every token registered for a user to a topic.
pub async fn subscribe_to_topic(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> Response {
    let (Some(topic), Some(user_id)) =
        (required(request.topic.as_ref()), required(request.user_id.as_ref()))
    else {
        return (StatusCode::BAD_REQUEST, "Bad Request: Missing topic or userId").into_response();
    };

    let profile = match state.profiles.get(user_id).await {
        Ok(profile) => profile,
        Err(e) => {
            error!(error = %e, user_id, "profile lookup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error: Failed to load user profile")
                .into_response();
        }
    };
    let Some(profile) = profile else {
        return (StatusCode::NOT_FOUND, "Not Found: User profile not found").into_response();
    };
    if profile.notification_tokens.is_empty() {
        return (StatusCode::BAD_REQUEST, "Bad Request: No notification tokens found for user")
            .into_response();
    }

    let tokens: Vec<String> = profile.notification_tokens.iter().cloned().collect();
    match state.messaging.subscribe_to_topic(&tokens, topic).await {
        Ok(()) => {
            info!(user_id, topic, "user subscribed to topic");
            success()
        }
        Err(e) => {
            error!(error = %e, user_id, topic, "topic subscription failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error: Failed to subscribe to topic")
                .into_response()
        }
    }
}

// =============================================================================
// POST /sendMessageToTopic
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct TopicMessageRequest {
    topic: Option<String>,
    title: Option<String>,
    body: Option<String>,
}

/// Send a notification to every subscriber of a topic.
pub async fn send_message_to_topic(
    State(state): State<AppState>,
    Json(request): Json<TopicMessageRequest>,
) -> Response {
    let (Some(topic), Some(title), Some(body)) = (
        required(request.topic.as_ref()),
        required(request.title.as_ref()),
        required(request.body.as_ref()),
    ) else {
        return (StatusCode::BAD_REQUEST, "Bad Request: Missing topic, title, or body").into_response();
    };

    match state.messaging.send_to_topic(topic, title, body).await {
        Ok(()) => {
            info!(topic, "message sent to topic");
            success()
        }
        Err(e) => {
            error!(error = %e, topic, "topic send failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error: Failed to send message")
                .into_response()
        }
    }
}

// =============================================================================
// POST /sendNewMessageNotification
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct UserMessageRequest {
    title: Option<String>,
    body: Option<String>,
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// Send a notification to every device registered for one user.
pub async fn send_new_message_notification(
    State(state): State<AppState>,
    Json(request): Json<UserMessageRequest>,
) -> Response {
    let (Some(title), Some(body), Some(user_id)) = (
        required(request.title.as_ref()),
        required(request.body.as_ref()),
        required(request.user_id.as_ref()),
    ) else {
        return (StatusCode::BAD_REQUEST, "Bad Request: Missing title, body, or userId").into_response();
    };

    let profile = match state.profiles.get(user_id).await {
        Ok(profile) => profile,
        Err(e) => {
            error!(error = %e, user_id, "profile lookup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error: Failed to load user profile")
                .into_response();
        }
    };
    // A user with no profile has no devices to notify; that is a success
    // from the caller's point of view, not an error.
    let Some(profile) = profile else {
        return success();
    };

    let tokens: Vec<String> = profile.notification_tokens.iter().cloned().collect();
    match state.messaging.send_multicast(&tokens, title, body).await {
        Ok(outcome) => {
            info!(
                user_id,
                delivered = outcome.success_count,
                failed = outcome.failure_count,
                "user notification sent"
            );
            success()
        }
        Err(e) => {
            error!(error = %e, user_id, "user notification failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error: Failed to send message")
                .into_response()
        }
    }
}

#[cfg(test)]
#[path = "notify_test.rs"]
mod tests;
