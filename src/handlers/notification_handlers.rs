//! Notification endpoints.
//!
//! - GET  /api/notifications -> drain the queue into feed entries
//! - POST /api/notifications -> log-only acknowledgement (legacy push path)

use crate::{
    errors::AppError,
    models::{notification::NotificationEntry, relay::MessageResponse},
    services::normalizer::normalize,
    state::AppState,
};
use axum::{Json, extract::State};
use serde_json::Value;
use tracing::{error, info};

/// `GET /api/notifications`
///
/// One drain of the queue. Every message is normalized before it is
/// acknowledged; the response carries the entries in backend order.
pub async fn drain_notifications(
    State(state): State<AppState>,
) -> Result<Json<Vec<NotificationEntry>>, AppError> {
    let entries = state
        .queue
        .drain(|message| Some(normalize(message)))
        .await
        .map_err(|err| {
            error!("failed to drain {}: {}", state.queue.queue_name(), err);
            AppError::internal("Failed to fetch notifications")
        })?;

    if !entries.is_empty() {
        info!("delivering {} notification(s)", entries.len());
    }
    Ok(Json(entries))
}

/// `POST /api/notifications`
pub async fn receive_notification(Json(body): Json<Value>) -> Json<MessageResponse> {
    info!("Received notification: {}", body);
    Json(MessageResponse::new("Notification received"))
}
