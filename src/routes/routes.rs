//! Defines the relay routes consumed by the dashboard.
//!
//! ## Structure
//! - **Object relays**
//!   - `GET    /api/list?bucket=`: list objects
//!   - `POST   /api/upload`: upload a base64 payload
//!   - `DELETE /api/delete`: delete one key
//!
//! - **Notifications**
//!   - `GET    /api/notifications`: drain the queue
//!   - `POST   /api/notifications`: log-only acknowledgement
//!
//! - **User Directory**
//!   - `GET    /api/users`
//!   - `POST   /api/users` (multipart)
//!   - `DELETE /api/users/{id}`

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        notification_handlers::{drain_notifications, receive_notification},
        object_handlers::{delete_object, list_objects, upload_object},
        user_handlers::{create_user, delete_user, list_users},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};

/// Request body cap. Uploads arrive base64-encoded in a single JSON body, so
/// this sits well above the photo size limit.
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Build the router for every relay endpoint.
///
/// The router carries `AppState` to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // object relays
        .route("/api/list", get(list_objects))
        .route("/api/upload", post(upload_object))
        .route("/api/delete", delete(delete_object))
        // notifications
        .route(
            "/api/notifications",
            get(drain_notifications).post(receive_notification),
        )
        // user directory
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/{id}", delete(delete_user))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
