//! Request and response bodies of the relay endpoints.
//!
//! Shared by the axum handlers and the dashboard's `RelayClient` so both
//! sides agree on the wire shape.

use serde::{Deserialize, Serialize};

use super::user::User;

/// `GET /api/list` query string.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ListQuery {
    pub bucket: Option<String>,
}

/// `POST /api/upload` body. `file` is the base64-encoded object payload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadRequest {
    pub bucket: String,
    pub key: String,
    pub file: String,
}

/// `DELETE /api/delete` body.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeleteRequest {
    pub bucket: String,
    pub key: String,
}

/// Acknowledgement returned by the upload and delete relays.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ObjectAck {
    pub message: String,
    pub key: String,
}

/// Plain `{message}` acknowledgement.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `GET /api/users` body.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

/// `POST /api/users` success body.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserResponse {
    pub user: User,
}

/// `{error}` body produced by `AppError`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
