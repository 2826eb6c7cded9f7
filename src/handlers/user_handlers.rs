//! User Directory endpoints.
//!
//! - GET    /api/users        -> `{users}` newest first
//! - POST   /api/users        -> multipart `name`, `email`, `photo`
//! - DELETE /api/users/{id}   -> photo first, then the row

use crate::{
    errors::AppError,
    models::relay::{MessageResponse, UserResponse, UsersResponse},
    services::directory::{CreateUser, DirectoryError, PhotoUpload},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use tracing::{error, warn};

const DUPLICATE_EMAIL: &str = "A user with this email already exists";

/// `GET /api/users`
pub async fn list_users(State(state): State<AppState>) -> Result<Json<UsersResponse>, AppError> {
    let users = state.directory.list().await.map_err(|err| {
        error!("failed to list users: {}", err);
        AppError::internal("Failed to fetch users")
    })?;
    Ok(Json(UsersResponse { users }))
}

/// `POST /api/users`
///
/// Unknown form fields are ignored. A `photo` part without a file name is
/// treated as absent.
pub async fn create_user(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let request = read_form(&mut multipart).await?;

    match state.directory.create(request).await {
        Ok(user) => Ok((StatusCode::CREATED, Json(UserResponse { user }))),
        Err(DirectoryError::Invalid(err)) => Err(AppError::bad_request(err.to_string())),
        Err(DirectoryError::DuplicateEmail(email)) => {
            warn!("rejected duplicate email {}", email);
            Err(AppError::conflict(DUPLICATE_EMAIL))
        }
        Err(err) => {
            error!("failed to create user: {}", err);
            Err(AppError::internal("Failed to create user"))
        }
    }
}

async fn read_form(multipart: &mut Multipart) -> Result<CreateUser, AppError> {
    let mut request = CreateUser::default();

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        warn!("malformed user form: {}", err);
        AppError::bad_request("Invalid form data")
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "name" | "email" => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Invalid form data"))?;
                if name == "name" {
                    request.name = text;
                } else {
                    request.email = text;
                }
            }
            "photo" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::bad_request("Invalid form data"))?;
                if !file_name.is_empty() {
                    request.photo = Some(PhotoUpload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            _ => {}
        }
    }

    Ok(request)
}

/// `DELETE /api/users/{id}`
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id: i32 = id
        .parse()
        .map_err(|_| AppError::not_found("User not found"))?;

    match state.directory.delete(id).await {
        Ok(_) => Ok(Json(MessageResponse::new("User deleted successfully"))),
        Err(DirectoryError::NotFound(_)) => Err(AppError::not_found("User not found")),
        Err(err) => {
            error!("failed to delete user {}: {}", id, err);
            Err(AppError::internal("Failed to delete user"))
        }
    }
}
