//! Relay handlers for bucket listing, upload and delete.
//! Each forwards one browser request to the Object Store Gateway.

use crate::{
    errors::AppError,
    models::{
        object::StorageObject,
        relay::{DeleteRequest, ListQuery, ObjectAck, UploadRequest},
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Query, State},
};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use tracing::{error, info};

/// GET `/api/list?bucket=`: every object in the bucket as `[{Key, Size}]`.
pub async fn list_objects(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<StorageObject>>, AppError> {
    let bucket = q
        .bucket
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| state.default_bucket.clone());

    let objects = state.objects.list_objects(&bucket).await.map_err(|err| {
        error!("failed to list `{}`: {}", bucket, err);
        AppError::internal("Failed to list files")
    })?;

    Ok(Json(objects))
}

/// POST `/api/upload`: decode the base64 payload and store it at `key`.
pub async fn upload_object(
    State(state): State<AppState>,
    Json(payload): Json<UploadRequest>,
) -> Result<Json<ObjectAck>, AppError> {
    ensure_target(&payload.bucket, &payload.key)?;
    let bytes = general_purpose::STANDARD
        .decode(payload.file.as_bytes())
        .map_err(|_| AppError::bad_request("File payload is not valid base64"))?;
    let size = bytes.len();

    let key = state
        .objects
        .put_object(&payload.bucket, &payload.key, Bytes::from(bytes))
        .await
        .map_err(|err| {
            error!("failed to upload `{}`: {}", payload.key, err);
            AppError::internal("Failed to upload file")
        })?;

    info!("uploaded {} ({} bytes) to {}", key, size, payload.bucket);
    Ok(Json(ObjectAck {
        message: "File uploaded successfully".into(),
        key,
    }))
}

/// DELETE `/api/delete`: remove `key` from the bucket.
pub async fn delete_object(
    State(state): State<AppState>,
    Json(payload): Json<DeleteRequest>,
) -> Result<Json<ObjectAck>, AppError> {
    ensure_target(&payload.bucket, &payload.key)?;

    let key = state
        .objects
        .delete_object(&payload.bucket, &payload.key)
        .await
        .map_err(|err| {
            error!("failed to delete `{}`: {}", payload.key, err);
            AppError::internal("Failed to delete file")
        })?;

    info!("deleted {} from {}", key, payload.bucket);
    Ok(Json(ObjectAck {
        message: "File deleted successfully".into(),
        key,
    }))
}

fn ensure_target(bucket: &str, key: &str) -> Result<(), AppError> {
    if bucket.trim().is_empty() {
        return Err(AppError::bad_request("Bucket is required"));
    }
    if key.trim().is_empty() {
        return Err(AppError::bad_request("Key is required"));
    }
    Ok(())
}
