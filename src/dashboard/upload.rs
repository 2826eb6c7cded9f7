//! Turning local files into relay payloads.

use crate::{models::relay::UploadRequest, services::directory::PhotoUpload};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use std::path::Path;

/// Body for `POST /api/upload`: the whole file, base64-encoded, stored under
/// `key`.
pub fn upload_request(bucket: &str, key: &str, contents: &[u8]) -> UploadRequest {
    UploadRequest {
        bucket: bucket.to_string(),
        key: key.to_string(),
        file: general_purpose::STANDARD.encode(contents),
    }
}

/// Read `path` fully and key it by its file name.
pub async fn read_upload(bucket: &str, path: &Path) -> std::io::Result<UploadRequest> {
    let contents = tokio::fs::read(path).await?;
    Ok(upload_request(bucket, &file_name(path), &contents))
}

/// Read a profile photo from disk for a directory submission.
pub async fn read_photo(path: &Path) -> std::io::Result<PhotoUpload> {
    let contents = tokio::fs::read(path).await?;
    let file_name = file_name(path);
    Ok(PhotoUpload {
        content_type: content_type_for(&file_name).to_string(),
        file_name,
        bytes: Bytes::from(contents),
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// MIME type by extension, `application/octet-stream` when unknown.
pub fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn upload_request__should_base64_encode_contents() {
        let request = upload_request("B", "a.txt", b"0123456789");

        assert_eq!(request.bucket, "B");
        assert_eq!(request.key, "a.txt");
        assert_eq!(request.file, "MDEyMzQ1Njc4OQ==");
    }

    #[test]
    fn content_type_for__should_map_common_extensions() {
        assert_eq!(content_type_for("Me.PNG"), "image/png");
        assert_eq!(content_type_for("photo.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("README"), "application/octet-stream");
    }

    #[tokio::test]
    async fn read_upload__should_key_by_file_name() {
        let dir = std::env::temp_dir().join(format!("upload-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.expect("mkdir");
        let path = dir.join("a.txt");
        tokio::fs::write(&path, b"0123456789").await.expect("write");

        let request = read_upload("B", &path).await.expect("read");

        assert_eq!(request.key, "a.txt");
        assert_eq!(request.file, "MDEyMzQ1Njc4OQ==");
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
