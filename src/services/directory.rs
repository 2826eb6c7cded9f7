//! User Directory: ties directory rows to their stored photos.
//!
//! Neither create nor delete is transactional across the database and the
//! object store. Create uploads the photo first and removes it again if the
//! row insert fails. Delete removes the photo first and only then the row,
//! so a photo that cannot be removed keeps the row in place.

use crate::{
    models::user::{NewUser, User},
    services::{
        object_store::{ObjectStore, ObjectStoreError, object_key_from_url, public_object_url},
        user_store::{UserStore, UserStoreError},
        validation::{FileMeta, UploadPolicy, ValidationError, validate_new_user},
    },
};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Key prefix for profile photos.
pub const PHOTO_PREFIX: &str = "profile-photos";

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("user {0} not found")]
    NotFound(i32),
    #[error("a user with email `{0}` already exists")]
    DuplicateEmail(String),
    #[error("photo key cannot be derived from `{0}`")]
    UnresolvablePhoto(String),
    #[error(transparent)]
    Objects(#[from] ObjectStoreError),
    #[error(transparent)]
    Users(UserStoreError),
}

impl From<UserStoreError> for DirectoryError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::DuplicateEmail(email) => Self::DuplicateEmail(email),
            other => Self::Users(other),
        }
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// An uploaded profile photo.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl PhotoUpload {
    pub fn meta(&self) -> FileMeta<'_> {
        FileMeta {
            file_name: &self.file_name,
            content_type: &self.content_type,
            size: self.bytes.len() as u64,
        }
    }
}

/// A directory creation request as submitted by the form.
#[derive(Debug, Clone, Default)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub photo: Option<PhotoUpload>,
}

/// Where photos go and what they may look like.
#[derive(Debug, Clone)]
pub struct DirectorySettings {
    pub bucket: String,
    pub region: String,
    pub policy: UploadPolicy,
}

pub struct UserDirectory {
    users: Arc<dyn UserStore>,
    objects: Arc<dyn ObjectStore>,
    settings: DirectorySettings,
}

impl UserDirectory {
    pub fn new(
        users: Arc<dyn UserStore>,
        objects: Arc<dyn ObjectStore>,
        settings: DirectorySettings,
    ) -> Self {
        Self {
            users,
            objects,
            settings,
        }
    }

    pub async fn list(&self) -> DirectoryResult<Vec<User>> {
        Ok(self.users.list().await?)
    }

    /// Validate, store the photo, then insert the row.
    pub async fn create(&self, request: CreateUser) -> DirectoryResult<User> {
        validate_new_user(
            &request.name,
            &request.email,
            request.photo.as_ref().map(PhotoUpload::meta),
            &self.settings.policy,
        )?;
        let photo = request.photo.ok_or(ValidationError::PhotoRequired)?;

        let key = format!(
            "{PHOTO_PREFIX}/{}-{}",
            Utc::now().timestamp_millis(),
            photo.file_name
        );
        let bucket = &self.settings.bucket;
        self.objects.put_object(bucket, &key, photo.bytes).await?;
        let photo_url = public_object_url(bucket, &self.settings.region, &key);

        let new_user = NewUser {
            name: request.name.trim().to_string(),
            email: request.email.trim().to_string(),
            photo_url,
        };
        match self.users.insert(new_user).await {
            Ok(user) => {
                info!("created user {} with photo {}", user.id, key);
                Ok(user)
            }
            Err(err) => {
                if let Err(cleanup) = self.objects.delete_object(bucket, &key).await {
                    warn!("orphaned photo {} after failed insert: {}", key, cleanup);
                }
                Err(err.into())
            }
        }
    }

    /// Remove the photo, then the row. Returns the removed user.
    pub async fn delete(&self, id: i32) -> DirectoryResult<User> {
        let user = self
            .users
            .find(id)
            .await?
            .ok_or(DirectoryError::NotFound(id))?;

        let key = object_key_from_url(&user.photo_url)
            .ok_or_else(|| DirectoryError::UnresolvablePhoto(user.photo_url.clone()))?;
        self.objects
            .delete_object(&self.settings.bucket, key)
            .await?;

        match self.users.delete(id).await {
            Ok(true) => Ok(user),
            Ok(false) => Err(DirectoryError::NotFound(id)),
            Err(err) => {
                error!(
                    "photo {} removed but user {} row remains: {}",
                    key, id, err
                );
                Err(err.into())
            }
        }
    }
}
