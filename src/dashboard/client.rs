//! HTTP client for the relay and the dashboard session built on it.
//!
//! [`Dashboard`] mirrors what the browser does: it keeps a [`FileListing`]
//! and an [`ActivityFeed`], re-fetches the listing after every mutating call
//! and adds a synthetic feed entry for each user action.

use crate::{
    config::WatchArgs,
    dashboard::{
        feed::ActivityFeed,
        listing::{DeleteConfirm, DeleteStep, FileListing, format_bytes},
        upload::read_photo,
    },
    models::{
        notification::NotificationEntry,
        object::StorageObject,
        relay::{
            DeleteRequest, ErrorResponse, ListQuery, MessageResponse, ObjectAck, UploadRequest,
            UserResponse, UsersResponse,
        },
        user::User,
    },
    services::{
        directory::PhotoUpload,
        validation::{UploadPolicy, ValidationError, validate_new_user},
    },
};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The relay answered with a non-success status.
    #[error("{message} ({status})")]
    Api { status: u16, message: String },

    /// Rejected before any request was sent.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("no bucket selected")]
    NoBucket,

    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Typed access to every relay endpoint.
#[derive(Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn list_files(&self, bucket: Option<&str>) -> Result<Vec<StorageObject>, ClientError> {
        let query = ListQuery {
            bucket: bucket.map(str::to_string),
        };
        let response = self
            .client
            .get(self.url("/api/list"))
            .query(&query)
            .send()
            .await?;
        handle_response(response).await
    }

    pub async fn upload(&self, request: &UploadRequest) -> Result<ObjectAck, ClientError> {
        let response = self
            .client
            .post(self.url("/api/upload"))
            .json(request)
            .send()
            .await?;
        handle_response(response).await
    }

    pub async fn delete_file(&self, bucket: &str, key: &str) -> Result<ObjectAck, ClientError> {
        let body = DeleteRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
        };
        let response = self
            .client
            .delete(self.url("/api/delete"))
            .json(&body)
            .send()
            .await?;
        handle_response(response).await
    }

    /// One queue drain through the relay.
    pub async fn drain_notifications(&self) -> Result<Vec<NotificationEntry>, ClientError> {
        let response = self.client.get(self.url("/api/notifications")).send().await?;
        handle_response(response).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ClientError> {
        let response = self.client.get(self.url("/api/users")).send().await?;
        let body: UsersResponse = handle_response(response).await?;
        Ok(body.users)
    }

    /// Validates locally first; an invalid submission never reaches the
    /// network.
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        photo: Option<PhotoUpload>,
        policy: &UploadPolicy,
    ) -> Result<User, ClientError> {
        validate_new_user(name, email, photo.as_ref().map(PhotoUpload::meta), policy)?;
        let photo = photo.ok_or(ValidationError::PhotoRequired)?;

        let part = Part::bytes(photo.bytes.to_vec())
            .file_name(photo.file_name)
            .mime_str(&photo.content_type)?;
        let form = Form::new()
            .text("name", name.trim().to_string())
            .text("email", email.trim().to_string())
            .part("photo", part);

        let response = self
            .client
            .post(self.url("/api/users"))
            .multipart(form)
            .send()
            .await?;
        let body: UserResponse = handle_response(response).await?;
        Ok(body.user)
    }

    pub async fn delete_user(&self, id: i32) -> Result<String, ClientError> {
        let response = self
            .client
            .delete(self.url(&format!("/api/users/{id}")))
            .send()
            .await?;
        let body: MessageResponse = handle_response(response).await?;
        Ok(body.message)
    }
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&text)
        .map(|body| body.error)
        .unwrap_or_else(|_| {
            if text.is_empty() {
                status.canonical_reason().unwrap_or("Request failed").to_string()
            } else {
                text
            }
        });
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

/// One dashboard view over a relay.
pub struct Dashboard {
    client: RelayClient,
    bucket: Option<String>,
    listing: FileListing,
    feed: ActivityFeed,
    confirm: DeleteConfirm,
}

impl Dashboard {
    /// `bucket` of `None` lists the relay's configured bucket; deletes then
    /// fail with [`ClientError::NoBucket`].
    pub fn new(client: RelayClient, bucket: Option<String>) -> Self {
        Self {
            client,
            bucket,
            listing: FileListing::new(),
            feed: ActivityFeed::new(),
            confirm: DeleteConfirm::new(),
        }
    }

    pub fn listing(&self) -> &FileListing {
        &self.listing
    }

    pub fn listing_mut(&mut self) -> &mut FileListing {
        &mut self.listing
    }

    pub fn feed(&self) -> &ActivityFeed {
        &self.feed
    }

    pub fn feed_mut(&mut self) -> &mut ActivityFeed {
        &mut self.feed
    }

    /// Re-fetch the listing and record the outcome in the feed.
    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        match self.client.list_files(self.bucket.as_deref()).await {
            Ok(files) => {
                self.listing.replace(files);
                self.feed
                    .push_synthetic("Files refreshed successfully", Instant::now());
                Ok(())
            }
            Err(err) => {
                self.feed
                    .push_synthetic(format!("Error refreshing files: {err}"), Instant::now());
                Err(err)
            }
        }
    }

    /// Drain once and merge the result. Returns how many entries were added.
    pub async fn poll(&mut self) -> Result<usize, ClientError> {
        let now = Instant::now();
        self.feed.expire_highlights(now);
        let batch = self.client.drain_notifications().await?;
        Ok(self.feed.merge_poll(batch, now))
    }

    /// Upload, then re-fetch. A failed re-fetch is recorded in the feed but
    /// does not turn the stored upload into an error.
    pub async fn upload(&mut self, request: &UploadRequest) -> Result<ObjectAck, ClientError> {
        let ack = self.client.upload(request).await?;
        self.feed
            .push_synthetic("File uploaded successfully", Instant::now());
        self.refresh_after_mutation().await;
        Ok(ack)
    }

    /// Delete click. The first click arms, a second one on the same key
    /// within the confirmation window deletes and re-fetches.
    pub async fn click_delete(&mut self, key: &str) -> Result<DeleteStep, ClientError> {
        let bucket = self.bucket.clone().ok_or(ClientError::NoBucket)?;
        let step = self.confirm.click(key, Instant::now());
        if step == DeleteStep::Confirmed {
            self.client.delete_file(&bucket, key).await?;
            self.feed
                .push_synthetic("File deleted successfully", Instant::now());
            self.refresh_after_mutation().await;
        }
        Ok(step)
    }

    async fn refresh_after_mutation(&mut self) {
        if let Err(err) = self.refresh().await {
            warn!("listing is stale after a successful change: {}", err);
        }
    }

    /// Submit a directory entry with the photo read from `photo`.
    ///
    /// Validation runs before any request, so a bad name or email is
    /// reported even when no photo path is given.
    pub async fn register_user(
        &self,
        name: &str,
        email: &str,
        photo: Option<&Path>,
        policy: &UploadPolicy,
    ) -> Result<User, ClientError> {
        let photo = match photo {
            Some(path) => Some(read_photo(path).await.map_err(|source| ClientError::Io {
                path: path.to_path_buf(),
                source,
            })?),
            None => None,
        };
        self.client.create_user(name, email, photo, policy).await
    }
}

/// Poll a relay until interrupted, printing the feed as it grows.
pub async fn watch(args: WatchArgs) -> anyhow::Result<()> {
    let client = RelayClient::new(&args.api_url)?;
    let mut dashboard = Dashboard::new(client, args.bucket.clone());

    if let Err(err) = dashboard.refresh().await {
        warn!("initial listing failed: {}", err);
    }
    let listing = dashboard.listing();
    info!(
        "{} file(s), {} in total",
        listing.file_count(),
        format_bytes(listing.total_size())
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match dashboard.poll().await {
                    Ok(0) => {}
                    Ok(added) => {
                        for entry in dashboard.feed().entries().iter().take(added) {
                            println!(
                                "[{}] {} {}",
                                entry.kind().as_str(),
                                entry.timestamp.to_rfc3339(),
                                entry.message
                            );
                        }
                        if let Some(badge) = dashboard.feed().badge() {
                            info!("{} unread", badge);
                        }
                    }
                    Err(err) => warn!("notification poll failed: {}", err),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("stopping watch");
                break;
            }
        }
    }

    Ok(())
}
