//! Shared handler state.
//!
//! Built once at startup from explicitly constructed backends and cloned
//! into every handler; nothing here is a global.

use crate::services::{
    directory::{DirectorySettings, UserDirectory},
    object_store::ObjectStore,
    queue::QueueGateway,
    user_store::UserStore,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub objects: Arc<dyn ObjectStore>,
    pub queue: Arc<QueueGateway>,
    pub users: Arc<dyn UserStore>,
    pub directory: Arc<UserDirectory>,
    /// Bucket used when a listing request names none.
    pub default_bucket: String,
}

impl AppState {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        queue: QueueGateway,
        users: Arc<dyn UserStore>,
        settings: DirectorySettings,
    ) -> Self {
        let default_bucket = settings.bucket.clone();
        let directory = UserDirectory::new(users.clone(), objects.clone(), settings);
        Self {
            objects,
            queue: Arc::new(queue),
            users,
            directory: Arc::new(directory),
            default_bucket,
        }
    }
}
