//! Represents an object (file) stored in a bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single object as reported by a bucket listing.
///
/// Rebuilt from the backend on every list call; nothing about it is cached.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StorageObject {
    /// Full object key, unique within its bucket.
    #[serde(rename = "Key")]
    pub key: String,

    /// Size in bytes.
    #[serde(rename = "Size")]
    pub size: u64,

    /// Last modification time, when the backend reports one.
    #[serde(
        rename = "LastModified",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_modified: Option<DateTime<Utc>>,
}

impl StorageObject {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
        }
    }
}
