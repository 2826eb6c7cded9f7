//! Directory users and the photo each one owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A directory record.
///
/// Every user owns exactly one stored photo; its object key is recoverable
/// from `photo_url` (see `services::object_store::object_key_from_url`).
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Server-generated id (`SERIAL`).
    pub id: i32,

    pub name: String,

    /// Unique across the directory, enforced by the database.
    pub email: String,

    /// Fully-qualified URL of the stored photo.
    pub photo_url: String,

    /// `None` only for rows whose creation time was never recorded.
    pub created_at: Option<DateTime<Utc>>,
}

/// Values needed to insert a new row; id and timestamp come from the store.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub photo_url: String,
}
