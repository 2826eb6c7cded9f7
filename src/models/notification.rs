//! Activity feed entries shown by the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A client-visible activity item.
///
/// Entries come either from a queue drain (and then carry the deep-parsed
/// payload in `raw_data`) or are synthesized locally by the dashboard after
/// an upload, delete or refresh. Only `read` ever changes after creation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEntry {
    /// Source message id, or a random id for synthetic entries.
    pub id: String,

    /// Human-readable summary line.
    pub message: String,

    /// When the entry was created.
    pub timestamp: DateTime<Utc>,

    /// UI-only read flag.
    #[serde(default)]
    pub read: bool,

    /// Fully parsed source payload, only for queue-sourced entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<Value>,
}

impl NotificationEntry {
    /// Entry built from a drained queue message.
    pub fn from_queue(
        id: impl Into<String>,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
        raw_data: Value,
    ) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            timestamp,
            read: false,
            raw_data: Some(raw_data),
        }
    }

    /// Entry generated locally by the dashboard.
    pub fn synthetic(message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message: message.into(),
            timestamp: Utc::now(),
            read: false,
            raw_data: None,
        }
    }

    pub fn kind(&self) -> NotificationKind {
        NotificationKind::classify(&self.message)
    }
}

/// Display category derived from the summary text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    Upload,
    Delete,
    Download,
    Error,
    Info,
}

impl NotificationKind {
    /// Keyword match against the lowercased message, first hit wins.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("upload") || lower.contains("added") {
            Self::Upload
        } else if lower.contains("delete") || lower.contains("removed") {
            Self::Delete
        } else if lower.contains("download") {
            Self::Download
        } else if lower.contains("error") || lower.contains("failed") {
            Self::Error
        } else {
            Self::Info
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Delete => "delete",
            Self::Download => "download",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn classify__should_match_keywords_in_priority_order() {
        assert_eq!(
            NotificationKind::classify("File uploaded successfully"),
            NotificationKind::Upload
        );
        assert_eq!(
            NotificationKind::classify("File deleted successfully"),
            NotificationKind::Delete
        );
        assert_eq!(
            NotificationKind::classify("Error refreshing files: timeout"),
            NotificationKind::Error
        );
        // "upload" wins over "failed"
        assert_eq!(
            NotificationKind::classify("Upload failed"),
            NotificationKind::Upload
        );
        assert_eq!(
            NotificationKind::classify("Event: s3:TestEvent | Bucket: b | Object: k"),
            NotificationKind::Info
        );
    }

    #[test]
    fn synthetic__should_have_unique_ids_and_no_raw_data() {
        let first = NotificationEntry::synthetic("Files refreshed successfully");
        let second = NotificationEntry::synthetic("Files refreshed successfully");

        assert_ne!(first.id, second.id);
        assert!(first.raw_data.is_none());
        assert!(!first.read);
    }

    #[test]
    fn serialize__should_use_camel_case_and_skip_missing_raw_data() {
        let entry = NotificationEntry::synthetic("hello");

        let json = serde_json::to_value(&entry).expect("serialize");

        assert!(json.get("rawData").is_none());
        assert_eq!(json["read"], false);
        assert_eq!(json["message"], "hello");
    }
}
