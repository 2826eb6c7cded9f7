//! File listing state: the last fetched objects plus a search/sort view.

use crate::models::object::StorageObject;
use std::{
    cmp::Ordering,
    time::{Duration, Instant},
};

/// How long a first delete click stays armed.
pub const DELETE_CONFIRM_WINDOW: Duration = Duration::from_secs(3);

const BYTE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Name,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Default)]
pub struct FileListing {
    files: Vec<StorageObject>,
    search: String,
    sort_field: SortField,
    sort_order: SortOrder,
}

impl FileListing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held objects with a fresh listing.
    pub fn replace(&mut self, files: Vec<StorageObject>) {
        self.files = files;
    }

    pub fn files(&self) -> &[StorageObject] {
        &self.files
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    /// Choosing the active field again flips the order; a new field starts
    /// ascending.
    pub fn sort_by(&mut self, field: SortField) {
        if self.sort_field == field {
            self.sort_order = self.sort_order.flipped();
        } else {
            self.sort_field = field;
            self.sort_order = SortOrder::Asc;
        }
    }

    pub fn sort(&self) -> (SortField, SortOrder) {
        (self.sort_field, self.sort_order)
    }

    /// Objects matching the search term, in the current sort order.
    pub fn view(&self) -> Vec<&StorageObject> {
        let needle = self.search.to_lowercase();
        let mut view: Vec<&StorageObject> = self
            .files
            .iter()
            .filter(|file| file.key.to_lowercase().contains(&needle))
            .collect();

        view.sort_by(|a, b| {
            let ordering = match self.sort_field {
                SortField::Name => compare_names(&a.key, &b.key),
                SortField::Size => a.size.cmp(&b.size),
            };
            match self.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        view
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|file| file.size).sum()
    }
}

/// Case-insensitive comparison with the raw key as tie-breaker.
fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Human-readable size in base 1024 with at most two decimals.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rendered = format!("{value:.2}");
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{rendered} {}", BYTE_UNITS[unit])
}

/// Outcome of a delete click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStep {
    /// First click; another click within the window confirms.
    Armed,
    /// Second click on the same key within the window.
    Confirmed,
}

/// Two-click delete gate. Arming a different key replaces the previous one.
#[derive(Debug, Default)]
pub struct DeleteConfirm {
    armed: Option<(String, Instant)>,
}

impl DeleteConfirm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn click(&mut self, key: &str, now: Instant) -> DeleteStep {
        match self.armed.take() {
            Some((armed_key, since))
                if armed_key == key
                    && now.saturating_duration_since(since) < DELETE_CONFIRM_WINDOW =>
            {
                DeleteStep::Confirmed
            }
            _ => {
                self.armed = Some((key.to_string(), now));
                DeleteStep::Armed
            }
        }
    }

    pub fn is_armed(&self, key: &str, now: Instant) -> bool {
        self.armed.as_ref().is_some_and(|(armed_key, since)| {
            armed_key == key && now.saturating_duration_since(*since) < DELETE_CONFIRM_WINDOW
        })
    }
}
