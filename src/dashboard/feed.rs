//! Activity Feed: newest-first notification entries held by the dashboard.
//!
//! Queue-sourced entries arrive through [`ActivityFeed::merge_poll`];
//! synthetic ones through [`ActivityFeed::push_synthetic`]. Nothing here is
//! persisted and nothing is evicted except by dismissal or `clear_all`.

use crate::models::notification::NotificationEntry;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

/// Entries shown in the summary panel.
pub const SUMMARY_LIMIT: usize = 10;

/// How long a newly arrived unread entry stays highlighted.
pub const HIGHLIGHT_WINDOW: Duration = Duration::from_secs(3);

#[derive(Debug, Default)]
pub struct ActivityFeed {
    entries: Vec<NotificationEntry>,
    highlighted: HashMap<String, Instant>,
}

impl ActivityFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend one drained batch, keeping the backend's order within it.
    ///
    /// Entries whose id is already in the feed are skipped, so a redelivered
    /// message shows up once. Returns how many entries were added.
    pub fn merge_poll(&mut self, batch: Vec<NotificationEntry>, now: Instant) -> usize {
        let mut fresh: Vec<NotificationEntry> = Vec::with_capacity(batch.len());
        for entry in batch {
            let seen = self.entries.iter().any(|e| e.id == entry.id)
                || fresh.iter().any(|e| e.id == entry.id);
            if !seen {
                fresh.push(entry);
            }
        }

        let added = fresh.len();
        for entry in &fresh {
            if !entry.read {
                self.highlighted.insert(entry.id.clone(), now);
            }
        }
        fresh.append(&mut self.entries);
        self.entries = fresh;
        added
    }

    /// Prepend a locally generated entry and return its id.
    pub fn push_synthetic(&mut self, message: impl Into<String>, now: Instant) -> String {
        let entry = NotificationEntry::synthetic(message);
        let id = entry.id.clone();
        self.highlighted.insert(id.clone(), now);
        self.entries.insert(0, entry);
        id
    }

    pub fn mark_read(&mut self, id: &str) -> bool {
        self.highlighted.remove(id);
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        self.highlighted.clear();
        for entry in &mut self.entries {
            entry.read = true;
        }
    }

    /// Entries highlighted for longer than [`HIGHLIGHT_WINDOW`] become read.
    /// Returns how many expired.
    pub fn expire_highlights(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .highlighted
            .iter()
            .filter(|(_, since)| now.saturating_duration_since(**since) >= HIGHLIGHT_WINDOW)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.mark_read(id);
        }
        expired.len()
    }

    pub fn is_highlighted(&self, id: &str) -> bool {
        self.highlighted.contains_key(id)
    }

    /// Remove one entry from the feed.
    pub fn dismiss(&mut self, id: &str) -> Option<NotificationEntry> {
        self.highlighted.remove(id);
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Empty the feed. Drained messages are already gone from the queue.
    pub fn clear_all(&mut self) {
        self.entries.clear();
        self.highlighted.clear();
    }

    pub fn entries(&self) -> &[NotificationEntry] {
        &self.entries
    }

    /// The first [`SUMMARY_LIMIT`] entries.
    pub fn summary(&self) -> &[NotificationEntry] {
        &self.entries[..self.entries.len().min(SUMMARY_LIMIT)]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.read).count()
    }

    /// Badge text for the unread counter, `None` when nothing is unread.
    pub fn badge(&self) -> Option<String> {
        match self.unread_count() {
            0 => None,
            n if n > 9 => Some("9+".to_string()),
            n => Some(n.to_string()),
        }
    }

    /// Pretty-printed payload of a queue-sourced entry for the detail view.
    pub fn detail(&self, id: &str) -> Option<String> {
        let entry = self.entries.iter().find(|e| e.id == id)?;
        let raw = entry.raw_data.as_ref()?;
        serde_json::to_string_pretty(raw).ok()
    }
}
