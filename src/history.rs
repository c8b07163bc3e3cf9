//! Append-only record of searches, page visits and bookmarks.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::MAX_TITLE_CHARS;
use crate::text::truncate_chars;

/// Search and visit records kept by [`MemoryHistory`].
pub const HISTORY_LIMIT: usize = 100;

/// One history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    /// A search that produced results.
    Search {
        query: String,
        /// Id of the provider that served the results.
        provider: String,
        result_count: usize,
        timestamp: DateTime<Utc>,
    },
    /// A page loaded for display.
    Visit {
        url: String,
        title: String,
        anonymized: bool,
        timestamp: DateTime<Utc>,
    },
    /// A page saved by the user.
    Bookmark {
        title: String,
        url: String,
        timestamp: DateTime<Utc>,
    },
}

impl HistoryEntry {
    pub fn search(
        query: impl Into<String>,
        provider: impl Into<String>,
        result_count: usize,
    ) -> Self {
        HistoryEntry::Search {
            query: query.into(),
            provider: provider.into(),
            result_count,
            timestamp: Utc::now(),
        }
    }

    pub fn visit(url: impl Into<String>, title: impl Into<String>, anonymized: bool) -> Self {
        HistoryEntry::Visit {
            url: url.into(),
            title: title.into(),
            anonymized,
            timestamp: Utc::now(),
        }
    }

    /// Bookmark with the title cut to [`MAX_TITLE_CHARS`].
    pub fn bookmark(title: impl AsRef<str>, url: impl Into<String>) -> Self {
        HistoryEntry::Bookmark {
            title: truncate_chars(title.as_ref().trim(), MAX_TITLE_CHARS),
            url: url.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            HistoryEntry::Search { timestamp, .. }
            | HistoryEntry::Visit { timestamp, .. }
            | HistoryEntry::Bookmark { timestamp, .. } => *timestamp,
        }
    }

    pub fn is_bookmark(&self) -> bool {
        matches!(self, HistoryEntry::Bookmark { .. })
    }
}

/// Destination for history records. Persisting them is up to the implementor.
pub trait HistorySink: Send + Sync {
    fn record(&self, entry: HistoryEntry);
}

/// Keeps the most recent [`HISTORY_LIMIT`] search and visit records in
/// memory. Bookmarks do not count toward the limit and stay until removed.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records in insertion order, oldest first.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Bookmark records, oldest first.
    pub fn bookmarks(&self) -> Vec<HistoryEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().filter(|e| e.is_bookmark()).cloned().collect()
    }

    /// Removes the bookmark at `index` in [`bookmarks`](Self::bookmarks)
    /// order, returning it.
    pub fn remove_bookmark(&self, index: usize) -> Option<HistoryEntry> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let position = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_bookmark())
            .nth(index)
            .map(|(i, _)| i)?;
        entries.remove(position)
    }
}

impl HistorySink for MemoryHistory {
    fn record(&self, entry: HistoryEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if !entry.is_bookmark() {
            let activity = entries.iter().filter(|e| !e.is_bookmark()).count();
            if activity >= HISTORY_LIMIT {
                if let Some(oldest) = entries.iter().position(|e| !e.is_bookmark()) {
                    entries.remove(oldest);
                }
            }
        }
        entries.push_back(entry);
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

impl HistorySink for NoHistory {
    fn record(&self, _entry: HistoryEntry) {}
}
