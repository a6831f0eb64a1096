//! # Run History
//!
//! Tracks the most recent executed requests with their check outcomes for
//! quick inspection and re-use. Capped, most recent first.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::http::method::HttpMethod;

/// Maximum number of history entries to retain.
const MAX_HISTORY_ENTRIES: usize = 100;

/// One past request execution and how its checks fared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: u64,
    pub method: HttpMethod,
    pub url: String,
    /// None when the request never produced a response (transport error).
    pub status: Option<u16>,
    pub duration_ms: Option<u64>,
    /// Validation results plus named script assertions, combined.
    pub checks_passed: usize,
    pub checks_failed: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry to the front, evicting the oldest entry once full.
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() >= MAX_HISTORY_ENTRIES {
            self.entries.pop_back();
        }
        self.entries.push_front(entry);
    }

    /// All entries, most recent first.
    pub fn entries(&self) -> &VecDeque<HistoryEntry> {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
