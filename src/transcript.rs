//! Transcript history
//!
//! Append-only record of recognition results, capped at a configured
//! retention window with oldest-first eviction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// One recognized utterance, never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry {
    pub text: String,
    pub is_partial: bool,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn new(text: impl Into<String>, is_partial: bool) -> Self {
        Self {
            text: text.into(),
            is_partial,
            timestamp: Utc::now(),
        }
    }
}

/// Capped append-only history of transcript entries.
#[derive(Debug)]
pub struct TranscriptHistory {
    entries: VecDeque<TranscriptEntry>,
    retention: usize,
}

impl TranscriptHistory {
    pub fn new(retention: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(retention.min(128)),
            retention: retention.max(1),
        }
    }

    /// Append an entry, evicting the oldest when the window is full.
    pub fn push(&mut self, entry: TranscriptEntry) {
        if self.entries.len() == self.retention {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.back()
    }

    /// Clone of the current window, oldest first.
    pub fn snapshot(&self) -> Vec<TranscriptEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_appends_in_order() {
        let mut history = TranscriptHistory::new(10);
        history.push(TranscriptEntry::new("one", false));
        history.push(TranscriptEntry::new("two", false));

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].text, "one");
        assert_eq!(snapshot[1].text, "two");
        assert_eq!(history.last().unwrap().text, "two");
    }

    #[test]
    fn retention_evicts_oldest_first() {
        let mut history = TranscriptHistory::new(3);
        for i in 0..5 {
            history.push(TranscriptEntry::new(format!("entry {}", i), false));
        }

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].text, "entry 2");
        assert_eq!(snapshot[2].text, "entry 4");
    }

    #[test]
    fn zero_retention_keeps_one() {
        let mut history = TranscriptHistory::new(0);
        history.push(TranscriptEntry::new("a", false));
        history.push(TranscriptEntry::new("b", false));
        assert_eq!(history.len(), 1);
        assert_eq!(history.last().unwrap().text, "b");
    }

    #[test]
    fn entries_record_partial_flag() {
        let entry = TranscriptEntry::new("hello", true);
        assert!(entry.is_partial);
        assert_eq!(entry.text, "hello");
    }
}
