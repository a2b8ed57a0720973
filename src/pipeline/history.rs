//! Bounded conversation history.
//!
//! Entries are appended by a finished chat exchange and evicted oldest-first
//! once the buffer holds more than `capacity` entries.  The capacity is twice
//! the context window, so trimming here never decides what the model sees;
//! [`HistoryBuffer::recent`] does.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// One completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub user_text: String,
    pub reply_text: String,
    /// Model that produced `reply_text`.
    pub model: String,
}

impl HistoryEntry {
    pub fn new(
        user_text: impl Into<String>,
        reply_text: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            user_text: user_text.into(),
            reply_text: reply_text.into(),
            model: model.into(),
        }
    }
}

/// Thread-safe bounded log of [`HistoryEntry`] values.
///
/// ```
/// use roverseer::pipeline::{HistoryBuffer, HistoryEntry};
///
/// let history = HistoryBuffer::new(2);
/// history.push(HistoryEntry::new("hi", "hello", "m"));
/// history.push(HistoryEntry::new("a", "b", "m"));
/// history.push(HistoryEntry::new("c", "d", "m"));
/// assert_eq!(history.len(), 2);
/// assert_eq!(history.snapshot()[0].user_text, "a");
/// ```
#[derive(Debug)]
pub struct HistoryBuffer {
    entries: Mutex<VecDeque<HistoryEntry>>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity + 1)),
            capacity,
        }
    }

    /// Buffer sized for a context window of `window` exchanges.
    pub fn for_context_window(window: usize) -> Self {
        Self::new(window.saturating_mul(2))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<HistoryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append and evict from the front down to capacity.
    pub fn push(&self, entry: HistoryEntry) {
        let mut entries = self.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// The newest `k` entries, oldest first.
    pub fn recent(&self, k: usize) -> Vec<HistoryEntry> {
        let entries = self.lock();
        let skip = entries.len().saturating_sub(k);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Drop everything.  Returns how many entries were removed.
    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(i: usize) -> HistoryEntry {
        HistoryEntry::new(format!("q{i}"), format!("a{i}"), "tinydolphin:1.1b")
    }

    #[test]
    fn capacity_is_twice_window() {
        assert_eq!(HistoryBuffer::for_context_window(10).capacity(), 20);
    }

    #[test]
    fn evicts_oldest_first() {
        let history = HistoryBuffer::new(3);
        for i in 0..5 {
            history.push(entry(i));
        }
        let users: Vec<String> = history.snapshot().into_iter().map(|e| e.user_text).collect();
        assert_eq!(users, vec!["q2", "q3", "q4"]);
    }

    #[test]
    fn recent_returns_newest_in_order() {
        let history = HistoryBuffer::new(10);
        for i in 0..4 {
            history.push(entry(i));
        }
        let recent = history.recent(2);
        assert_eq!(recent, vec![entry(2), entry(3)]);
        assert_eq!(history.recent(100).len(), 4);
        assert!(history.recent(0).is_empty());
    }

    #[test]
    fn clear_empties_and_reports_count() {
        let history = HistoryBuffer::new(4);
        history.push(entry(0));
        history.push(entry(1));
        assert_eq!(history.clear(), 2);
        assert!(history.is_empty());
        assert_eq!(history.clear(), 0);
    }

    #[test]
    fn concurrent_pushes_and_clears_stay_bounded() {
        let history = std::sync::Arc::new(HistoryBuffer::new(5));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let history = std::sync::Arc::clone(&history);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        if t == 0 && i % 50 == 0 {
                            history.clear();
                        } else {
                            history.push(entry(i));
                        }
                        assert!(history.len() <= 5);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(history.len() <= 5);
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity(
            capacity in 0usize..12,
            ops in proptest::collection::vec(0u8..4, 0..100),
        ) {
            let history = HistoryBuffer::new(capacity);
            for (i, op) in ops.into_iter().enumerate() {
                if op == 0 {
                    history.clear();
                    prop_assert_eq!(history.len(), 0);
                } else {
                    history.push(entry(i));
                }
                prop_assert!(history.len() <= capacity);
            }
        }
    }
}
