//! Sliding window of recent message timestamps per (community, author).

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;

type Key = (String, String);

/// Per-sender message timestamps, shared across clones.
#[derive(Clone, Default)]
pub struct RateWindow {
    entries: Arc<DashMap<Key, VecDeque<i64>>>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `now`, drop timestamps that fell out of the window, and return
    /// how many remain (including this one).
    pub fn record(&self, community_id: &str, author_id: &str, now: i64, window_ms: u64) -> usize {
        let window_ms = window_ms.min(i64::MAX as u64) as i64;
        let mut entry = self
            .entries
            .entry((community_id.to_string(), author_id.to_string()))
            .or_default();
        entry.push_back(now);
        while let Some(&oldest) = entry.front() {
            if now.saturating_sub(oldest) >= window_ms {
                entry.pop_front();
            } else {
                break;
            }
        }
        entry.len()
    }

    /// Timestamps currently held for a sender.
    pub fn count(&self, community_id: &str, author_id: &str) -> usize {
        self.entries
            .get(&(community_id.to_string(), author_id.to_string()))
            .map(|e| e.len())
            .unwrap_or(0)
    }

    /// Forget a sender, e.g. when they leave the community.
    pub fn clear_author(&self, community_id: &str, author_id: &str) {
        self.entries
            .remove(&(community_id.to_string(), author_id.to_string()));
    }

    /// Evict senders whose newest message is at least `idle_ms` old.
    /// Returns how many keys were removed.
    pub fn sweep(&self, now: i64, idle_ms: u64) -> usize {
        let idle_ms = idle_ms.min(i64::MAX as u64) as i64;
        let before = self.entries.len();
        self.entries.retain(|_, stamps| match stamps.back() {
            Some(&newest) => now.saturating_sub(newest) < idle_ms,
            None => false,
        });
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed = removed, remaining = self.entries.len(), "Rate window swept");
        }
        removed
    }

    /// Number of (community, author) keys tracked.
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_within_window() {
        let window = RateWindow::new();
        assert_eq!(window.record("g1", "u1", 1_000, 8_000), 1);
        assert_eq!(window.record("g1", "u1", 2_000, 8_000), 2);
        assert_eq!(window.record("g1", "u1", 3_000, 8_000), 3);
    }

    #[test]
    fn test_prunes_stale_entries() {
        let window = RateWindow::new();
        window.record("g1", "u1", 0, 8_000);
        window.record("g1", "u1", 1_000, 8_000);
        // 0 is exactly one window old and drops out; 1_000 stays.
        assert_eq!(window.record("g1", "u1", 8_000, 8_000), 2);
        assert_eq!(window.record("g1", "u1", 20_000, 8_000), 1);
    }

    #[test]
    fn test_no_cross_community_leakage() {
        let window = RateWindow::new();
        window.record("g1", "u1", 1_000, 8_000);
        window.record("g1", "u1", 1_100, 8_000);
        assert_eq!(window.record("g2", "u1", 1_200, 8_000), 1);
        assert_eq!(window.record("g1", "u2", 1_300, 8_000), 1);
        assert_eq!(window.tracked_keys(), 3);
    }

    #[test]
    fn test_sweep_evicts_idle_keys() {
        let window = RateWindow::new();
        window.record("g1", "old", 0, 8_000);
        window.record("g1", "fresh", 70_000, 8_000);

        assert_eq!(window.sweep(80_000, 80_000), 1);
        assert_eq!(window.count("g1", "old"), 0);
        assert_eq!(window.count("g1", "fresh"), 1);
    }

    #[test]
    fn test_clear_author() {
        let window = RateWindow::new();
        window.record("g1", "u1", 0, 8_000);
        window.clear_author("g1", "u1");
        assert_eq!(window.tracked_keys(), 0);
    }
}
