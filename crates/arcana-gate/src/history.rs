// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user sliding window of recent risk scores.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Timestamped risk scores per user, pruned to a fixed window and capped
/// in length so a chatty user cannot grow memory unboundedly.
pub(crate) struct SuspicionHistory {
    entries: DashMap<String, Vec<(DateTime<Utc>, f64)>>,
    window: chrono::Duration,
    max_entries: usize,
}

impl SuspicionHistory {
    pub fn new(window_secs: u64, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            window: chrono::Duration::seconds(window_secs as i64),
            max_entries,
        }
    }

    /// Record a flagged attempt.
    pub fn record(&self, user_id: &str, score: f64) {
        let now = Utc::now();
        let cutoff = now - self.window;
        let mut entry = self.entries.entry(user_id.to_string()).or_default();
        entry.push((now, score));
        entry.retain(|(ts, _)| *ts >= cutoff);
        if entry.len() > self.max_entries {
            let excess = entry.len() - self.max_entries;
            entry.drain(..excess);
        }
    }

    /// Sum of scores still inside the window.
    pub fn suspicion(&self, user_id: &str) -> f64 {
        let cutoff = Utc::now() - self.window;
        match self.entries.get(user_id) {
            Some(entry) => entry
                .iter()
                .filter(|(ts, _)| *ts >= cutoff)
                .map(|(_, score)| score)
                .sum(),
            None => 0.0,
        }
    }
}
