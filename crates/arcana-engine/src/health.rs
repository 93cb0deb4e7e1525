// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Last-observed provider availability.
//!
//! The processor records the outcome of every provider call here; the
//! gateway's health and stats endpoints read it. A provider with no calls
//! yet is reported as up, since the only evidence of failure is a failed
//! call.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

#[derive(Clone, Default)]
pub struct ProviderHealth {
    inner: Arc<DashMap<String, bool>>,
}

impl ProviderHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of the most recent call to `provider`.
    pub fn mark(&self, provider: &str, up: bool) {
        self.inner.insert(provider.to_string(), up);
    }

    /// Last observed state, `None` if the provider has not been called.
    pub fn status(&self, provider: &str) -> Option<bool> {
        self.inner.get(provider).map(|entry| *entry)
    }

    /// Sorted snapshot for stable JSON rendering.
    pub fn snapshot(&self) -> BTreeMap<String, bool> {
        self.inner
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_has_no_status() {
        let health = ProviderHealth::new();
        assert_eq!(health.status("anthropic"), None);
    }

    #[test]
    fn mark_overwrites_previous_state() {
        let health = ProviderHealth::new();
        health.mark("anthropic", false);
        assert_eq!(health.status("anthropic"), Some(false));
        health.mark("anthropic", true);
        assert_eq!(health.status("anthropic"), Some(true));
    }

    #[test]
    fn snapshot_is_sorted_by_name() {
        let health = ProviderHealth::new();
        health.mark("gemini", true);
        health.mark("anthropic", false);
        let snapshot = health.snapshot();
        let names: Vec<&str> = snapshot.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["anthropic", "gemini"]);
    }
}
