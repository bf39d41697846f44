//! Wallet validation tracking
//!
//! The engine validates a wallet against the base node through several
//! independent requests (outputs, transactions). The sync state is derived
//! from the combined results.

use super::state::BaseNodeSyncState;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ValidationTracker {
    /// Request id -> result (`None` while still running)
    results: HashMap<u64, Option<bool>>,
}

impl ValidationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validation request that has been started
    pub fn begin(&mut self, request_id: u64) {
        self.results.insert(request_id, None);
    }

    /// Record the result of a pending validation request.
    ///
    /// Returns `false` when the request is unknown or already finished,
    /// e.g. a late result for a base node that has since been replaced.
    pub fn complete(&mut self, request_id: u64, success: bool) -> bool {
        match self.results.get_mut(&request_id) {
            Some(result @ None) => {
                *result = Some(success);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Derive the sync state from the recorded results.
    ///
    /// Any failure wins over pending requests. Results are cleared once a
    /// final state (`Failed` or `Online`) has been reached.
    pub fn evaluate(&mut self) -> Option<BaseNodeSyncState> {
        if self.results.is_empty() {
            return None;
        }

        if self.results.values().any(|r| *r == Some(false)) {
            self.results.clear();
            return Some(BaseNodeSyncState::Failed);
        }

        if self.results.values().any(Option::is_none) {
            return Some(BaseNodeSyncState::Syncing);
        }

        self.results.clear();
        Some(BaseNodeSyncState::Online)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tracker_has_no_state() {
        let mut tracker = ValidationTracker::new();
        assert_eq!(tracker.evaluate(), None);
    }

    #[test]
    fn test_pending_then_online() {
        let mut tracker = ValidationTracker::new();
        tracker.begin(1);
        tracker.begin(2);
        assert_eq!(tracker.evaluate(), Some(BaseNodeSyncState::Syncing));

        assert!(tracker.complete(1, true));
        assert_eq!(tracker.evaluate(), Some(BaseNodeSyncState::Syncing));

        assert!(tracker.complete(2, true));
        assert_eq!(tracker.evaluate(), Some(BaseNodeSyncState::Online));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_failure_wins_over_pending() {
        let mut tracker = ValidationTracker::new();
        tracker.begin(1);
        tracker.begin(2);
        tracker.complete(2, false);

        assert_eq!(tracker.evaluate(), Some(BaseNodeSyncState::Failed));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_results_for_unknown_requests_are_ignored() {
        let mut tracker = ValidationTracker::new();
        assert!(!tracker.complete(7, true));
        assert!(tracker.is_empty());
        assert_eq!(tracker.evaluate(), None);

        tracker.begin(1);
        tracker.begin(2);
        assert!(tracker.complete(2, false));
        assert_eq!(tracker.evaluate(), Some(BaseNodeSyncState::Failed));

        // Request 1 was dropped with the failed round
        assert!(!tracker.complete(1, true));
        assert_eq!(tracker.evaluate(), None);
    }

    #[test]
    fn test_finished_request_cannot_be_overwritten() {
        let mut tracker = ValidationTracker::new();
        tracker.begin(1);
        tracker.begin(2);
        assert!(tracker.complete(1, true));
        assert!(!tracker.complete(1, false));
        assert_eq!(tracker.evaluate(), Some(BaseNodeSyncState::Syncing));
    }
}
