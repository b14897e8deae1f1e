use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Last observed up/down state per monitor, kept in memory only.
///
/// After a restart every monitor starts unobserved again, so the first check
/// of a process lifetime never counts as a transition.
#[derive(Debug, Default)]
pub struct TransitionTracker {
    states: DashMap<i64, bool>,
}

impl TransitionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `is_up` for the monitor and report whether it differs from the
    /// previously recorded state. Compare and update happen under the same
    /// shard lock, so concurrent observers of one flip see exactly one `true`.
    pub fn observe(&self, monitor_id: i64, is_up: bool) -> bool {
        match self.states.entry(monitor_id) {
            Entry::Vacant(slot) => {
                slot.insert(is_up);
                false
            }
            Entry::Occupied(mut slot) => {
                let changed = *slot.get() != is_up;
                slot.insert(is_up);
                changed
            }
        }
    }

    /// Last recorded state, `None` if the monitor was never observed
    pub fn last_state(&self, monitor_id: i64) -> Option<bool> {
        self.states.get(&monitor_id).map(|state| *state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_observation_is_not_a_transition() {
        let tracker = TransitionTracker::new();
        assert!(!tracker.observe(1, false));
        assert!(!tracker.observe(2, true));
        assert_eq!(tracker.last_state(1), Some(false));
    }

    #[test]
    fn only_state_changes_are_transitions() {
        let tracker = TransitionTracker::new();
        let observed: Vec<bool> =
            [true, true, false, false, true, false].into_iter().map(|up| tracker.observe(7, up)).collect();

        assert_eq!(observed, vec![false, false, true, false, true, true]);
    }

    #[test]
    fn monitors_are_tracked_independently() {
        let tracker = TransitionTracker::new();
        tracker.observe(1, true);
        tracker.observe(2, false);

        assert!(!tracker.observe(1, true));
        assert!(tracker.observe(2, true));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_flip_is_reported_once() {
        for _ in 0..50 {
            let tracker = Arc::new(TransitionTracker::new());
            tracker.observe(1, true);

            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let tracker = tracker.clone();
                    tokio::spawn(async move { tracker.observe(1, false) })
                })
                .collect();

            let mut transitions = 0;
            for handle in handles {
                if handle.await.unwrap() {
                    transitions += 1;
                }
            }
            assert_eq!(transitions, 1);
        }
    }
}
