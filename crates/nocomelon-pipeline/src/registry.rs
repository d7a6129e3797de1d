//! Runs that are queued or executing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use nocomelon_models::RunKey;

use crate::metrics::set_in_flight;

/// Keys of accepted runs that have not finished yet.
#[derive(Debug, Clone, Default)]
pub struct InFlightRuns {
    inner: Arc<Mutex<HashSet<RunKey>>>,
}

impl InFlightRuns {
    fn lock(&self) -> MutexGuard<'_, HashSet<RunKey>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a run. Returns false if it is already in flight.
    pub fn insert(&self, key: RunKey) -> bool {
        let mut runs = self.lock();
        let inserted = runs.insert(key);
        set_in_flight(runs.len());
        inserted
    }

    pub fn remove(&self, key: &RunKey) {
        let mut runs = self.lock();
        runs.remove(key);
        set_in_flight(runs.len());
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_insert_is_refused() {
        let runs = InFlightRuns::default();
        let key = RunKey::new("alice", "r1");
        assert!(runs.insert(key.clone()));
        assert!(!runs.insert(key.clone()));
        assert!(runs.insert(RunKey::new("bob", "r1")));
        assert_eq!(runs.len(), 2);

        runs.remove(&key);
        assert_eq!(runs.len(), 1);
        assert!(runs.insert(key));
    }
}
