//! In-memory checkpoint and library stores for local development and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use nocomelon_models::{Checkpoint, CheckpointUpdate, LibraryEntry, RunKey};
use tokio::sync::RwLock;

use crate::clock::{Clock, SystemClock};
use crate::error::FirestoreResult;
use crate::store::{sort_newest_first, CheckpointStore, LibraryStore};

/// Process-local store. Contents are lost on restart.
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    checkpoints: RwLock<HashMap<RunKey, Checkpoint>>,
    /// Per user, in insertion order
    library: RwLock<HashMap<String, Vec<LibraryEntry>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            checkpoints: RwLock::new(HashMap::new()),
            library: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn save(&self, key: &RunKey, update: CheckpointUpdate) -> FirestoreResult<Checkpoint> {
        let now = self.clock.now();
        let mut checkpoints = self.checkpoints.write().await;
        let previous = checkpoints.remove(key).filter(|c| !c.is_expired(now));
        let next = Checkpoint::merge_into(previous, key, update, now);
        checkpoints.insert(key.clone(), next.clone());
        Ok(next)
    }

    async fn get(&self, key: &RunKey) -> FirestoreResult<Option<Checkpoint>> {
        let now = self.clock.now();
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints
            .get(key)
            .filter(|c| !c.is_expired(now))
            .cloned())
    }

    async fn delete(&self, key: &RunKey) -> FirestoreResult<()> {
        self.checkpoints.write().await.remove(key);
        Ok(())
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn list_for_user(&self, user_id: &str) -> FirestoreResult<Vec<LibraryEntry>> {
        let library = self.library.read().await;
        let mut entries = library.get(user_id).cloned().unwrap_or_default();
        sort_newest_first(&mut entries);
        Ok(entries)
    }

    async fn save_entry(&self, user_id: &str, entry: LibraryEntry) -> FirestoreResult<LibraryEntry> {
        let mut library = self.library.write().await;
        let entries = library.entry(user_id.to_string()).or_default();
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry.clone(),
            None => entries.push(entry.clone()),
        }
        Ok(entry)
    }

    async fn delete_entry(&self, user_id: &str, id: &str) -> FirestoreResult<()> {
        if let Some(entries) = self.library.write().await.get_mut(user_id) {
            entries.retain(|e| e.id != id);
        }
        Ok(())
    }
}
