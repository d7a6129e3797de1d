//! Store traits shared by the Firestore and in-memory backends.

use async_trait::async_trait;
use nocomelon_models::{Checkpoint, CheckpointUpdate, LibraryEntry, RunKey};

use crate::error::FirestoreResult;

/// Durable, expiring progress record per `(user, run)`.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Merge `update` into the current record and persist the result.
    ///
    /// Stamps `updated_at` and pushes `ttl` out to seven days from now.
    async fn save(&self, key: &RunKey, update: CheckpointUpdate) -> FirestoreResult<Checkpoint>;

    /// Current record, or `None` when missing or expired.
    async fn get(&self, key: &RunKey) -> FirestoreResult<Option<Checkpoint>>;

    /// Remove the record. Removing a missing record succeeds.
    async fn delete(&self, key: &RunKey) -> FirestoreResult<()>;

    async fn check_connectivity(&self) -> FirestoreResult<()> {
        Ok(())
    }
}

/// A user's saved storybooks.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Entries sorted by `created_at` descending; ties keep insertion order.
    async fn list_for_user(&self, user_id: &str) -> FirestoreResult<Vec<LibraryEntry>>;

    /// Insert or replace the entry with the same id.
    async fn save_entry(&self, user_id: &str, entry: LibraryEntry) -> FirestoreResult<LibraryEntry>;

    /// Remove an entry. Removing a missing entry succeeds.
    async fn delete_entry(&self, user_id: &str, id: &str) -> FirestoreResult<()>;
}

/// Sort newest first. `entries` must already be in insertion order; the
/// stable sort keeps that order among equal timestamps.
pub fn sort_newest_first(entries: &mut [LibraryEntry]) {
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

pub(crate) fn checkpoints_collection(user_id: &str) -> String {
    format!("users/{}/checkpoints", user_id)
}

pub(crate) fn library_collection(user_id: &str) -> String {
    format!("users/{}/library", user_id)
}
