//! Checkpoint and library persistence.
//!
//! This crate provides:
//! - A Firestore REST client with token caching, retries and metrics
//! - `CheckpointStore`: merge-on-write, expiring per-run progress records
//! - `LibraryStore`: a user's saved storybooks
//! - Firestore and in-memory backends for both

pub mod checkpoints;
pub mod client;
pub mod clock;
pub mod error;
pub mod library;
pub mod memory;
pub mod metrics;
pub mod retry;
pub mod store;
pub mod token;
pub mod types;

pub use checkpoints::FirestoreCheckpointStore;
pub use client::{FirestoreClient, FirestoreConfig};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{FirestoreError, FirestoreResult};
pub use library::FirestoreLibraryStore;
pub use memory::MemoryStore;
pub use retry::RetryConfig;
pub use store::{CheckpointStore, LibraryStore};
pub use token::{StaticToken, TokenSource};
