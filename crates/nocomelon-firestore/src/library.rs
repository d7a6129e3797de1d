//! Library store backed by Firestore (`users/{user_id}/library/{id}`).

use async_trait::async_trait;
use nocomelon_models::LibraryEntry;
use tracing::{debug, warn};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::store::{library_collection, sort_newest_first, LibraryStore};
use crate::types::{from_fields, to_fields, Document};

const LIST_PAGE_SIZE: u32 = 300;

pub struct FirestoreLibraryStore {
    client: FirestoreClient,
}

impl FirestoreLibraryStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }
}

fn document_to_entry(doc: &Document) -> FirestoreResult<LibraryEntry> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| FirestoreError::invalid_document("library entry has no fields"))?;
    from_fields(fields, &[])
}

#[async_trait]
impl LibraryStore for FirestoreLibraryStore {
    async fn list_for_user(&self, user_id: &str) -> FirestoreResult<Vec<LibraryEntry>> {
        let mut docs = self
            .client
            .list_all_documents(&library_collection(user_id), LIST_PAGE_SIZE)
            .await?;

        // Firestore lists by document id; createTime recovers insertion order.
        docs.sort_by(|a, b| a.create_time.cmp(&b.create_time));

        let mut entries = Vec::with_capacity(docs.len());
        for doc in &docs {
            match document_to_entry(doc) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(user_id = %user_id, doc = ?doc.name, "Skipping malformed library entry: {}", e),
            }
        }

        sort_newest_first(&mut entries);
        Ok(entries)
    }

    async fn save_entry(&self, user_id: &str, entry: LibraryEntry) -> FirestoreResult<LibraryEntry> {
        let fields = to_fields(&entry)?;
        self.client
            .upsert_document(&library_collection(user_id), &entry.id, fields)
            .await?;
        debug!(user_id = %user_id, entry_id = %entry.id, "Library entry saved");
        Ok(entry)
    }

    async fn delete_entry(&self, user_id: &str, id: &str) -> FirestoreResult<()> {
        self.client
            .delete_document(&library_collection(user_id), id)
            .await
    }
}
