//! Checkpoint store backed by Firestore.
//!
//! Documents live at `users/{user_id}/checkpoints/{run_id}`. Writes merge on
//! the client: read the current record, fold the update in, then replace the
//! document. Concurrent writers to one key are last-write-wins.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use nocomelon_models::{Checkpoint, CheckpointUpdate, RunKey};
use tracing::{debug, info};

use crate::client::FirestoreClient;
use crate::clock::{Clock, SystemClock};
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_expired_read;
use crate::store::{checkpoints_collection, CheckpointStore};
use crate::types::{from_fields, timestamp_value, to_fields, Document};

/// Native TTL field; Firestore TTL policies need a timestamp value.
pub const EXPIRES_AT_FIELD: &str = "expires_at";

pub struct FirestoreCheckpointStore {
    client: FirestoreClient,
    clock: Arc<dyn Clock>,
}

impl FirestoreCheckpointStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self::with_clock(client, Arc::new(SystemClock))
    }

    pub fn with_clock(client: FirestoreClient, clock: Arc<dyn Clock>) -> Self {
        Self { client, clock }
    }

    async fn read(&self, key: &RunKey) -> FirestoreResult<Option<Checkpoint>> {
        let doc = self
            .client
            .get_document(&checkpoints_collection(&key.user_id), key.run_id.as_str())
            .await?;
        doc.map(|d| document_to_checkpoint(&d)).transpose()
    }
}

fn document_to_checkpoint(doc: &Document) -> FirestoreResult<Checkpoint> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| FirestoreError::invalid_document("checkpoint has no fields"))?;
    from_fields(fields, &[EXPIRES_AT_FIELD])
        .map_err(|e| FirestoreError::invalid_document(format!("checkpoint: {}", e)))
}

#[async_trait]
impl CheckpointStore for FirestoreCheckpointStore {
    async fn save(&self, key: &RunKey, update: CheckpointUpdate) -> FirestoreResult<Checkpoint> {
        let now = self.clock.now();
        let previous = self.read(key).await?.filter(|c| !c.is_expired(now));
        let next = Checkpoint::merge_into(previous, key, update, now);

        let mut fields = to_fields(&next)?;
        let expires_at = Utc
            .timestamp_opt(next.ttl, 0)
            .single()
            .unwrap_or(now);
        fields.insert(EXPIRES_AT_FIELD.to_string(), timestamp_value(expires_at));

        self.client
            .upsert_document(&checkpoints_collection(&key.user_id), key.run_id.as_str(), fields)
            .await?;

        debug!(
            user_id = %key.user_id,
            run_id = %key.run_id,
            status = %next.status,
            stage = %next.current_stage,
            "Checkpoint saved"
        );
        Ok(next)
    }

    async fn get(&self, key: &RunKey) -> FirestoreResult<Option<Checkpoint>> {
        let now = self.clock.now();
        match self.read(key).await? {
            Some(checkpoint) if checkpoint.is_expired(now) => {
                info!(user_id = %key.user_id, run_id = %key.run_id, "Checkpoint expired");
                record_expired_read();
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn delete(&self, key: &RunKey) -> FirestoreResult<()> {
        self.client
            .delete_document(&checkpoints_collection(&key.user_id), key.run_id.as_str())
            .await
    }

    async fn check_connectivity(&self) -> FirestoreResult<()> {
        self.client.check_connectivity().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FirestoreConfig;
    use crate::clock::ManualClock;
    use crate::retry::RetryConfig;
    use crate::token::StaticToken;
    use chrono::Duration;
    use nocomelon_models::{CheckpointStatus, GeneratedAudio, PipelineStage};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    const DOC: &str =
        "/v1/projects/test-project/databases/(default)/documents/users/alice/checkpoints/run00001";

    fn store(server: &MockServer, clock: Arc<ManualClock>) -> FirestoreCheckpointStore {
        let mut config = FirestoreConfig::for_project("test-project");
        config.retry = RetryConfig::none();
        let client =
            FirestoreClient::with_origin(config, &server.uri(), Arc::new(StaticToken("t".into())))
                .unwrap();
        FirestoreCheckpointStore::with_clock(client, clock)
    }

    fn key() -> RunKey {
        RunKey::new("alice", "run00001")
    }

    /// Echo the PATCH body back like Firestore does.
    struct Echo;

    impl Respond for Echo {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            ResponseTemplate::new(200).set_body_json(body)
        }
    }

    #[tokio::test]
    async fn test_save_writes_ttl_fields_and_doubles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DOC))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(DOC))
            .respond_with(Echo)
            .expect(1)
            .mount(&server)
            .await;

        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let store = store(&server, Arc::new(ManualClock::new(now)));
        let update = CheckpointUpdate::processing(PipelineStage::Voice).with_audio(vec![
            GeneratedAudio {
                scene_number: 1,
                key: "alice/audio/run00001_scene_1.mp3".into(),
                duration_sec: 3.0,
            },
        ]);
        let saved = store.save(&key(), update).await.unwrap();
        assert_eq!(saved.ttl, (now + Duration::days(7)).timestamp());

        let requests = server.received_requests().await.unwrap();
        let patch = requests.iter().find(|r| r.method.to_string() == "PATCH").unwrap();
        let body: serde_json::Value = serde_json::from_slice(&patch.body).unwrap();
        let fields = &body["fields"];
        assert_eq!(fields["status"], json!({"stringValue": "processing"}));
        assert!(fields["expires_at"]["timestampValue"]
            .as_str()
            .unwrap()
            .starts_with("2024-05-08T12:00:00"));
        let duration = &fields["audio"]["arrayValue"]["values"][0]["mapValue"]["fields"]
            ["duration_sec"];
        assert_eq!(duration, &json!({"doubleValue": 3.0}));
    }

    #[tokio::test]
    async fn test_save_merges_previous_outputs() {
        let server = MockServer::start().await;
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let previous = Checkpoint::merge_into(
            None,
            &key(),
            CheckpointUpdate::processing(PipelineStage::Images).with_images(vec![
                nocomelon_models::GeneratedImage {
                    scene_number: 1,
                    key: "alice/images/run00001_scene_1.png".into(),
                },
            ]),
            now,
        );
        let fields = to_fields(&previous).unwrap();
        Mock::given(method("GET"))
            .and(path(DOC))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "name": DOC, "fields": fields })),
            )
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(DOC))
            .respond_with(Echo)
            .mount(&server)
            .await;

        let clock = Arc::new(ManualClock::new(now));
        clock.advance(Duration::minutes(1));
        let store = store(&server, clock);
        let saved = store
            .save(&key(), CheckpointUpdate::failed(PipelineStage::Voice, "tts down"))
            .await
            .unwrap();

        assert_eq!(saved.status, CheckpointStatus::Error);
        assert_eq!(saved.current_stage, "voice");
        assert_eq!(saved.error.as_deref(), Some("tts down"));
        assert_eq!(saved.images.as_ref().map(Vec::len), Some(1));
        assert!(saved.updated_at > previous.updated_at);
    }

    #[tokio::test]
    async fn test_get_hides_expired_records() {
        let server = MockServer::start().await;
        let written = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let record = Checkpoint::merge_into(
            None,
            &key(),
            CheckpointUpdate::complete(PipelineStage::Video),
            written,
        );
        let mut fields = to_fields(&record).unwrap();
        fields.insert(
            EXPIRES_AT_FIELD.to_string(),
            timestamp_value(written + Duration::days(7)),
        );
        Mock::given(method("GET"))
            .and(path(DOC))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "name": DOC, "fields": fields })),
            )
            .mount(&server)
            .await;

        let clock = Arc::new(ManualClock::new(written + Duration::days(1)));
        let store = store(&server, clock.clone());
        let found = store.get(&key()).await.unwrap().unwrap();
        assert_eq!(found.current_stage, "video_complete");

        clock.advance(Duration::days(7));
        assert!(store.get(&key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store(&server, Arc::new(ManualClock::new(Utc::now())));
        assert!(store.get(&key()).await.unwrap().is_none());
    }
}
