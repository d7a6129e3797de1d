//! Pipeline checkpoints.
//!
//! A checkpoint is the only mutable record of a run. Writes are merges: every
//! stage output written earlier survives later writes unless the later write
//! carries a replacement. `status`, `current_stage`, `error` and `updated_at`
//! always come from the latest write.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::artifact::{GeneratedAudio, GeneratedImage, VideoResult};
use crate::run::RunKey;
use crate::story::{DrawingAnalysis, StoryScript};

/// Checkpoints expire seven days after their last write.
pub const CHECKPOINT_TTL_SECS: i64 = 7 * 24 * 3600;

/// Run status as seen by polling clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    #[default]
    Processing,
    Complete,
    Error,
}

impl CheckpointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointStatus::Processing => "processing",
            CheckpointStatus::Complete => "complete",
            CheckpointStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckpointStatus::Complete | CheckpointStatus::Error)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(CheckpointStatus::Processing),
            "complete" => Some(CheckpointStatus::Complete),
            "error" => Some(CheckpointStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline stage names written into `current_stage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Vision,
    Story,
    Images,
    Voice,
    Video,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Vision => "vision",
            PipelineStage::Story => "story",
            PipelineStage::Images => "images",
            PipelineStage::Voice => "voice",
            PipelineStage::Video => "video",
        }
    }

    /// Stage marker written together with a `complete` status.
    pub fn complete_marker(&self) -> &'static str {
        match self {
            PipelineStage::Vision => "vision_complete",
            PipelineStage::Story => "story_complete",
            PipelineStage::Images => "images_complete",
            PipelineStage::Voice => "voice_complete",
            PipelineStage::Video => "video_complete",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted progress record of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Checkpoint {
    pub user_id: String,
    pub run_id: String,
    pub status: CheckpointStatus,
    pub current_stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawing_analysis: Option<DrawingAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_script: Option<StoryScript>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<GeneratedImage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<Vec<GeneratedAudio>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoResult>,
    pub updated_at: DateTime<Utc>,
    /// Absolute expiry, seconds since the Unix epoch
    pub ttl: i64,
}

impl Checkpoint {
    /// Whether the record has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.ttl <= now.timestamp()
    }

    /// Fold an update into the previous record.
    ///
    /// Stage outputs absent from `update` are carried over from `previous`;
    /// status, stage and error are replaced wholesale.
    pub fn merge_into(
        previous: Option<Checkpoint>,
        key: &RunKey,
        update: CheckpointUpdate,
        now: DateTime<Utc>,
    ) -> Checkpoint {
        let prev = previous.unwrap_or_else(|| Checkpoint::empty(key, now));

        Checkpoint {
            user_id: key.user_id.clone(),
            run_id: key.run_id.to_string(),
            status: update.status,
            current_stage: update.current_stage,
            error: update.error,
            drawing_analysis: update.drawing_analysis.or(prev.drawing_analysis),
            story_script: update.story_script.or(prev.story_script),
            images: update.images.or(prev.images),
            audio: update.audio.or(prev.audio),
            video: update.video.or(prev.video),
            updated_at: now,
            ttl: (now + Duration::seconds(CHECKPOINT_TTL_SECS)).timestamp(),
        }
    }

    fn empty(key: &RunKey, now: DateTime<Utc>) -> Self {
        Checkpoint {
            user_id: key.user_id.clone(),
            run_id: key.run_id.to_string(),
            status: CheckpointStatus::Processing,
            current_stage: String::new(),
            error: None,
            drawing_analysis: None,
            story_script: None,
            images: None,
            audio: None,
            video: None,
            updated_at: now,
            ttl: now.timestamp(),
        }
    }
}

/// Partial checkpoint write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CheckpointUpdate {
    pub status: CheckpointStatus,
    pub current_stage: String,
    pub error: Option<String>,
    pub drawing_analysis: Option<DrawingAnalysis>,
    pub story_script: Option<StoryScript>,
    pub images: Option<Vec<GeneratedImage>>,
    pub audio: Option<Vec<GeneratedAudio>>,
    pub video: Option<VideoResult>,
}

impl CheckpointUpdate {
    /// A `processing` write entering `stage`.
    pub fn processing(stage: PipelineStage) -> Self {
        Self {
            status: CheckpointStatus::Processing,
            current_stage: stage.as_str().to_string(),
            ..Default::default()
        }
    }

    /// A `complete` write after `stage` finished.
    pub fn complete(stage: PipelineStage) -> Self {
        Self {
            status: CheckpointStatus::Complete,
            current_stage: stage.complete_marker().to_string(),
            ..Default::default()
        }
    }

    /// An `error` write naming the failing stage.
    pub fn failed(stage: PipelineStage, error: impl Into<String>) -> Self {
        Self {
            status: CheckpointStatus::Error,
            current_stage: stage.as_str().to_string(),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_drawing(mut self, drawing: DrawingAnalysis) -> Self {
        self.drawing_analysis = Some(drawing);
        self
    }

    pub fn with_story(mut self, story: StoryScript) -> Self {
        self.story_script = Some(story);
        self
    }

    pub fn with_images(mut self, images: Vec<GeneratedImage>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn with_audio(mut self, audio: Vec<GeneratedAudio>) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_video(mut self, video: VideoResult) -> Self {
        self.video = Some(video);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::Scene;

    fn key() -> RunKey {
        RunKey::new("alice", "run00001")
    }

    fn drawing() -> DrawingAnalysis {
        DrawingAnalysis {
            subject: "cat".into(),
            setting: "garden".into(),
            details: vec![],
            mood: "calm".into(),
            colors: vec!["orange".into()],
        }
    }

    #[test]
    fn test_merge_creates_record_when_absent() {
        let now = Utc::now();
        let cp = Checkpoint::merge_into(
            None,
            &key(),
            CheckpointUpdate::processing(PipelineStage::Images).with_drawing(drawing()),
            now,
        );
        assert_eq!(cp.user_id, "alice");
        assert_eq!(cp.run_id, "run00001");
        assert_eq!(cp.status, CheckpointStatus::Processing);
        assert_eq!(cp.current_stage, "images");
        assert_eq!(cp.drawing_analysis, Some(drawing()));
        assert_eq!(cp.updated_at, now);
        assert_eq!(cp.ttl, now.timestamp() + CHECKPOINT_TTL_SECS);
    }

    #[test]
    fn test_merge_preserves_earlier_stage_outputs() {
        let t0 = Utc::now();
        let first = Checkpoint::merge_into(
            None,
            &key(),
            CheckpointUpdate::processing(PipelineStage::Voice)
                .with_drawing(drawing())
                .with_images(vec![GeneratedImage {
                    scene_number: 1,
                    key: "alice/images/a.png".into(),
                }]),
            t0,
        );

        let t1 = t0 + Duration::seconds(5);
        let second = Checkpoint::merge_into(
            Some(first),
            &key(),
            CheckpointUpdate::processing(PipelineStage::Video).with_story(StoryScript::new(
                None,
                vec![Scene {
                    number: 1,
                    text: "hi".into(),
                }],
            )),
            t1,
        );

        assert_eq!(second.current_stage, "video");
        assert_eq!(second.drawing_analysis, Some(drawing()));
        assert_eq!(second.images.as_ref().map(Vec::len), Some(1));
        assert!(second.story_script.is_some());
        assert_eq!(second.updated_at, t1);
    }

    #[test]
    fn test_merge_error_is_authoritative_from_latest_write() {
        let now = Utc::now();
        let failed = Checkpoint::merge_into(
            None,
            &key(),
            CheckpointUpdate::failed(PipelineStage::Voice, "tts down"),
            now,
        );
        assert_eq!(failed.status, CheckpointStatus::Error);
        assert_eq!(failed.error.as_deref(), Some("tts down"));

        let recovered = Checkpoint::merge_into(
            Some(failed),
            &key(),
            CheckpointUpdate::processing(PipelineStage::Voice),
            now,
        );
        assert_eq!(recovered.error, None);
        assert_eq!(recovered.status, CheckpointStatus::Processing);
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let cp = Checkpoint::merge_into(None, &key(), CheckpointUpdate::default(), now);
        assert!(!cp.is_expired(now));
        assert!(cp.is_expired(now + Duration::seconds(CHECKPOINT_TTL_SECS)));
    }

    #[test]
    fn test_fractional_durations_roundtrip_through_json() {
        let now = Utc::now();
        let cp = Checkpoint::merge_into(
            None,
            &key(),
            CheckpointUpdate::complete(PipelineStage::Video).with_video(VideoResult {
                video_key: "alice/videos/run_final.mp4".into(),
                duration_sec: 7.533333,
                thumbnail_key: "alice/videos/run_thumb.jpg".into(),
            }),
            now,
        );
        let json = serde_json::to_string(&cp).unwrap();
        let back: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back.video.unwrap().duration_sec, 7.533333);
        assert_eq!(back.current_stage, "video_complete");
    }

    #[test]
    fn test_status_terminal() {
        assert!(!CheckpointStatus::Processing.is_terminal());
        assert!(CheckpointStatus::Complete.is_terminal());
        assert!(CheckpointStatus::Error.is_terminal());
        assert_eq!(CheckpointStatus::parse("error"), Some(CheckpointStatus::Error));
        assert_eq!(CheckpointStatus::parse("bogus"), None);
    }
}
