//! Shared data models for the NoComelon storybook pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Run identifiers and the default user namespace
//! - Drawing analysis and story scripts
//! - Generated image, audio and video artifacts
//! - Pipeline checkpoints and their merge reducer
//! - Library entries
//! - Encoding constants and stage request payloads

pub mod artifact;
pub mod checkpoint;
pub mod encoding;
pub mod library;
pub mod requests;
pub mod run;
pub mod story;

pub use artifact::{AudioResult, GeneratedAudio, GeneratedImage, ImageResult, VideoResult};
pub use checkpoint::{
    Checkpoint, CheckpointStatus, CheckpointUpdate, PipelineStage, CHECKPOINT_TTL_SECS,
};
pub use encoding::EncodingConfig;
pub use library::LibraryEntry;
pub use requests::{
    Accepted, ImagesRequest, PipelineRequest, StoryRequest, VideoRequest, VisionRequest,
    VisionResponse, VoiceRequest,
};
pub use run::{is_valid_id, user_namespace, RunId, RunKey, DEFAULT_USER_ID, MAX_ID_LEN};
pub use story::{
    DrawingAnalysis, Scene, SceneNumberingError, StoryScript, Style, Theme, VoiceType,
};
