//! Stage request and acceptance payloads.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::artifact::{AudioResult, ImageResult};
use crate::checkpoint::CheckpointStatus;
use crate::story::{DrawingAnalysis, StoryScript, Style, Theme, VoiceType};

/// Request to analyze a drawing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct VisionRequest {
    /// Base64-encoded drawing, optionally as a data URL
    #[validate(length(min = 1, message = "image_base64 must not be empty"))]
    pub image_base64: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Request to write a story script.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct StoryRequest {
    pub drawing: DrawingAnalysis,
    pub theme: Theme,
    #[serde(default)]
    pub personal_context: Option<String>,
    pub voice_type: VoiceType,
    #[validate(range(min = 3, max = 7, message = "child_age must be between 3 and 7"))]
    pub child_age: u8,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
}

/// Request to illustrate every scene.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct ImagesRequest {
    #[validate(length(min = 1, message = "run_id must not be empty"))]
    pub run_id: String,
    pub story: StoryScript,
    pub drawing: DrawingAnalysis,
    #[serde(default)]
    pub style: Style,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Request to narrate every scene.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct VoiceRequest {
    #[validate(length(min = 1, message = "run_id must not be empty"))]
    pub run_id: String,
    pub story: StoryScript,
    #[serde(default)]
    pub voice_type: VoiceType,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Request to assemble the final video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct VideoRequest {
    #[validate(length(min = 1, message = "run_id must not be empty"))]
    pub run_id: String,
    pub images: ImageResult,
    pub audio: AudioResult,
    /// Optional background music reference
    #[serde(default)]
    pub music_track: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Request to run illustrate, narrate and assemble in the background.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct PipelineRequest {
    #[serde(default)]
    pub run_id: String,
    pub story: StoryScript,
    pub drawing: DrawingAnalysis,
    #[serde(default)]
    pub style: Style,
    #[serde(default)]
    pub voice_type: VoiceType,
    #[serde(default)]
    pub music_track: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Acknowledgement returned by asynchronous submissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Accepted {
    pub run_id: String,
    pub status: CheckpointStatus,
    pub current_stage: String,
}

/// Result of a synchronous drawing analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VisionResponse {
    pub run_id: String,
    pub drawing: DrawingAnalysis,
}
