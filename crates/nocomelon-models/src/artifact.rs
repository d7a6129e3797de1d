//! Generated media artifacts.
//!
//! Every `key` is an artifact reference: a local path, a storage key or a URL.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A generated image for a scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedImage {
    pub scene_number: u32,
    pub key: String,
}

/// Result of the illustration stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ImageResult {
    pub images: Vec<GeneratedImage>,
}

/// Generated narration for a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedAudio {
    pub scene_number: u32,
    pub key: String,
    pub duration_sec: f64,
}

/// Result of the narration stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct AudioResult {
    pub audio_files: Vec<GeneratedAudio>,
    pub total_duration_sec: f64,
}

impl AudioResult {
    pub fn new(audio_files: Vec<GeneratedAudio>) -> Self {
        let total_duration_sec = audio_files.iter().map(|a| a.duration_sec).sum();
        Self {
            audio_files,
            total_duration_sec,
        }
    }
}

/// Result of the assembly stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoResult {
    pub video_key: String,
    /// Probed duration of the encoded file
    pub duration_sec: f64,
    pub thumbnail_key: String,
}
