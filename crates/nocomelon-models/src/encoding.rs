//! Video encoding configuration for storybook assembly.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default pixel format, required by most players for H.264
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Relative weight of the background music against narration.
pub const MUSIC_WEIGHT: f32 = 0.15;

/// Thumbnail generation settings
pub const THUMBNAIL_SCALE_WIDTH: u32 = 480;
pub const THUMBNAIL_TIMESTAMP: &str = "00:00:01";

/// Video encoding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Stop encoding when the shortest stream ends
    #[serde(default = "default_shortest")]
    pub shortest: bool,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_pixel_format() -> String {
    DEFAULT_PIXEL_FORMAT.to_string()
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}
fn default_shortest() -> bool {
    true
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            shortest: true,
            extra_args: Vec::new(),
        }
    }
}

impl EncodingConfig {
    /// Create a new encoding configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ];

        if self.shortest {
            args.push("-shortest".to_string());
        }

        args.extend(self.extra_args.clone());

        args
    }
}

/// Filter graph mixing narration (`[1:a]`) with background music (`[2:a]`).
///
/// Narration is the first input so `duration=first` bounds the mix by it.
pub fn music_mix_filter() -> String {
    format!(
        "[1:a][2:a]amix=inputs=2:duration=first:weights=1 {}[a]",
        MUSIC_WEIGHT
    )
}

/// Scale filter for thumbnails, preserving aspect ratio.
pub fn thumbnail_scale_filter() -> String {
    format!("scale={}:-1", THUMBNAIL_SCALE_WIDTH)
}
