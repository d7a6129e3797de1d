//! Collaborator seams for the generation stages.
//!
//! Each trait is one black-box call. Implementations must be safe to share
//! across workers.

use async_trait::async_trait;
use nocomelon_models::{DrawingAnalysis, StoryScript, Theme, VoiceType};

use crate::error::{GenAiError, GenAiResult};

/// Inputs for script generation.
#[derive(Debug, Clone)]
pub struct StoryPrompt {
    pub drawing: DrawingAnalysis,
    pub theme: Theme,
    pub child_age: u8,
    pub voice_type: VoiceType,
    pub personal_context: Option<String>,
}

#[async_trait]
pub trait DrawingAnalyzer: Send + Sync {
    /// Describe a base64-encoded PNG drawing.
    async fn analyze(&self, image_base64: &str) -> GenAiResult<DrawingAnalysis>;
}

#[async_trait]
pub trait StoryWriter: Send + Sync {
    async fn write_story(&self, prompt: &StoryPrompt) -> GenAiResult<StoryScript>;
}

#[async_trait]
pub trait Illustrator: Send + Sync {
    /// Render one image, returned as PNG bytes.
    async fn illustrate(&self, prompt: &str) -> GenAiResult<Vec<u8>>;
}

#[async_trait]
pub trait Narrator: Send + Sync {
    /// Speak `text`, returned as MP3 bytes.
    async fn narrate(&self, text: &str, voice: VoiceType) -> GenAiResult<Vec<u8>>;
}

/// Stand-in for a provider whose credentials are missing.
///
/// Every call fails with [`GenAiError::NotConfigured`] naming the variable
/// that would enable it.
#[derive(Debug, Clone, Copy)]
pub struct Unconfigured(pub &'static str);

#[async_trait]
impl DrawingAnalyzer for Unconfigured {
    async fn analyze(&self, _image_base64: &str) -> GenAiResult<DrawingAnalysis> {
        Err(GenAiError::not_configured(self.0))
    }
}

#[async_trait]
impl StoryWriter for Unconfigured {
    async fn write_story(&self, _prompt: &StoryPrompt) -> GenAiResult<StoryScript> {
        Err(GenAiError::not_configured(self.0))
    }
}

#[async_trait]
impl Illustrator for Unconfigured {
    async fn illustrate(&self, _prompt: &str) -> GenAiResult<Vec<u8>> {
        Err(GenAiError::not_configured(self.0))
    }
}

#[async_trait]
impl Narrator for Unconfigured {
    async fn narrate(&self, _text: &str, _voice: VoiceType) -> GenAiResult<Vec<u8>> {
        Err(GenAiError::not_configured(self.0))
    }
}
