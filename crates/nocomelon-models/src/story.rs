//! Drawing analysis, story scripts and creative options.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Story theme options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Adventure,
    Kindness,
    Bravery,
    Bedtime,
    Friendship,
    Counting,
    Nature,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Adventure => "adventure",
            Theme::Kindness => "kindness",
            Theme::Bravery => "bravery",
            Theme::Bedtime => "bedtime",
            Theme::Friendship => "friendship",
            Theme::Counting => "counting",
            Theme::Nature => "nature",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Visual style of the generated illustrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    #[default]
    Storybook,
    Watercolor,
}

impl Style {
    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Storybook => "storybook",
            Style::Watercolor => "watercolor",
        }
    }

    /// Prompt fragment describing the rendering style.
    pub fn prompt(&self) -> &'static str {
        match self {
            Style::Storybook => {
                "children's book illustration, warm colors, soft lighting, hand-painted feel, cozy atmosphere"
            }
            Style::Watercolor => {
                "watercolor painting, soft edges, dreamy, pastel tones, artistic, ethereal"
            }
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Narrator voice options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VoiceType {
    #[default]
    Gentle,
    Cheerful,
}

impl VoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceType::Gentle => "gentle",
            VoiceType::Cheerful => "cheerful",
        }
    }
}

impl fmt::Display for VoiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of analyzing a child's drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DrawingAnalysis {
    /// Main subject of the drawing
    pub subject: String,
    /// Background or setting
    pub setting: String,
    /// Notable details
    pub details: Vec<String>,
    /// Apparent mood
    pub mood: String,
    /// Primary colors used
    pub colors: Vec<String>,
}

impl DrawingAnalysis {
    /// One-line description of the main character for illustration prompts.
    pub fn character_description(&self) -> String {
        if self.details.is_empty() {
            format!("The main character is {}.", self.subject)
        } else {
            format!(
                "The main character is {} with {}.",
                self.subject,
                self.details.join(", ")
            )
        }
    }
}

/// A single scene in the story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// 1-based scene number
    pub number: u32,
    pub text: String,
}

/// Complete story script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StoryScript {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub total_scenes: u32,
}

/// Problems with scene numbering.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneNumberingError {
    #[error("story has no scenes")]
    Empty,
    #[error("scene at position {position} has number {found}, expected {expected}")]
    Gap {
        position: usize,
        expected: u32,
        found: u32,
    },
}

impl StoryScript {
    pub fn new(title: Option<String>, scenes: Vec<Scene>) -> Self {
        let total_scenes = scenes.len() as u32;
        Self {
            title,
            scenes,
            total_scenes,
        }
    }

    /// Sort scenes by number and recompute `total_scenes`.
    pub fn normalized(mut self) -> Self {
        self.scenes.sort_by_key(|s| s.number);
        self.total_scenes = self.scenes.len() as u32;
        self
    }

    /// Check that scene numbers are 1-based, dense and ordered.
    pub fn validate_numbering(&self) -> Result<(), SceneNumberingError> {
        if self.scenes.is_empty() {
            return Err(SceneNumberingError::Empty);
        }
        for (position, scene) in self.scenes.iter().enumerate() {
            let expected = position as u32 + 1;
            if scene.number != expected {
                return Err(SceneNumberingError::Gap {
                    position,
                    expected,
                    found: scene.number,
                });
            }
        }
        Ok(())
    }

    /// Title to display, falling back to the drawing subject.
    pub fn display_title(&self, fallback: &str) -> String {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string())
    }
}
