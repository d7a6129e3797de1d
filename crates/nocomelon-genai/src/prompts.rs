//! Prompt text for the generation stages.

use nocomelon_models::{DrawingAnalysis, Scene, Style, VoiceType};

use crate::traits::StoryPrompt;

pub const VISION_SYSTEM_PROMPT: &str = r#"You are analyzing a child's drawing. Your job is to identify:
1. The main subject (character, animal, object)
2. The setting or background
3. Notable details that make this drawing unique
4. The apparent mood/emotion
5. Primary colors used

Be generous in interpretation. Assume the child meant to draw something coherent
even if the execution is imperfect. A scribble with eyes is probably a creature.
Describe what the child likely INTENDED, not what it literally looks like.

Return ONLY a JSON object with this schema:
{"subject": "string", "setting": "string", "details": ["string"], "mood": "string", "colors": ["string"]}"#;

pub const VISION_USER_PROMPT: &str = "Please analyze this child's drawing.";

pub const STORY_SYSTEM_PROMPT: &str = r#"You are a children's story writer. Generate a story based on the drawing
and theme provided.

CONTENT RULES (non-negotiable):
- No violence, conflict, or scary imagery
- No death, illness, or loss
- No villains or antagonists
- Characters solve problems through kindness, not confrontation
- All emotions are validated, all endings are positive
- No mention of real-world dangers (strangers, accidents)

FORMAT:
- Create a creative, engaging title for the story (e.g., "Dino's Big Adventure" not just "A Dinosaur")
- Number scenes from 1 with no gaps
- The last scene ends with a gentle lesson

The story should feel warm, safe, and celebrate the child's creativity.

Return ONLY a JSON object with this schema:
{"title": "string", "scenes": [{"number": 1, "text": "string"}]}"#;

/// Sentence length and scene count guidance by age.
pub fn age_guideline(age: u8) -> &'static str {
    match age {
        0..=3 => "Use very simple words (5-7 words per sentence). 3-4 scenes total. Simple cause and effect.",
        4..=5 => "Use basic adjectives (8-12 words per sentence). 5-6 scenes total. Clear story arc.",
        6..=7 => "Richer vocabulary (12-15 words per sentence). 6-7 scenes. Add light humor.",
        _ => "Age-appropriate language (15-20 words per sentence). 7-8 scenes. Mini plot twists OK.",
    }
}

fn voice_tone(voice: VoiceType) -> &'static str {
    match voice {
        VoiceType::Gentle => "warm and calm",
        VoiceType::Cheerful => "playful and energetic",
    }
}

/// User message for script generation.
pub fn story_prompt(prompt: &StoryPrompt) -> String {
    let drawing = &prompt.drawing;
    let mut parts = vec![
        format!("Create a story about: {}", drawing.subject),
        format!("Setting: {}", drawing.setting),
        format!("Details to incorporate: {}", drawing.details.join(", ")),
        format!("Mood: {}", drawing.mood),
        format!("Theme: {}", prompt.theme),
        format!("Age guideline: {}", age_guideline(prompt.child_age)),
        format!("Voice tone: {}", voice_tone(prompt.voice_type)),
    ];

    if let Some(context) = prompt
        .personal_context
        .as_deref()
        .filter(|c| !c.trim().is_empty())
    {
        parts.push(format!("Personal context to weave in: {}", context));
    }

    parts.join("\n")
}

/// Illustration prompt for one scene.
pub fn image_prompt(scene: &Scene, drawing: &DrawingAnalysis, style: Style) -> String {
    format!(
        "{} of {}\n{}\nChild-friendly, safe for young children, no scary elements.",
        style.prompt(),
        scene.text,
        drawing.character_description()
    )
}
