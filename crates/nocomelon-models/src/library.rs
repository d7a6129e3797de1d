//! Saved storybooks.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::story::Style;

/// A storybook saved to a user's library.
///
/// Library entries live independently from checkpoints; deleting one never
/// touches the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LibraryEntry {
    pub id: String,
    pub title: String,
    pub thumbnail_key: String,
    pub video_key: String,
    pub duration_sec: f64,
    pub style: Style,
    /// ISO-8601 creation timestamp as supplied by the client
    pub created_at: String,
}
