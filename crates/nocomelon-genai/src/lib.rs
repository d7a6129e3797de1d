//! Generation service clients.
//!
//! The pipeline only sees the traits in [`traits`]; the concrete clients
//! talk to OpenAI (vision, scripts, images) and ElevenLabs (speech).

pub mod elevenlabs;
pub mod error;
pub mod metrics;
pub mod openai;
pub mod prompts;
pub mod traits;

pub use elevenlabs::{ElevenLabsClient, ElevenLabsConfig};
pub use error::{GenAiError, GenAiResult};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use traits::{DrawingAnalyzer, Illustrator, Narrator, StoryPrompt, StoryWriter, Unconfigured};
