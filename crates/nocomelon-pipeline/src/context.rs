//! Shared collaborators for every run.

use std::sync::Arc;

use nocomelon_firestore::CheckpointStore;
use nocomelon_genai::{DrawingAnalyzer, Illustrator, Narrator, StoryWriter};
use nocomelon_media::MediaToolkit;
use nocomelon_storage::ArtifactStore;

use crate::assembler::MediaAssembler;
use crate::config::PipelineConfig;

/// Everything a stage needs, built once at startup and shared via `Arc`.
#[derive(Clone)]
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub storage: Arc<ArtifactStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub analyzer: Arc<dyn DrawingAnalyzer>,
    pub writer: Arc<dyn StoryWriter>,
    pub illustrator: Arc<dyn Illustrator>,
    pub narrator: Arc<dyn Narrator>,
    pub toolkit: Arc<dyn MediaToolkit>,
}

impl PipelineContext {
    pub fn assembler(&self) -> MediaAssembler {
        MediaAssembler::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.toolkit),
            self.config.work_dir.clone(),
        )
    }
}
