//! Application state.

use std::sync::Arc;

use nocomelon_firestore::{
    CheckpointStore, FirestoreCheckpointStore, FirestoreClient, FirestoreLibraryStore,
    LibraryStore, MemoryStore,
};
use nocomelon_genai::{
    DrawingAnalyzer, ElevenLabsClient, Illustrator, Narrator, OpenAiClient, StoryWriter,
    Unconfigured,
};
use nocomelon_media::{FfmpegRunner, FfmpegToolkit};
use nocomelon_models::EncodingConfig;
use nocomelon_pipeline::{ExecutorHandle, PipelineConfig, PipelineContext, PipelineController};
use nocomelon_storage::ArtifactStore;
use tracing::{info, warn};

use crate::config::{ApiConfig, CheckpointBackend};

pub type StartupError = Box<dyn std::error::Error + Send + Sync>;

/// Which AI providers have credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct Providers {
    pub openai: bool,
    pub elevenlabs: bool,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub controller: PipelineController,
    pub library: Arc<dyn LibraryStore>,
    pub providers: Providers,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        controller: PipelineController,
        library: Arc<dyn LibraryStore>,
        providers: Providers,
    ) -> Self {
        Self {
            config,
            controller,
            library,
            providers,
        }
    }

    /// Build every collaborator from the environment and start the executor.
    pub async fn from_env(config: ApiConfig) -> Result<(Self, ExecutorHandle), StartupError> {
        let pipeline = PipelineConfig::from_env();
        let storage = ArtifactStore::from_env().await?;
        if !storage.is_durable() {
            warn!(
                data_dir = %storage.local().data_dir().display(),
                "S3_BUCKET_NAME not set, artifacts stay on local disk"
            );
        }

        let checkpoints: Arc<dyn CheckpointStore>;
        let library: Arc<dyn LibraryStore>;
        match config.checkpoint_backend {
            CheckpointBackend::Firestore => {
                let client = FirestoreClient::from_env().await?;
                checkpoints = Arc::new(FirestoreCheckpointStore::new(client.clone()));
                library = Arc::new(FirestoreLibraryStore::new(client));
            }
            CheckpointBackend::Memory => {
                warn!("Using in-memory checkpoints, progress is lost on restart");
                let store = Arc::new(MemoryStore::new());
                checkpoints = store.clone();
                library = store;
            }
        }

        let mut providers = Providers::default();
        let analyzer: Arc<dyn DrawingAnalyzer>;
        let writer: Arc<dyn StoryWriter>;
        let illustrator: Arc<dyn Illustrator>;
        match OpenAiClient::from_env() {
            Ok(client) => {
                providers.openai = true;
                let client = Arc::new(client);
                analyzer = client.clone();
                writer = client.clone();
                illustrator = client;
            }
            Err(e) => {
                warn!("OpenAI client unavailable: {}", e);
                let missing = Arc::new(Unconfigured("OPENAI_API_KEY"));
                analyzer = missing.clone();
                writer = missing.clone();
                illustrator = missing;
            }
        }
        let narrator: Arc<dyn Narrator> = match ElevenLabsClient::from_env() {
            Ok(client) => {
                providers.elevenlabs = true;
                Arc::new(client)
            }
            Err(e) => {
                warn!("ElevenLabs client unavailable: {}", e);
                Arc::new(Unconfigured("ELEVENLABS_API_KEY"))
            }
        };

        let mut runner = FfmpegRunner::new();
        if let Some(secs) = pipeline.ffmpeg_timeout_secs {
            runner = runner.with_timeout(secs);
        }
        let toolkit = Arc::new(FfmpegToolkit::new(runner, EncodingConfig::default()));

        info!(
            workers = pipeline.workers,
            queue_capacity = pipeline.queue_capacity,
            max_scene_parallel = pipeline.max_scene_parallel,
            durable_storage = storage.is_durable(),
            "Pipeline configured"
        );

        let ctx = Arc::new(PipelineContext {
            config: pipeline,
            storage: Arc::new(storage),
            checkpoints,
            analyzer,
            writer,
            illustrator,
            narrator,
            toolkit,
        });
        let (controller, executor) = PipelineController::new(ctx);
        let handle = executor.spawn();

        Ok((Self::new(config, controller, library, providers), handle))
    }
}
