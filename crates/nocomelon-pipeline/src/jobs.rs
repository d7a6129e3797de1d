//! Background run bodies.
//!
//! A run writes a checkpoint after every stage and stops at the first
//! failure, recording the failing stage and message.

use std::sync::{Arc, Mutex};

use nocomelon_genai::StoryPrompt;
use nocomelon_models::{
    CheckpointUpdate, PipelineRequest, PipelineStage, RunKey, StoryRequest, VideoResult,
};
use tracing::{error, Instrument};

use crate::context::PipelineContext;
use crate::error::PipelineResult;
use crate::logging::RunLogger;
use crate::metrics::record_run;
use crate::stages;

/// Work accepted by the controller.
#[derive(Debug, Clone)]
pub enum PipelineJob {
    Vision { key: RunKey, image_base64: String },
    Story { key: RunKey, request: StoryRequest },
    Full { key: RunKey, request: PipelineRequest },
}

impl PipelineJob {
    pub fn key(&self) -> &RunKey {
        match self {
            Self::Vision { key, .. } | Self::Story { key, .. } | Self::Full { key, .. } => key,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Vision { .. } => "vision",
            Self::Story { .. } => "story",
            Self::Full { .. } => "pipeline",
        }
    }

    /// Stage recorded in the acceptance checkpoint.
    pub fn first_stage(&self) -> PipelineStage {
        match self {
            Self::Vision { .. } => PipelineStage::Vision,
            Self::Story { .. } => PipelineStage::Story,
            Self::Full { .. } => PipelineStage::Images,
        }
    }
}

/// Stage a run is currently in, readable after the run task panics.
#[derive(Debug, Clone)]
pub(crate) struct StageTracker(Arc<Mutex<PipelineStage>>);

impl StageTracker {
    pub(crate) fn new(stage: PipelineStage) -> Self {
        Self(Arc::new(Mutex::new(stage)))
    }

    pub(crate) fn set(&self, stage: PipelineStage) {
        *self.0.lock().unwrap_or_else(|p| p.into_inner()) = stage;
    }

    pub(crate) fn get(&self) -> PipelineStage {
        *self.0.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Run a job to completion, leaving its outcome in the checkpoint.
pub(crate) async fn execute(ctx: &PipelineContext, job: PipelineJob, tracker: StageTracker) {
    let kind = job.kind();
    let logger = RunLogger::new(job.key(), kind);
    let span = logger.span();

    async {
        logger.log_start(&format!("{} run", kind));
        let key = job.key().clone();
        let result = match &job {
            PipelineJob::Vision { key, image_base64 } => run_vision(ctx, key, image_base64).await,
            PipelineJob::Story { key, request } => run_story(ctx, key, request).await,
            PipelineJob::Full { key, request } => {
                run_full(ctx, key, request, &tracker, &logger).await.map(|video| {
                    logger.log_completion(&format!(
                        "video {} ({:.1}s)",
                        video.video_key, video.duration_sec
                    ));
                })
            }
        };

        match result {
            Ok(()) => {
                if !matches!(job, PipelineJob::Full { .. }) {
                    logger.log_completion(kind);
                }
                record_run(kind, "complete");
            }
            Err(e) => {
                let stage = tracker.get();
                logger.log_error(stage, &e.to_string());
                record_failure(ctx, &key, stage, &e.to_string()).await;
                record_run(kind, "error");
            }
        }
    }
    .instrument(span)
    .await
}

/// Write the error checkpoint for a failed run.
pub(crate) async fn record_failure(
    ctx: &PipelineContext,
    key: &RunKey,
    stage: PipelineStage,
    message: &str,
) {
    if let Err(e) = ctx
        .checkpoints
        .save(key, CheckpointUpdate::failed(stage, message))
        .await
    {
        error!(
            user_id = %key.user_id,
            run_id = %key.run_id,
            stage = %stage,
            "Failed to record run failure: {}", e
        );
    }
}

async fn run_vision(ctx: &PipelineContext, key: &RunKey, image: &str) -> PipelineResult<()> {
    let drawing = stages::analyze(ctx, image).await?;
    ctx.checkpoints
        .save(key, CheckpointUpdate::complete(PipelineStage::Vision).with_drawing(drawing))
        .await?;
    Ok(())
}

async fn run_story(ctx: &PipelineContext, key: &RunKey, request: &StoryRequest) -> PipelineResult<()> {
    let story = stages::write_story(ctx, &story_prompt(request)).await?;
    ctx.checkpoints
        .save(
            key,
            CheckpointUpdate::complete(PipelineStage::Story)
                .with_drawing(request.drawing.clone())
                .with_story(story),
        )
        .await?;
    Ok(())
}

async fn run_full(
    ctx: &PipelineContext,
    key: &RunKey,
    request: &PipelineRequest,
    tracker: &StageTracker,
    logger: &RunLogger,
) -> PipelineResult<VideoResult> {
    let user_id = Some(key.user_id.as_str());

    let images = stages::illustrate_scenes(
        ctx,
        &request.story,
        &request.drawing,
        request.style,
        &key.run_id,
        user_id,
    )
    .await?;
    ctx.checkpoints
        .save(
            key,
            CheckpointUpdate::processing(PipelineStage::Voice).with_images(images.images.clone()),
        )
        .await?;
    tracker.set(PipelineStage::Voice);
    logger.log_stage(PipelineStage::Images, &format!("{} images", images.images.len()));

    let audio = stages::narrate_scenes(ctx, &request.story, request.voice_type, &key.run_id, user_id)
        .await?;
    ctx.checkpoints
        .save(
            key,
            CheckpointUpdate::processing(PipelineStage::Video).with_audio(audio.audio_files.clone()),
        )
        .await?;
    tracker.set(PipelineStage::Video);
    logger.log_stage(
        PipelineStage::Voice,
        &format!("{:.1}s of narration", audio.total_duration_sec),
    );

    let video = stages::assemble(
        ctx,
        &images,
        &audio,
        request.music_track.as_deref(),
        &key.run_id,
        user_id,
    )
    .await?;
    ctx.checkpoints
        .save(
            key,
            CheckpointUpdate::complete(PipelineStage::Video).with_video(video.clone()),
        )
        .await?;

    Ok(video)
}

pub(crate) fn story_prompt(request: &StoryRequest) -> StoryPrompt {
    StoryPrompt {
        drawing: request.drawing.clone(),
        theme: request.theme,
        child_age: request.child_age,
        voice_type: request.voice_type,
        personal_context: request.personal_context.clone(),
    }
}
