//! Pipeline controller.
//!
//! Asynchronous submissions are validated, registered as in flight, given an
//! acceptance checkpoint and queued for the executor. Synchronous operations
//! run one stage inline and record a best-effort checkpoint when the caller
//! names a run.

use std::sync::Arc;

use nocomelon_models::{
    is_valid_id, Accepted, AudioResult, CheckpointStatus, CheckpointUpdate, ImageResult, ImagesRequest,
    PipelineRequest, PipelineStage, RunId, RunKey, StoryRequest, StoryScript, VideoRequest,
    VideoResult, VisionRequest, VisionResponse, VoiceRequest, MAX_ID_LEN,
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};
use validator::Validate;

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::executor::PipelineExecutor;
use crate::jobs::{story_prompt, PipelineJob};
use crate::metrics::record_rejected;
use crate::registry::InFlightRuns;
use crate::stages;

#[derive(Clone)]
pub struct PipelineController {
    ctx: Arc<PipelineContext>,
    queue: mpsc::Sender<PipelineJob>,
    in_flight: InFlightRuns,
}

impl PipelineController {
    /// Create a controller and the executor that drains its queue.
    ///
    /// Nothing runs until [`PipelineExecutor::spawn`] is called.
    pub fn new(ctx: Arc<PipelineContext>) -> (Self, PipelineExecutor) {
        let (queue, receiver) = mpsc::channel(ctx.config.queue_capacity.max(1));
        let in_flight = InFlightRuns::default();
        let executor = PipelineExecutor::new(Arc::clone(&ctx), receiver, in_flight.clone());
        (
            Self {
                ctx,
                queue,
                in_flight,
            },
            executor,
        )
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Runs accepted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    // ------------------------------------------------------------------
    // Asynchronous submissions
    // ------------------------------------------------------------------

    /// Queue illustrate, narrate and assemble for one run.
    pub async fn submit_pipeline(&self, request: PipelineRequest) -> PipelineResult<Accepted> {
        request.validate()?;
        let user_id = required(request.user_id.as_deref(), "user_id")?;
        let run_id = required(Some(&request.run_id), "run_id")?;
        check_id("user_id", user_id)?;
        check_id("run_id", run_id)?;
        check_story(&request.story)?;

        let key = RunKey::new(user_id, run_id);
        let initial = CheckpointUpdate::processing(PipelineStage::Images)
            .with_drawing(request.drawing.clone())
            .with_story(request.story.clone());
        self.enqueue(PipelineJob::Full { key, request }, initial)
            .await
    }

    /// Queue a drawing analysis under a fresh run id.
    pub async fn submit_vision(&self, request: VisionRequest) -> PipelineResult<Accepted> {
        request.validate()?;
        let user_id = required(request.user_id.as_deref(), "user_id")?;
        check_id("user_id", user_id)?;

        let key = RunKey::new(user_id, RunId::new());
        self.enqueue(
            PipelineJob::Vision {
                key,
                image_base64: request.image_base64,
            },
            CheckpointUpdate::processing(PipelineStage::Vision),
        )
        .await
    }

    /// Queue script generation for an existing run.
    pub async fn submit_story(&self, request: StoryRequest) -> PipelineResult<Accepted> {
        request.validate()?;
        let user_id = required(request.user_id.as_deref(), "user_id")?;
        let run_id = required(request.run_id.as_deref(), "run_id")?;
        check_id("user_id", user_id)?;
        check_id("run_id", run_id)?;

        let key = RunKey::new(user_id, run_id);
        let initial =
            CheckpointUpdate::processing(PipelineStage::Story).with_drawing(request.drawing.clone());
        self.enqueue(PipelineJob::Story { key, request }, initial)
            .await
    }

    async fn enqueue(&self, job: PipelineJob, initial: CheckpointUpdate) -> PipelineResult<Accepted> {
        let key = job.key().clone();
        let stage = job.first_stage();

        if !self.in_flight.insert(key.clone()) {
            record_rejected("conflict");
            return Err(PipelineError::Conflict(key.to_string()));
        }

        let slot = match self.queue.try_reserve() {
            Ok(slot) => slot,
            Err(e) => {
                self.in_flight.remove(&key);
                return Err(match e {
                    TrySendError::Full(()) => {
                        record_rejected("queue_full");
                        PipelineError::QueueFull
                    }
                    TrySendError::Closed(()) => PipelineError::internal("pipeline executor stopped"),
                });
            }
        };

        if let Err(e) = self.ctx.checkpoints.save(&key, initial).await {
            self.in_flight.remove(&key);
            return Err(e.into());
        }

        info!(
            user_id = %key.user_id,
            run_id = %key.run_id,
            kind = job.kind(),
            "Run queued"
        );
        slot.send(job);

        Ok(Accepted {
            run_id: key.run_id.to_string(),
            status: CheckpointStatus::Processing,
            current_stage: stage.as_str().to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Synchronous stages
    // ------------------------------------------------------------------

    /// Analyze a drawing inline. A run id is always generated.
    ///
    /// Only a successful analysis is checkpointed: a failure returns no run
    /// id, so its record could never be polled.
    pub async fn analyze(&self, request: VisionRequest) -> PipelineResult<VisionResponse> {
        request.validate()?;
        check_optional_id("user_id", request.user_id.as_deref())?;
        let run_id = RunId::new();

        let drawing = stages::analyze(&self.ctx, &request.image_base64).await?;
        if let Some(key) = tracked_key(request.user_id.as_deref(), Some(run_id.as_str())) {
            let update =
                CheckpointUpdate::complete(PipelineStage::Vision).with_drawing(drawing.clone());
            self.save_best_effort(&key, PipelineStage::Vision, update)
                .await;
        }

        Ok(VisionResponse {
            run_id: run_id.to_string(),
            drawing,
        })
    }

    pub async fn script(&self, request: StoryRequest) -> PipelineResult<StoryScript> {
        request.validate()?;
        check_optional_id("user_id", request.user_id.as_deref())?;
        check_optional_id("run_id", request.run_id.as_deref())?;
        let key = tracked_key(request.user_id.as_deref(), request.run_id.as_deref());

        let result = stages::write_story(&self.ctx, &story_prompt(&request)).await;
        self.record_outcome(key.as_ref(), PipelineStage::Story, &result, |story| {
            CheckpointUpdate::complete(PipelineStage::Story)
                .with_drawing(request.drawing.clone())
                .with_story(story.clone())
        })
        .await;
        result
    }

    pub async fn illustrate(&self, request: ImagesRequest) -> PipelineResult<ImageResult> {
        request.validate()?;
        check_optional_id("user_id", request.user_id.as_deref())?;
        check_id("run_id", &request.run_id)?;
        let key = tracked_key(request.user_id.as_deref(), Some(&request.run_id));

        let result = stages::illustrate_scenes(
            &self.ctx,
            &request.story,
            &request.drawing,
            request.style,
            &RunId::from(request.run_id.as_str()),
            request.user_id.as_deref(),
        )
        .await;
        self.record_outcome(key.as_ref(), PipelineStage::Images, &result, |images| {
            CheckpointUpdate::complete(PipelineStage::Images).with_images(images.images.clone())
        })
        .await;
        result
    }

    pub async fn narrate(&self, request: VoiceRequest) -> PipelineResult<AudioResult> {
        request.validate()?;
        check_optional_id("user_id", request.user_id.as_deref())?;
        check_id("run_id", &request.run_id)?;
        let key = tracked_key(request.user_id.as_deref(), Some(&request.run_id));

        let result = stages::narrate_scenes(
            &self.ctx,
            &request.story,
            request.voice_type,
            &RunId::from(request.run_id.as_str()),
            request.user_id.as_deref(),
        )
        .await;
        self.record_outcome(key.as_ref(), PipelineStage::Voice, &result, |audio| {
            CheckpointUpdate::complete(PipelineStage::Voice).with_audio(audio.audio_files.clone())
        })
        .await;
        result
    }

    pub async fn assemble(&self, request: VideoRequest) -> PipelineResult<VideoResult> {
        request.validate()?;
        check_optional_id("user_id", request.user_id.as_deref())?;
        check_id("run_id", &request.run_id)?;
        let key = tracked_key(request.user_id.as_deref(), Some(&request.run_id));

        let result = stages::assemble(
            &self.ctx,
            &request.images,
            &request.audio,
            request.music_track.as_deref(),
            &RunId::from(request.run_id.as_str()),
            request.user_id.as_deref(),
        )
        .await;
        self.record_outcome(key.as_ref(), PipelineStage::Video, &result, |video| {
            CheckpointUpdate::complete(PipelineStage::Video).with_video(video.clone())
        })
        .await;
        result
    }

    /// Best-effort checkpoint for a synchronous stage. Never fails the call.
    async fn record_outcome<T>(
        &self,
        key: Option<&RunKey>,
        stage: PipelineStage,
        result: &PipelineResult<T>,
        on_success: impl FnOnce(&T) -> CheckpointUpdate,
    ) {
        let Some(key) = key else {
            return;
        };
        let update = match result {
            Ok(value) => on_success(value),
            Err(e) => CheckpointUpdate::failed(stage, e.to_string()),
        };
        self.save_best_effort(key, stage, update).await;
    }

    async fn save_best_effort(&self, key: &RunKey, stage: PipelineStage, update: CheckpointUpdate) {
        if let Err(e) = self.ctx.checkpoints.save(key, update).await {
            warn!(
                user_id = %key.user_id,
                run_id = %key.run_id,
                stage = %stage,
                "Checkpoint write failed: {}", e
            );
        }
    }
}

/// Reject ids that are unsafe as file names, key segments or document ids.
pub fn check_id(field: &str, value: &str) -> PipelineResult<()> {
    if !is_valid_id(value) {
        return Err(PipelineError::validation(format!(
            "{field} must be 1-{MAX_ID_LEN} letters, digits, '-' or '_'"
        )));
    }
    Ok(())
}

/// Like [`check_id`], for ids that may be absent or empty.
fn check_optional_id(field: &str, value: Option<&str>) -> PipelineResult<()> {
    match value {
        Some(v) if !v.is_empty() => check_id(field, v),
        _ => Ok(()),
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> PipelineResult<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PipelineError::validation(format!("{field} is required for async processing")))
}

/// Key for checkpointing a synchronous call, when both ids are present.
fn tracked_key(user_id: Option<&str>, run_id: Option<&str>) -> Option<RunKey> {
    match (user_id, run_id) {
        (Some(user), Some(run)) if !user.is_empty() && !run.is_empty() => {
            Some(RunKey::new(user, run))
        }
        _ => None,
    }
}

fn check_story(story: &StoryScript) -> PipelineResult<()> {
    story
        .clone()
        .normalized()
        .validate_numbering()
        .map_err(|e| PipelineError::validation(e.to_string()))
}
