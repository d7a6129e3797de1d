//! The five generation stages.
//!
//! Each stage calls one collaborator, persists what it produced and returns
//! the artifact references. Checkpoint writes belong to the controller.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use nocomelon_genai::{prompts, StoryPrompt};
use nocomelon_models::{
    AudioResult, DrawingAnalysis, GeneratedAudio, GeneratedImage, ImageResult, PipelineStage,
    RunId, Scene, StoryScript, Style, VideoResult, VoiceType,
};
use nocomelon_storage::ArtifactCategory;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::record_stage;

/// Narration pace used when a clip cannot be probed.
const WORDS_PER_MINUTE: f64 = 150.0;

async fn timed<T, F>(stage: PipelineStage, fut: F) -> PipelineResult<T>
where
    F: Future<Output = PipelineResult<T>>,
{
    let start = Instant::now();
    let result = fut.await;
    record_stage(stage, result.is_ok(), start.elapsed());
    result
}

/// Strip a `data:image/...;base64,` prefix if present.
pub fn strip_data_url(image: &str) -> &str {
    match image.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => image,
    }
}

/// Estimated narration length of `text` in seconds.
pub fn estimate_duration(text: &str) -> f64 {
    let words = text.split_whitespace().count() as f64;
    words / WORDS_PER_MINUTE * 60.0
}

/// Bounds how many scenes of one run call a collaborator at once.
///
/// Results are collected in scene order regardless of completion order.
fn scene_limit(ctx: &PipelineContext) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(ctx.config.max_scene_parallel.max(1)))
}

/// Scenes in canonical order. Fails on an empty or gapped story.
fn ordered_scenes(story: &StoryScript) -> PipelineResult<Vec<Scene>> {
    let story = story.clone().normalized();
    story
        .validate_numbering()
        .map_err(|e| PipelineError::validation(e.to_string()))?;
    Ok(story.scenes)
}

pub async fn analyze(ctx: &PipelineContext, image: &str) -> PipelineResult<DrawingAnalysis> {
    timed(PipelineStage::Vision, async {
        let payload = strip_data_url(image);
        if payload.trim().is_empty() {
            return Err(PipelineError::validation("image_base64 must not be empty"));
        }
        ctx.analyzer
            .analyze(payload)
            .await
            .map_err(|e| PipelineError::collaborator(PipelineStage::Vision, e))
    })
    .await
}

pub async fn write_story(ctx: &PipelineContext, prompt: &StoryPrompt) -> PipelineResult<StoryScript> {
    timed(PipelineStage::Story, async {
        let story = ctx
            .writer
            .write_story(prompt)
            .await
            .map_err(|e| PipelineError::collaborator(PipelineStage::Story, e))?;
        debug!(scenes = story.scenes.len(), "Story written");
        Ok(story)
    })
    .await
}

/// Illustrate every scene, in scene order.
pub async fn illustrate_scenes(
    ctx: &PipelineContext,
    story: &StoryScript,
    drawing: &DrawingAnalysis,
    style: Style,
    run_id: &RunId,
    user_id: Option<&str>,
) -> PipelineResult<ImageResult> {
    timed(PipelineStage::Images, async {
        let scenes = ordered_scenes(story)?;
        let limit = scene_limit(ctx);

        let futures: Vec<_> = scenes
            .into_iter()
            .map(|scene| {
                let ctx = ctx.clone();
                let drawing = drawing.clone();
                let run_id = run_id.clone();
                let user_id = user_id.map(str::to_string);
                let limit = Arc::clone(&limit);

                async move {
                    let _permit = limit
                        .acquire_owned()
                        .await
                        .map_err(|_| PipelineError::internal("scene limiter closed"))?;
                    illustrate_scene(&ctx, &scene, &drawing, style, &run_id, user_id.as_deref())
                        .await
                }
            })
            .collect();

        let images = join_all(futures)
            .await
            .into_iter()
            .collect::<PipelineResult<Vec<GeneratedImage>>>()?;

        Ok(ImageResult { images })
    })
    .await
}

async fn illustrate_scene(
    ctx: &PipelineContext,
    scene: &Scene,
    drawing: &DrawingAnalysis,
    style: Style,
    run_id: &RunId,
    user_id: Option<&str>,
) -> PipelineResult<GeneratedImage> {
    let prompt = prompts::image_prompt(scene, drawing, style);
    let bytes = ctx
        .illustrator
        .illustrate(&prompt)
        .await
        .map_err(|e| PipelineError::collaborator(PipelineStage::Images, e))?;

    let filename = format!("{}_scene_{}.png", run_id, scene.number);
    let key = ctx
        .storage
        .put_bytes(bytes, ArtifactCategory::Images, user_id, &filename)
        .await?;
    debug!(scene = scene.number, key = %key, "Scene illustrated");

    Ok(GeneratedImage {
        scene_number: scene.number,
        key,
    })
}

/// Narrate every scene, in scene order.
pub async fn narrate_scenes(
    ctx: &PipelineContext,
    story: &StoryScript,
    voice: VoiceType,
    run_id: &RunId,
    user_id: Option<&str>,
) -> PipelineResult<AudioResult> {
    timed(PipelineStage::Voice, async {
        let scenes = ordered_scenes(story)?;
        let limit = scene_limit(ctx);

        let futures: Vec<_> = scenes
            .into_iter()
            .map(|scene| {
                let ctx = ctx.clone();
                let run_id = run_id.clone();
                let user_id = user_id.map(str::to_string);
                let limit = Arc::clone(&limit);

                async move {
                    let _permit = limit
                        .acquire_owned()
                        .await
                        .map_err(|_| PipelineError::internal("scene limiter closed"))?;
                    narrate_scene(&ctx, &scene, voice, &run_id, user_id.as_deref()).await
                }
            })
            .collect();

        let clips = join_all(futures)
            .await
            .into_iter()
            .collect::<PipelineResult<Vec<GeneratedAudio>>>()?;

        Ok(AudioResult::new(clips))
    })
    .await
}

async fn narrate_scene(
    ctx: &PipelineContext,
    scene: &Scene,
    voice: VoiceType,
    run_id: &RunId,
    user_id: Option<&str>,
) -> PipelineResult<GeneratedAudio> {
    let bytes = ctx
        .narrator
        .narrate(&scene.text, voice)
        .await
        .map_err(|e| PipelineError::collaborator(PipelineStage::Voice, e))?;

    let duration_sec = clip_duration(ctx, &bytes, &scene.text).await;

    let filename = format!("{}_scene_{}.mp3", run_id, scene.number);
    let key = ctx
        .storage
        .put_bytes(bytes, ArtifactCategory::Audio, user_id, &filename)
        .await?;
    debug!(scene = scene.number, duration_sec, key = %key, "Scene narrated");

    Ok(GeneratedAudio {
        scene_number: scene.number,
        key,
        duration_sec,
    })
}

/// Probe a narration clip, falling back to a word-count estimate.
async fn clip_duration(ctx: &PipelineContext, bytes: &[u8], text: &str) -> f64 {
    match probe_bytes(ctx, bytes).await {
        Ok(duration) if duration > 0.0 => duration,
        Ok(_) => estimate_duration(text),
        Err(e) => {
            warn!("Narration probe failed, estimating duration: {}", e);
            estimate_duration(text)
        }
    }
}

async fn probe_bytes(ctx: &PipelineContext, bytes: &[u8]) -> PipelineResult<f64> {
    let work_dir: &Path = &ctx.config.work_dir;
    tokio::fs::create_dir_all(work_dir).await?;
    let clip = tempfile::Builder::new()
        .prefix("narration_")
        .suffix(".mp3")
        .tempfile_in(work_dir)?;
    tokio::fs::write(clip.path(), bytes).await?;
    Ok(ctx.toolkit.probe_duration(clip.path()).await?)
}

/// Assemble the final video.
pub async fn assemble(
    ctx: &PipelineContext,
    images: &ImageResult,
    audio: &AudioResult,
    music_track: Option<&str>,
    run_id: &RunId,
    user_id: Option<&str>,
) -> PipelineResult<VideoResult> {
    timed(
        PipelineStage::Video,
        ctx.assembler()
            .assemble(images, audio, music_track, run_id, user_id),
    )
    .await
}
