//! Video assembly: ordered scene images and narration into one MP4.
//!
//! Every input is resolved into a run-scoped workspace that is removed when
//! the assembly returns, whatever the outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use nocomelon_media::{file_list_script, MediaToolkit, Timeline};
use nocomelon_models::{AudioResult, GeneratedAudio, GeneratedImage, ImageResult, RunId, VideoResult};
use nocomelon_storage::{ArtifactCategory, ArtifactStore};
use tempfile::TempDir;
use tracing::{info, warn};

use crate::error::{PipelineError, PipelineResult};

const TIMELINE_SCRIPT: &str = "images.txt";
const NARRATION_LIST: &str = "audio.txt";
const NARRATION_FILE: &str = "merged_audio.mp3";

/// Assembles scene artifacts into the final video and thumbnail.
#[derive(Clone)]
pub struct MediaAssembler {
    storage: Arc<ArtifactStore>,
    toolkit: Arc<dyn MediaToolkit>,
    work_root: PathBuf,
}

impl MediaAssembler {
    pub fn new(
        storage: Arc<ArtifactStore>,
        toolkit: Arc<dyn MediaToolkit>,
        work_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            storage,
            toolkit,
            work_root: work_root.into(),
        }
    }

    /// Build the video for one run.
    ///
    /// Images and narration are paired by scene number. Zero scenes or a
    /// mismatch fails before any tool runs.
    pub async fn assemble(
        &self,
        images: &ImageResult,
        audio: &AudioResult,
        music_track: Option<&str>,
        run_id: &RunId,
        user_id: Option<&str>,
    ) -> PipelineResult<VideoResult> {
        let (images, clips) = pair_scenes(images, audio)?;
        let workspace = self.workspace(run_id).await?;
        let dir = workspace.path();

        let mut image_paths = Vec::with_capacity(images.len());
        let mut clip_paths = Vec::with_capacity(clips.len());
        for (index, (image, clip)) in images.iter().zip(&clips).enumerate() {
            let dest = dir.join(local_name("img", index, &image.key, "png"));
            image_paths.push(self.storage.fetch_to(&image.key, &dest).await?);
            let dest = dir.join(local_name("aud", index, &clip.key, "mp3"));
            clip_paths.push(self.storage.fetch_to(&clip.key, &dest).await?);
        }
        let music = match music_track {
            Some(track) => self.resolve_music(track, dir).await,
            None => None,
        };

        let durations: Vec<f64> = clips.iter().map(|c| c.duration_sec).collect();
        let timeline = Timeline::from_scenes(&image_paths, &durations)?;
        let timeline_script = dir.join(TIMELINE_SCRIPT);
        tokio::fs::write(&timeline_script, timeline.to_concat_script()).await?;

        let narration_list = dir.join(NARRATION_LIST);
        tokio::fs::write(&narration_list, file_list_script(&clip_paths)).await?;
        let narration = dir.join(NARRATION_FILE);
        self.toolkit.concat_audio(&narration_list, &narration).await?;

        let video_name = format!("{}_final.mp4", run_id);
        let video_path = dir.join(&video_name);
        self.toolkit
            .render_slideshow(&timeline_script, &narration, music.as_deref(), &video_path)
            .await?;

        let narration_total: f64 = durations.iter().sum();
        let duration_sec = match self.toolkit.probe_duration(&video_path).await {
            Ok(d) if d > 0.0 => d,
            Ok(_) => narration_total,
            Err(e) => {
                warn!(run_id = %run_id, "Probe failed, using narration total: {}", e);
                narration_total
            }
        };

        let thumb_name = format!("{}_thumb.jpg", run_id);
        let thumb_path = dir.join(&thumb_name);
        let thumbnail = match self.toolkit.extract_thumbnail(&video_path, &thumb_path).await {
            Ok(()) => Some(thumb_path),
            Err(e) => {
                warn!(run_id = %run_id, "Thumbnail extraction failed: {}", e);
                None
            }
        };

        let video_key = self
            .storage
            .put_file(&video_path, ArtifactCategory::Videos, user_id, &video_name)
            .await?;
        let thumbnail_key = match thumbnail {
            Some(path) => {
                self.storage
                    .put_file(&path, ArtifactCategory::Videos, user_id, &thumb_name)
                    .await?
            }
            None => video_key.clone(),
        };

        info!(
            run_id = %run_id,
            scenes = images.len(),
            duration_sec,
            video_key = %video_key,
            "Video assembled"
        );

        Ok(VideoResult {
            video_key,
            duration_sec,
            thumbnail_key,
        })
    }

    async fn workspace(&self, run_id: &RunId) -> PipelineResult<TempDir> {
        tokio::fs::create_dir_all(&self.work_root).await?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("assemble_{}_", run_id))
            .tempdir_in(&self.work_root)?;
        Ok(dir)
    }

    async fn resolve_music(&self, track: &str, dir: &Path) -> Option<PathBuf> {
        let dest = dir.join(local_name("music", 0, track, "mp3"));
        match self.storage.fetch_to(track, &dest).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(track = %track, "Music track unavailable, using narration only: {}", e);
                None
            }
        }
    }
}

/// Sort both sides by scene number and check they line up.
fn pair_scenes(
    images: &ImageResult,
    audio: &AudioResult,
) -> PipelineResult<(Vec<GeneratedImage>, Vec<GeneratedAudio>)> {
    if images.images.is_empty() {
        return Err(PipelineError::validation("no scenes to assemble"));
    }
    if images.images.len() != audio.audio_files.len() {
        return Err(PipelineError::validation(format!(
            "{} images but {} narration clips",
            images.images.len(),
            audio.audio_files.len()
        )));
    }

    let mut images = images.images.clone();
    images.sort_by_key(|i| i.scene_number);
    let mut clips = audio.audio_files.clone();
    clips.sort_by_key(|c| c.scene_number);

    if let Some((image, clip)) = images
        .iter()
        .zip(&clips)
        .find(|(i, c)| i.scene_number != c.scene_number)
    {
        return Err(PipelineError::validation(format!(
            "image for scene {} paired with narration for scene {}",
            image.scene_number, clip.scene_number
        )));
    }

    Ok((images, clips))
}

/// Workspace file name keeping the reference's extension when it has one.
fn local_name(prefix: &str, index: usize, reference: &str, default_ext: &str) -> String {
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5)
        .unwrap_or(default_ext);
    format!("{prefix}_{index}.{ext}")
}
