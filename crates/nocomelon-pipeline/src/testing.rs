//! Fakes and fixtures shared by the pipeline tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nocomelon_firestore::{CheckpointStore, FirestoreError, FirestoreResult, MemoryStore};
use nocomelon_genai::{
    DrawingAnalyzer, GenAiError, GenAiResult, Illustrator, Narrator, StoryPrompt, StoryWriter,
};
use nocomelon_media::{MediaError, MediaResult, MediaToolkit};
use nocomelon_models::{
    Checkpoint, CheckpointUpdate, DrawingAnalysis, RunKey, Scene, StoryScript, VoiceType,
};
use nocomelon_storage::{ArtifactStore, StorageConfig};
use tempfile::TempDir;

use crate::config::PipelineConfig;
use crate::context::PipelineContext;

pub(crate) fn drawing() -> DrawingAnalysis {
    DrawingAnalysis {
        subject: "a purple dragon".into(),
        setting: "a sunny meadow".into(),
        details: vec!["big wings".into()],
        mood: "happy".into(),
        colors: vec!["purple".into(), "green".into()],
    }
}

pub(crate) fn story(scenes: u32) -> StoryScript {
    StoryScript::new(
        Some("The Purple Dragon".into()),
        (1..=scenes)
            .map(|number| Scene {
                number,
                text: format!("Scene {number}: the dragon flies over the meadow"),
            })
            .collect(),
    )
}

fn unavailable() -> GenAiError {
    GenAiError::Api {
        provider: "fake",
        status: 503,
        message: "service unavailable".into(),
    }
}

#[derive(Default)]
pub(crate) struct FakeAnalyzer {
    pub fail: AtomicBool,
    last_input: Mutex<Option<String>>,
}

impl FakeAnalyzer {
    pub(crate) fn last_input(&self) -> Option<String> {
        self.last_input.lock().unwrap().clone()
    }
}

#[async_trait]
impl DrawingAnalyzer for FakeAnalyzer {
    async fn analyze(&self, image_base64: &str) -> GenAiResult<DrawingAnalysis> {
        *self.last_input.lock().unwrap() = Some(image_base64.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(drawing())
    }
}

#[derive(Default)]
pub(crate) struct FakeWriter {
    pub fail: AtomicBool,
}

#[async_trait]
impl StoryWriter for FakeWriter {
    async fn write_story(&self, _prompt: &StoryPrompt) -> GenAiResult<StoryScript> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(story(3))
    }
}

#[derive(Default)]
pub(crate) struct FakeIllustrator {
    pub fail: AtomicBool,
    pub panic: AtomicBool,
    prompts: Mutex<Vec<String>>,
}

impl FakeIllustrator {
    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Illustrator for FakeIllustrator {
    async fn illustrate(&self, prompt: &str) -> GenAiResult<Vec<u8>> {
        if self.panic.load(Ordering::SeqCst) {
            panic!("illustrator exploded");
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(b"\x89PNG fake".to_vec())
    }
}

#[derive(Default)]
pub(crate) struct FakeNarrator {
    pub fail: AtomicBool,
}

#[async_trait]
impl Narrator for FakeNarrator {
    async fn narrate(&self, _text: &str, _voice: VoiceType) -> GenAiResult<Vec<u8>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(b"ID3 fake".to_vec())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ToolCall {
    Concat,
    Render { with_music: bool },
    Probe,
    Thumbnail,
}

/// Toolkit that writes placeholder outputs instead of running FFmpeg.
pub(crate) struct FakeToolkit {
    calls: Mutex<Vec<ToolCall>>,
    probe: Mutex<Option<f64>>,
    render_stderr: Mutex<Option<String>>,
    thumbnail_fails: AtomicBool,
    timeline: Mutex<String>,
}

impl Default for FakeToolkit {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            probe: Mutex::new(Some(4.0)),
            render_stderr: Mutex::new(None),
            thumbnail_fails: AtomicBool::new(false),
            timeline: Mutex::new(String::new()),
        }
    }
}

impl FakeToolkit {
    pub(crate) fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Duration reported by probes; `None` makes probing fail.
    pub(crate) fn set_probe(&self, duration: Option<f64>) {
        *self.probe.lock().unwrap() = duration;
    }

    pub(crate) fn fail_render(&self, stderr: &str) {
        *self.render_stderr.lock().unwrap() = Some(stderr.to_string());
    }

    pub(crate) fn fail_thumbnail(&self) {
        self.thumbnail_fails.store(true, Ordering::SeqCst);
    }

    /// Timeline script seen by the last render.
    pub(crate) fn timeline_script(&self) -> String {
        self.timeline.lock().unwrap().clone()
    }

    fn record(&self, call: ToolCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MediaToolkit for FakeToolkit {
    async fn concat_audio(&self, _list_script: &Path, output: &Path) -> MediaResult<()> {
        self.record(ToolCall::Concat);
        tokio::fs::write(output, b"merged").await?;
        Ok(())
    }

    async fn render_slideshow(
        &self,
        timeline_script: &Path,
        _narration: &Path,
        music: Option<&Path>,
        output: &Path,
    ) -> MediaResult<()> {
        self.record(ToolCall::Render {
            with_music: music.is_some(),
        });
        let script = tokio::fs::read_to_string(timeline_script).await?;
        *self.timeline.lock().unwrap() = script;
        let stderr = self.render_stderr.lock().unwrap().clone();
        if let Some(stderr) = stderr {
            return Err(MediaError::ffmpeg_failed("encode failed", Some(stderr), Some(1)));
        }
        tokio::fs::write(output, b"mp4").await?;
        Ok(())
    }

    async fn probe_duration(&self, _path: &Path) -> MediaResult<f64> {
        self.record(ToolCall::Probe);
        let probe = *self.probe.lock().unwrap();
        probe.ok_or_else(|| MediaError::ffprobe_failed("no duration", None))
    }

    async fn extract_thumbnail(&self, _video: &Path, output: &Path) -> MediaResult<()> {
        self.record(ToolCall::Thumbnail);
        if self.thumbnail_fails.load(Ordering::SeqCst) {
            return Err(MediaError::ffmpeg_failed("no frame", None, Some(1)));
        }
        tokio::fs::write(output, b"jpg").await?;
        Ok(())
    }
}

/// Memory store that counts writes and can simulate an outage.
#[derive(Default)]
pub(crate) struct CountingStore {
    inner: MemoryStore,
    saves: AtomicUsize,
    fail: AtomicBool,
}

impl CountingStore {
    pub(crate) fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_writes(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CheckpointStore for CountingStore {
    async fn save(&self, key: &RunKey, update: CheckpointUpdate) -> FirestoreResult<Checkpoint> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(FirestoreError::ServerError(503, "unavailable".into()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(key, update).await
    }

    async fn get(&self, key: &RunKey) -> FirestoreResult<Option<Checkpoint>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &RunKey) -> FirestoreResult<()> {
        self.inner.delete(key).await
    }
}

pub(crate) struct Harness {
    pub ctx: PipelineContext,
    pub store: Arc<CountingStore>,
    pub analyzer: Arc<FakeAnalyzer>,
    pub writer: Arc<FakeWriter>,
    pub illustrator: Arc<FakeIllustrator>,
    pub narrator: Arc<FakeNarrator>,
    pub toolkit: Arc<FakeToolkit>,
    data_dir: TempDir,
    work_dir: TempDir,
}

impl Harness {
    pub(crate) async fn new() -> Self {
        Self::with_config(PipelineConfig::default()).await
    }

    pub(crate) async fn with_parallelism(max_scene_parallel: usize) -> Self {
        Self::with_config(PipelineConfig {
            max_scene_parallel,
            ..PipelineConfig::default()
        })
        .await
    }

    pub(crate) async fn with_config(mut config: PipelineConfig) -> Self {
        let data_dir = TempDir::new().unwrap();
        let work_dir = TempDir::new().unwrap();
        config.work_dir = work_dir.path().to_path_buf();

        let storage = ArtifactStore::new(StorageConfig::local(data_dir.path()))
            .await
            .unwrap();
        let store = Arc::new(CountingStore::default());
        let analyzer = Arc::new(FakeAnalyzer::default());
        let writer = Arc::new(FakeWriter::default());
        let illustrator = Arc::new(FakeIllustrator::default());
        let narrator = Arc::new(FakeNarrator::default());
        let toolkit = Arc::new(FakeToolkit::default());

        let ctx = PipelineContext {
            config,
            storage: Arc::new(storage),
            checkpoints: store.clone(),
            analyzer: analyzer.clone(),
            writer: writer.clone(),
            illustrator: illustrator.clone(),
            narrator: narrator.clone(),
            toolkit: toolkit.clone(),
        };

        Self {
            ctx,
            store,
            analyzer,
            writer,
            illustrator,
            narrator,
            toolkit,
            data_dir,
            work_dir,
        }
    }

    pub(crate) fn data_dir(&self) -> &Path {
        self.data_dir.path()
    }

    pub(crate) fn shared(&self) -> Arc<PipelineContext> {
        Arc::new(self.ctx.clone())
    }

    /// Write a fixture artifact and return its local reference.
    pub(crate) async fn write_artifact(&self, name: &str, bytes: &[u8]) -> String {
        let dir: PathBuf = self.data_dir.path().join("fixtures");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join(name);
        tokio::fs::write(&path, bytes).await.unwrap();
        path.to_string_lossy().to_string()
    }

    pub(crate) fn work_dir_is_empty(&self) -> bool {
        std::fs::read_dir(self.work_dir.path())
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false)
    }
}

/// Poll until the run reaches `complete` or `error`.
pub(crate) async fn wait_for_terminal(store: &dyn CheckpointStore, key: &RunKey) -> Checkpoint {
    for _ in 0..500 {
        if let Some(checkpoint) = store.get(key).await.unwrap() {
            if checkpoint.status.is_terminal() {
                return checkpoint;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run {key} did not finish");
}
