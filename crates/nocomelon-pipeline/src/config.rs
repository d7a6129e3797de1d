//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Runs executing at once
    pub workers: usize,
    /// Submitted runs waiting for a worker
    pub queue_capacity: usize,
    /// Scenes generated concurrently within one run; 1 keeps them sequential
    pub max_scene_parallel: usize,
    /// Kill FFmpeg after this many seconds
    pub ffmpeg_timeout_secs: Option<u64>,
    /// Parent directory for per-assembly workspaces
    pub work_dir: PathBuf,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 64,
            max_scene_parallel: 1,
            ffmpeg_timeout_secs: None,
            work_dir: std::env::temp_dir(),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            workers: env_parse("PIPELINE_WORKERS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.workers),
            queue_capacity: env_parse("PIPELINE_QUEUE_CAPACITY")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.queue_capacity),
            max_scene_parallel: env_parse("PIPELINE_MAX_SCENE_PARALLEL")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_scene_parallel),
            ffmpeg_timeout_secs: env_parse("FFMPEG_TIMEOUT_SECS"),
            work_dir: std::env::var("PIPELINE_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            shutdown_timeout: Duration::from_secs(
                env_parse("PIPELINE_SHUTDOWN_TIMEOUT_SECS").unwrap_or(30),
            ),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
