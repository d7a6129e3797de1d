//! Pipeline error types.

use nocomelon_firestore::FirestoreError;
use nocomelon_genai::GenAiError;
use nocomelon_media::MediaError;
use nocomelon_models::PipelineStage;
use nocomelon_storage::StorageError;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{stage} generation failed: {source}")]
    Collaborator {
        stage: PipelineStage,
        #[source]
        source: GenAiError,
    },

    #[error("{tool} failed: {message}")]
    ExternalTool {
        tool: &'static str,
        message: String,
        stderr: Option<String>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Authorization(String),

    #[error("Storage not configured: {0}")]
    StorageConfig(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Checkpoint store error: {0}")]
    Store(#[from] FirestoreError),

    #[error("Run already in progress: {0}")]
    Conflict(String),

    #[error("Pipeline queue is full")]
    QueueFull,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn collaborator(stage: PipelineStage, source: GenAiError) -> Self {
        Self::Collaborator { stage, source }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stderr of a failed external tool, if captured.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ExternalTool { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unauthorized(msg) => Self::Authorization(msg),
            StorageError::NotConfigured(msg) | StorageError::ConfigError(msg) => {
                Self::StorageConfig(msg)
            }
            StorageError::NotFound(msg) => Self::NotFound(msg),
            StorageError::InvalidKey(msg) => Self::Validation(msg),
            other => Self::Storage(other),
        }
    }
}

impl From<MediaError> for PipelineError {
    fn from(err: MediaError) -> Self {
        if err.is_validation() {
            return Self::Validation(err.to_string());
        }
        let stderr = err.stderr().map(str::to_string);
        let tool = match err {
            MediaError::FfprobeNotFound | MediaError::FfprobeFailed { .. } => "ffprobe",
            _ => "ffmpeg",
        };
        Self::ExternalTool {
            tool,
            message: err.to_string(),
            stderr,
        }
    }
}

impl From<validator::ValidationErrors> for PipelineError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(StorageError::Io(err))
    }
}
