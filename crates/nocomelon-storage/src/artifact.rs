//! Artifact keys and references.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{StorageError, StorageResult};

/// Namespace used for artifacts of anonymous requests.
pub const DEFAULT_USER_ID: &str = "test";

/// Kind of artifact, used as the middle segment of a storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactCategory {
    Images,
    Audio,
    Videos,
}

impl ArtifactCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactCategory::Images => "images",
            ArtifactCategory::Audio => "audio",
            ArtifactCategory::Videos => "videos",
        }
    }
}

impl fmt::Display for ArtifactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Maximum length of one key segment.
const MAX_SEGMENT_LEN: usize = 256;

/// Validate a file name used as the last key segment or a local file name.
///
/// Valid format: alphanumeric, hyphens, underscores, dots. No path traversal.
pub fn is_valid_file_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_SEGMENT_LEN {
        return false;
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Validate a user namespace segment.
///
/// Valid format: alphanumeric, hyphens, underscores.
pub fn is_valid_user_segment(user: &str) -> bool {
    !user.is_empty()
        && user.len() <= MAX_SEGMENT_LEN
        && user
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Reject file names that could leave their category directory.
pub fn check_file_name(filename: &str) -> StorageResult<()> {
    if !is_valid_file_name(filename) {
        return Err(StorageError::invalid_key(format!(
            "invalid file name: {filename:?}"
        )));
    }
    Ok(())
}

/// Build a storage key: `{user}/{category}/{filename}`.
pub fn build_key(
    user_id: Option<&str>,
    category: ArtifactCategory,
    filename: &str,
) -> StorageResult<String> {
    let user = match user_id {
        Some(id) if !id.is_empty() => id,
        _ => DEFAULT_USER_ID,
    };
    if !is_valid_user_segment(user) {
        return Err(StorageError::invalid_key(format!("invalid user id: {user:?}")));
    }
    check_file_name(filename)?;
    Ok(format!("{}/{}/{}", user, category, filename))
}

/// Reject keys outside the caller's namespace.
pub fn authorize_key(user_id: &str, key: &str) -> StorageResult<()> {
    if user_id.is_empty() || !key.starts_with(&format!("{}/", user_id)) {
        return Err(StorageError::unauthorized(
            "S3 key does not belong to this user",
        ));
    }
    Ok(())
}

/// A classified artifact reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactRef {
    /// Absolute `http(s)` URL
    Url(Url),
    /// Path on the local filesystem
    Local(PathBuf),
    /// Key in the durable store
    Key(String),
}

impl ArtifactRef {
    /// Classify a reference string.
    ///
    /// `http(s)` URLs win. Otherwise a reference is a durable key only when a
    /// durable store is configured and nothing exists at that path locally.
    pub fn classify(reference: &str, durable: bool, exists_locally: bool) -> Self {
        if let Some(url) = parse_http_url(reference) {
            return ArtifactRef::Url(url);
        }
        if durable && !exists_locally {
            ArtifactRef::Key(reference.to_string())
        } else {
            ArtifactRef::Local(PathBuf::from(reference))
        }
    }

    /// Classify, probing the local filesystem.
    pub async fn resolve(reference: &str, durable: bool) -> Self {
        let exists = if parse_http_url(reference).is_some() {
            false
        } else {
            tokio::fs::try_exists(Path::new(reference))
                .await
                .unwrap_or(false)
        };
        Self::classify(reference, durable, exists)
    }
}

fn parse_http_url(reference: &str) -> Option<Url> {
    Url::parse(reference)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
}
