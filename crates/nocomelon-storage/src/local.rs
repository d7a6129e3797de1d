//! Local-directory artifact storage for development without S3.
//!
//! Artifacts live in one directory per category under the data dir and are
//! referenced by their path.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::artifact::{check_file_name, ArtifactCategory};
use crate::error::StorageResult;

/// Local artifact directories.
#[derive(Debug, Clone)]
pub struct LocalStore {
    data_dir: PathBuf,
}

impl LocalStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding one category.
    pub fn dir(&self, category: ArtifactCategory) -> PathBuf {
        self.data_dir.join(category.as_str())
    }

    /// Create the data dir and every category directory.
    pub async fn ensure_dirs(&self) -> StorageResult<()> {
        for category in [
            ArtifactCategory::Images,
            ArtifactCategory::Audio,
            ArtifactCategory::Videos,
        ] {
            fs::create_dir_all(self.dir(category)).await?;
        }
        Ok(())
    }

    /// Write bytes and return the artifact path.
    pub async fn write_bytes(
        &self,
        data: &[u8],
        category: ArtifactCategory,
        filename: &str,
    ) -> StorageResult<PathBuf> {
        check_file_name(filename)?;
        let dir = self.dir(category);
        fs::create_dir_all(&dir).await?;
        let path = dir.join(filename);
        fs::write(&path, data).await?;
        Ok(path)
    }

    /// Move a file into a category directory and return its new path.
    pub async fn store_file(
        &self,
        src: &Path,
        category: ArtifactCategory,
        filename: &str,
    ) -> StorageResult<PathBuf> {
        check_file_name(filename)?;
        let dst = self.dir(category).join(filename);
        move_file(src, &dst).await?;
        Ok(dst)
    }

    /// Remove an artifact. Missing files are ignored.
    pub async fn remove(&self, path: &Path) -> StorageResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// Tries a rename first and falls back to copy-and-delete on EXDEV, which is
/// what happens when the temp workspace and the data dir sit on different
/// filesystems.
pub async fn move_file(src: &Path, dst: &Path) -> StorageResult<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

/// Copy to a sibling temp file, rename into place, then delete the source.
async fn copy_and_delete(src: &Path, dst: &Path) -> StorageResult<()> {
    let tmp_dst = dst.with_extension("tmp");

    fs::copy(src, &tmp_dst).await?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_bytes_lands_in_category_dir() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        let path = store
            .write_bytes(b"png", ArtifactCategory::Images, "r1_scene_1.png")
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("images").join("r1_scene_1.png"));
        assert_eq!(fs::read(&path).await.unwrap(), b"png");
    }

    #[tokio::test]
    async fn test_write_bytes_refuses_to_leave_data_dir() {
        let root = TempDir::new().unwrap();
        let data_dir = root.path().join("data");
        let store = LocalStore::new(&data_dir);

        let err = store
            .write_bytes(b"png", ArtifactCategory::Images, "../../escaped_scene_1.png")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::InvalidKey(_)));
        assert!(!root.path().join("escaped_scene_1.png").exists());
        assert!(!data_dir.join("escaped_scene_1.png").exists());
    }

    #[tokio::test]
    async fn test_store_file_moves_source() {
        let dir = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        let src = work.path().join("out.mp4");
        fs::write(&src, b"video").await.unwrap();

        let dst = store
            .store_file(&src, ArtifactCategory::Videos, "r1_final.mp4")
            .await
            .unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"video");
    }

    #[tokio::test]
    async fn test_move_file_overwrites_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.txt");
        let dst = dir.path().join("dest.txt");

        fs::write(&src, b"new content").await.unwrap();
        fs::write(&dst, b"old content").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "new content");
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        let path = store
            .write_bytes(b"x", ArtifactCategory::Audio, "a.mp3")
            .await
            .unwrap();

        store.remove(&path).await.unwrap();
        store.remove(&path).await.unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_is_cross_device_error() {
        assert!(is_cross_device_error(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device_error(&std::io::Error::from_raw_os_error(2)));
    }
}
