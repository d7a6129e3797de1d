//! User-namespaced artifact store.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::artifact::{authorize_key, build_key, ArtifactCategory, ArtifactRef};
use crate::client::{content_type_for, S3Client, S3Config};
use crate::error::{StorageError, StorageResult};
use crate::local::LocalStore;

/// Default expiry for presigned URLs to intermediate artifacts.
pub const DEFAULT_URL_TTL: Duration = Duration::from_secs(3600);

/// Expiry for final video delivery URLs.
pub const DELIVERY_URL_TTL: Duration = Duration::from_secs(86400);

/// Timeout for fetching remote artifacts.
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root of the local artifact directories
    pub data_dir: PathBuf,
    /// Durable backend; local storage only when absent
    pub s3: Option<S3Config>,
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            s3: S3Config::from_env(),
        }
    }

    /// Local-only configuration rooted at `data_dir`.
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            s3: None,
        }
    }
}

/// Artifact store over S3 with a local-directory fallback.
#[derive(Clone)]
pub struct ArtifactStore {
    s3: Option<S3Client>,
    local: LocalStore,
    http: reqwest::Client,
}

impl ArtifactStore {
    /// Create a store from configuration.
    pub async fn new(config: StorageConfig) -> StorageResult<Self> {
        let s3 = match config.s3 {
            Some(s3_config) => Some(S3Client::new(s3_config).await?),
            None => {
                info!(
                    data_dir = %config.data_dir.display(),
                    "S3 not configured, storing artifacts locally"
                );
                None
            }
        };

        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| StorageError::config_error(e.to_string()))?;

        Ok(Self {
            s3,
            local: LocalStore::new(config.data_dir),
            http,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        Self::new(StorageConfig::from_env()).await
    }

    /// Whether a durable backend is configured.
    pub fn is_durable(&self) -> bool {
        self.s3.is_some()
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    fn s3(&self) -> StorageResult<&S3Client> {
        self.s3.as_ref().ok_or_else(StorageError::not_configured)
    }

    /// Store bytes and return the artifact reference.
    pub async fn put_bytes(
        &self,
        data: Vec<u8>,
        category: ArtifactCategory,
        user_id: Option<&str>,
        filename: &str,
    ) -> StorageResult<String> {
        match &self.s3 {
            Some(s3) => {
                let key = build_key(user_id, category, filename)?;
                s3.upload_bytes(data, &key, content_type_for(filename))
                    .await?;
                Ok(key)
            }
            None => {
                let path = self.local.write_bytes(&data, category, filename).await?;
                Ok(path.to_string_lossy().to_string())
            }
        }
    }

    /// Store a file and return the artifact reference.
    ///
    /// Locally the file is moved into its category directory; with S3 it is
    /// uploaded and the source is left in place.
    pub async fn put_file(
        &self,
        path: &Path,
        category: ArtifactCategory,
        user_id: Option<&str>,
        filename: &str,
    ) -> StorageResult<String> {
        match &self.s3 {
            Some(s3) => {
                let key = build_key(user_id, category, filename)?;
                s3.upload_file(path, &key, content_type_for(filename))
                    .await?;
                Ok(key)
            }
            None => {
                let stored = self.local.store_file(path, category, filename).await?;
                Ok(stored.to_string_lossy().to_string())
            }
        }
    }

    /// Time-limited URL for an artifact reference.
    pub async fn access_url(&self, reference: &str, ttl: Duration) -> StorageResult<String> {
        match ArtifactRef::resolve(reference, self.is_durable()).await {
            ArtifactRef::Url(url) => Ok(url.to_string()),
            ArtifactRef::Key(key) => self.s3()?.presign_get(&key, ttl).await,
            ArtifactRef::Local(_) => Err(StorageError::not_configured()),
        }
    }

    /// Presigned URL for a key owned by `user_id`.
    ///
    /// Ownership is checked before the backend is consulted.
    pub async fn presigned_url_for_user(
        &self,
        user_id: &str,
        key: &str,
        ttl: Duration,
    ) -> StorageResult<String> {
        authorize_key(user_id, key)?;
        self.s3()?.presign_get(key, ttl).await
    }

    /// Delete an artifact. Missing artifacts are not an error.
    pub async fn delete(&self, reference: &str) -> StorageResult<()> {
        match ArtifactRef::resolve(reference, self.is_durable()).await {
            ArtifactRef::Url(url) => Err(StorageError::delete_failed(format!(
                "cannot delete external URL {url}"
            ))),
            ArtifactRef::Key(key) => self.s3()?.delete_object(&key).await,
            ArtifactRef::Local(path) => self.local.remove(&path).await,
        }
    }

    /// Make an artifact available as a local file.
    ///
    /// Remote artifacts are downloaded to `dest`; local ones are used in
    /// place. Returns the path to read.
    pub async fn fetch_to(&self, reference: &str, dest: &Path) -> StorageResult<PathBuf> {
        match ArtifactRef::resolve(reference, self.is_durable()).await {
            ArtifactRef::Url(url) => {
                self.download(url.as_str(), dest).await?;
                Ok(dest.to_path_buf())
            }
            ArtifactRef::Key(key) => {
                let url = self.s3()?.presign_get(&key, DEFAULT_URL_TTL).await?;
                self.download(&url, dest).await?;
                Ok(dest.to_path_buf())
            }
            ArtifactRef::Local(path) => {
                if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    return Err(StorageError::not_found(path.to_string_lossy()));
                }
                Ok(tokio::fs::canonicalize(&path).await?)
            }
        }
    }

    async fn download(&self, url: &str, dest: &Path) -> StorageResult<()> {
        debug!(dest = %dest.display(), "Fetching artifact");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::download_failed(format!(
                "GET returned {status}"
            )));
        }
        let bytes = response.bytes().await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }

    /// Check that the backing store is usable.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        match &self.s3 {
            Some(s3) => s3.check_connectivity().await,
            None => self.local.ensure_dirs().await,
        }
    }
}
