//! Artifact storage for the storybook pipeline.
//!
//! This crate provides:
//! - S3 upload, presigned URL generation and deletion
//! - A local-directory fallback when no bucket is configured
//! - Uniform classification of artifact references (URL, local path, key)
//! - Per-user key namespacing and access checks

pub mod artifact;
pub mod client;
pub mod error;
pub mod local;
pub mod store;

pub use artifact::{
    authorize_key, build_key, check_file_name, is_valid_file_name, ArtifactCategory, ArtifactRef,
    DEFAULT_USER_ID,
};
pub use client::{S3Client, S3Config};
pub use error::{StorageError, StorageResult};
pub use local::LocalStore;
pub use store::{ArtifactStore, StorageConfig, DEFAULT_URL_TTL, DELIVERY_URL_TTL};
