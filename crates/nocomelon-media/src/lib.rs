//! FFmpeg CLI wrapper for storybook video assembly.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Concat-demuxer timeline scripts
//! - Duration probing and thumbnail extraction
//! - The [`MediaToolkit`] seam used by the assembler

pub mod command;
pub mod error;
pub mod probe;
pub mod thumbnail;
pub mod timeline;
pub mod toolkit;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::probe_duration;
pub use thumbnail::generate_thumbnail;
pub use timeline::{file_list_script, Timeline, TimelineEntry};
pub use toolkit::{FfmpegToolkit, MediaToolkit};
