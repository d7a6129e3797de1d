//! Concat-demuxer scripts for slideshow timelines.
//!
//! The concat demuxer ignores the `duration` of the final entry, so a
//! timeline of N scenes lists N+1 files: every image with its narration
//! duration, then the last image once more without one.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{MediaError, MediaResult};

/// One line pair in a concat script.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub path: PathBuf,
    pub duration: Option<f64>,
}

/// Image timeline for the video track.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    /// Pair each image with its scene's narration duration.
    ///
    /// Fails on zero scenes or when the two lists differ in length.
    pub fn from_scenes(images: &[PathBuf], durations: &[f64]) -> MediaResult<Self> {
        if images.is_empty() {
            return Err(MediaError::invalid_timeline("no scenes to assemble"));
        }
        if images.len() != durations.len() {
            return Err(MediaError::invalid_timeline(format!(
                "{} images but {} narration clips",
                images.len(),
                durations.len()
            )));
        }
        if let Some(bad) = durations.iter().find(|d| !d.is_finite() || **d < 0.0) {
            return Err(MediaError::invalid_timeline(format!(
                "invalid scene duration {bad}"
            )));
        }

        let mut entries: Vec<TimelineEntry> = images
            .iter()
            .zip(durations)
            .map(|(path, duration)| TimelineEntry {
                path: path.clone(),
                duration: Some(*duration),
            })
            .collect();

        if let Some(last) = images.last() {
            entries.push(TimelineEntry {
                path: last.clone(),
                duration: None,
            });
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    /// Total displayed duration.
    pub fn total_duration(&self) -> f64 {
        self.entries.iter().filter_map(|e| e.duration).sum()
    }

    /// Render as a concat-demuxer script.
    pub fn to_concat_script(&self) -> String {
        let mut script = String::new();
        for entry in &self.entries {
            let _ = writeln!(script, "file {}", quote_path(&entry.path));
            if let Some(duration) = entry.duration {
                let _ = writeln!(script, "duration {duration}");
            }
        }
        script
    }
}

/// Concat-demuxer script listing files back to back.
pub fn file_list_script(paths: &[PathBuf]) -> String {
    let mut script = String::new();
    for path in paths {
        let _ = writeln!(script, "file {}", quote_path(path));
    }
    script
}

/// Single-quote a path for a concat script.
fn quote_path(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}
