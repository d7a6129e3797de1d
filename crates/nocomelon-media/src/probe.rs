//! FFprobe duration lookup.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Probe the container duration of a media file in seconds.
pub async fn probe_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-print_format",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ffprobe_failed(
            "FFprobe failed",
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
        ));
    }

    parse_duration(&output.stdout)
}

/// Extract `format.duration` from ffprobe JSON output.
fn parse_duration(stdout: &[u8]) -> MediaResult<f64> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Err(MediaError::ffprobe_failed("FFprobe produced no output", None));
    }

    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| MediaError::ffprobe_failed("FFprobe reported no duration", None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        let out = br#"{"format": {"duration": "7.533333"}}"#;
        assert!((parse_duration(out).unwrap() - 7.533333).abs() < 1e-9);
    }

    #[test]
    fn test_parse_duration_empty_output() {
        assert!(parse_duration(b"  \n").is_err());
    }

    #[test]
    fn test_parse_duration_missing_field() {
        assert!(parse_duration(br#"{"format": {}}"#).is_err());
        assert!(parse_duration(br#"{}"#).is_err());
        assert!(parse_duration(br#"{"format": {"duration": "N/A"}}"#).is_err());
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let result = probe_duration("/nonexistent/clip.mp3").await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
