//! Thumbnail generation.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use nocomelon_models::encoding::{thumbnail_scale_filter, THUMBNAIL_TIMESTAMP};

/// Build the command grabbing one scaled frame from a video.
pub fn thumbnail_command(video_path: &Path, output_path: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output_path)
        .input(video_path)
        .seek_output(THUMBNAIL_TIMESTAMP)
        .single_frame()
        .video_filter(thumbnail_scale_filter())
}

/// Generate a thumbnail from a video file.
pub async fn generate_thumbnail(
    runner: &FfmpegRunner,
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let cmd = thumbnail_command(video_path.as_ref(), output_path.as_ref());
    runner.run(&cmd).await
}
