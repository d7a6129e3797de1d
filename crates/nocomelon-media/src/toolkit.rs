//! Media operations used by storybook assembly.
//!
//! [`MediaToolkit`] is the seam between the assembler and the FFmpeg
//! binaries; [`FfmpegToolkit`] is the production implementation.

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe;
use crate::thumbnail;
use nocomelon_models::encoding::{music_mix_filter, EncodingConfig};

/// Media operations over local files.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Join narration clips listed in a concat script without re-encoding.
    async fn concat_audio(&self, list_script: &Path, output: &Path) -> MediaResult<()>;

    /// Encode the image timeline with narration and optional background music.
    async fn render_slideshow(
        &self,
        timeline_script: &Path,
        narration: &Path,
        music: Option<&Path>,
        output: &Path,
    ) -> MediaResult<()>;

    /// Container duration in seconds.
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64>;

    /// Write a single-frame thumbnail of `video`.
    async fn extract_thumbnail(&self, video: &Path, output: &Path) -> MediaResult<()>;
}

/// Build the lossless narration concat command.
pub fn concat_audio_command(list_script: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .concat_input(list_script)
        .stream_copy()
}

/// Build the slideshow encode command.
///
/// Input 0 is the image timeline, input 1 the narration and input 2 the
/// optional music track.
pub fn slideshow_command(
    timeline_script: &Path,
    narration: &Path,
    music: Option<&Path>,
    output: &Path,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(output)
        .concat_input(timeline_script)
        .input(narration);

    let cmd = match music {
        Some(track) => cmd
            .input(track)
            .filter_complex(music_mix_filter())
            .map("0:v")
            .map("[a]"),
        None => cmd.map("0:v").map("1:a"),
    };

    cmd.output_args(encoding.to_ffmpeg_args())
}

/// FFmpeg-backed toolkit.
#[derive(Debug, Clone, Default)]
pub struct FfmpegToolkit {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
}

impl FfmpegToolkit {
    pub fn new(runner: FfmpegRunner, encoding: EncodingConfig) -> Self {
        Self { runner, encoding }
    }

    pub fn encoding(&self) -> &EncodingConfig {
        &self.encoding
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn concat_audio(&self, list_script: &Path, output: &Path) -> MediaResult<()> {
        debug!(output = %output.display(), "Concatenating narration");
        self.runner
            .run(&concat_audio_command(list_script, output))
            .await
    }

    async fn render_slideshow(
        &self,
        timeline_script: &Path,
        narration: &Path,
        music: Option<&Path>,
        output: &Path,
    ) -> MediaResult<()> {
        debug!(
            output = %output.display(),
            with_music = music.is_some(),
            "Encoding slideshow"
        );
        let cmd = slideshow_command(timeline_script, narration, music, output, &self.encoding);
        self.runner.run(&cmd).await
    }

    async fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        probe::probe_duration(path).await
    }

    async fn extract_thumbnail(&self, video: &Path, output: &Path) -> MediaResult<()> {
        thumbnail::generate_thumbnail(&self.runner, video, output).await
    }
}
