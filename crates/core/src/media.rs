//! External conversion capabilities: resolving a source identifier to an
//! audio stream, and transcoding that stream to the fixed output profile.
//!
//! Production implementations shell out to `yt-dlp` and `ffmpeg`.

use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::runtime::{command_for, FFMPEG_BINARY, YT_DLP_BINARY};

/// Resolved audio stream for a source identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStream {
    pub source_id: String,
    /// Title reported by the source, when it reports one.
    pub source_title: Option<String>,
    /// Direct URL (or local path) of the best audio stream.
    pub stream_location: String,
}

/// The single output profile every conversion uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputProfile {
    pub format: &'static str,
    pub codec: &'static str,
    pub bitrate: &'static str,
}

pub const MP3_128K: OutputProfile = OutputProfile {
    format: "mp3",
    codec: "libmp3lame",
    bitrate: "128k",
};

#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch(&self, source_id: &str) -> Result<SourceStream>;
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Write `input` to `output` using `profile`, overwriting any existing file.
    async fn transcode(
        &self,
        input: &SourceStream,
        profile: &OutputProfile,
        output: &Path,
    ) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct YtDlpSource;

impl YtDlpSource {
    pub fn new() -> Self {
        Self
    }

    pub fn build_args(source_id: &str) -> Vec<String> {
        vec![
            "--no-playlist".into(),
            "--no-warnings".into(),
            "-f".into(),
            "bestaudio/best".into(),
            "--get-title".into(),
            "--get-url".into(),
            "--".into(),
            source_id.into(),
        ]
    }
}

#[async_trait]
impl MediaSource for YtDlpSource {
    async fn fetch(&self, source_id: &str) -> Result<SourceStream> {
        let args = Self::build_args(source_id);
        debug!(cmd = %format!("{YT_DLP_BINARY} {}", args.join(" ")), "resolving source");

        let output = command_for(YT_DLP_BINARY)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .context("failed to launch yt-dlp; is it installed?")?;

        for line in String::from_utf8_lossy(&output.stderr).lines() {
            if !line.is_empty() {
                debug!(target: "ytdlp_stderr", "{}", line);
            }
        }

        if !output.status.success() {
            bail!("yt-dlp exited with status {}", output.status);
        }

        parse_ytdlp_output(source_id, &String::from_utf8_lossy(&output.stdout))
    }
}

/// `--get-title --get-url` prints the title line before the URL line.
fn parse_ytdlp_output(source_id: &str, stdout: &str) -> Result<SourceStream> {
    let lines: Vec<&str> = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let Some((stream_location, rest)) = lines.split_last() else {
        bail!("yt-dlp returned no stream for '{source_id}'");
    };

    Ok(SourceStream {
        source_id: source_id.to_string(),
        source_title: rest.first().map(|title| title.to_string()),
        stream_location: stream_location.to_string(),
    })
}

#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder;

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self
    }

    pub fn build_args(input: &SourceStream, profile: &OutputProfile, output: &Path) -> Vec<String> {
        vec![
            "-hide_banner".into(),
            "-nostdin".into(),
            "-y".into(),
            "-i".into(),
            input.stream_location.clone(),
            "-vn".into(),
            "-c:a".into(),
            profile.codec.into(),
            "-b:a".into(),
            profile.bitrate.into(),
            "-f".into(),
            profile.format.into(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &SourceStream,
        profile: &OutputProfile,
        output: &Path,
    ) -> Result<()> {
        let args = Self::build_args(input, profile, output);
        debug!(
            source_id = %input.source_id,
            output = %output.display(),
            bitrate = profile.bitrate,
            "launching FFmpeg transcode"
        );

        let result = command_for(FFMPEG_BINARY)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .output()
            .await
            .context("failed to launch ffmpeg; is it installed?")?;

        for line in String::from_utf8_lossy(&result.stderr).lines() {
            if !line.is_empty() {
                debug!(target: "ffmpeg_stderr", "{}", line);
            }
        }

        if !result.status.success() {
            bail!("ffmpeg exited with status {}", result.status);
        }

        debug!(output = %output.display(), "FFmpeg transcode finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn ytdlp_output_with_title_and_url() {
        let parsed =
            parse_ytdlp_output("src1", "Some Video\nhttps://cdn.example/audio.webm\n").unwrap();
        assert_eq!(parsed.source_title.as_deref(), Some("Some Video"));
        assert_eq!(parsed.stream_location, "https://cdn.example/audio.webm");
        assert_eq!(parsed.source_id, "src1");
    }

    #[test]
    fn ytdlp_output_with_url_only() {
        let parsed = parse_ytdlp_output("src1", "\nhttps://cdn.example/a\n").unwrap();
        assert_eq!(parsed.source_title, None);
        assert_eq!(parsed.stream_location, "https://cdn.example/a");
    }

    #[test]
    fn ytdlp_empty_output_is_an_error() {
        assert!(parse_ytdlp_output("src1", "  \n").is_err());
    }

    #[test]
    fn ytdlp_args_end_with_source_after_separator() {
        let args = YtDlpSource::build_args("-not-a-flag");
        assert_eq!(&args[args.len() - 2..], &["--", "-not-a-flag"]);
    }

    #[test]
    fn ffmpeg_args_use_fixed_profile() {
        let input = SourceStream {
            source_id: "src1".into(),
            source_title: None,
            stream_location: "https://cdn.example/a".into(),
        };
        let output = PathBuf::from("media/Song A/audio.mp3");
        let args = FfmpegTranscoder::build_args(&input, &MP3_128K, &output);

        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert!(args.contains(&"-y".to_string()));
        assert_eq!(args[pos("-i") + 1], "https://cdn.example/a");
        assert_eq!(args[pos("-b:a") + 1], "128k");
        assert_eq!(args[pos("-f") + 1], "mp3");
        assert_eq!(args[pos("-c:a") + 1], "libmp3lame");
        assert_eq!(args.last().unwrap(), &output.to_string_lossy());
    }
}
