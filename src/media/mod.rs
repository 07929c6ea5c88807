//! Media validation ahead of decoding.
//!
//! Probing and transcoding go through [`MediaTool`]; the default
//! [`FfmpegTool`] shells out to `ffprobe` and `ffmpeg`. Every outcome,
//! including size and duration rejections, is reported through
//! [`MediaError`]; use [`MediaError::is_policy_rejection`] to tell the two
//! apart.

mod probe;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::MediaSettings;

pub use probe::ProbeReport;

/// Reasons a media file cannot enter the pipeline.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The file is not a media file `ffprobe` understands.
    #[error("The file is not a valid media file or cannot be processed: {path}: {message}")]
    InvalidMedia { path: PathBuf, message: String },
    /// The file exceeds the size limit.
    #[error("File is too large (over {limit_megabytes}MB)")]
    TooLarge {
        size_megabytes: f64,
        limit_megabytes: f64,
    },
    /// The media exceeds the duration limit.
    #[error("File is too long (over {} minutes)", .limit_seconds / 60.0)]
    TooLong {
        duration_seconds: f64,
        limit_seconds: f64,
    },
    /// Audio extraction from a video container failed.
    #[error("Failed to extract audio from {path}: {message}")]
    Transcode { path: PathBuf, message: String },
    /// An external tool could not be started.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
}

impl MediaError {
    /// True for size/duration rejections, which are expected user-facing outcomes
    /// rather than failures.
    pub fn is_policy_rejection(&self) -> bool {
        matches!(self, Self::TooLarge { .. } | Self::TooLong { .. })
    }
}

/// Probe and transcode backend.
pub trait MediaTool {
    /// Read container metadata without decoding.
    fn probe(&self, path: &Path) -> Result<ProbeReport, MediaError>;

    /// Write the audio of `input` to `output` as mono WAV at `sample_rate`,
    /// overwriting `output`.
    fn extract_audio(&self, input: &Path, output: &Path, sample_rate: u32)
    -> Result<(), MediaError>;
}

/// [`MediaTool`] backed by the `ffprobe` and `ffmpeg` executables.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegTool {
    /// Use the given executables.
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Use the executables named in `settings`.
    pub fn from_settings(settings: &MediaSettings) -> Self {
        Self::new(&settings.ffmpeg_path, &settings.ffprobe_path)
    }
}

impl MediaTool for FfmpegTool {
    fn probe(&self, path: &Path) -> Result<ProbeReport, MediaError> {
        probe::run_ffprobe(&self.ffprobe_path, path)
    }

    fn extract_audio(
        &self,
        input: &Path,
        output: &Path,
        sample_rate: u32,
    ) -> Result<(), MediaError> {
        probe::run_ffmpeg_extract(&self.ffmpeg_path, input, output, sample_rate)
    }
}

/// Size and duration limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaPolicy {
    /// Maximum file size in MiB.
    pub max_file_megabytes: f64,
    /// Maximum duration in seconds.
    pub max_duration_seconds: f64,
    /// Rate of WAV files extracted from video.
    pub transcode_sample_rate: u32,
}

impl MediaPolicy {
    /// Limits from `settings`.
    pub fn from_settings(settings: &MediaSettings) -> Self {
        Self {
            max_file_megabytes: settings.max_file_megabytes,
            max_duration_seconds: settings.max_duration_seconds,
            transcode_sample_rate: settings.transcode_sample_rate,
        }
    }

    /// Reject reports over the limits. Size is checked first.
    pub fn check(&self, report: &ProbeReport) -> Result<(), MediaError> {
        let size_megabytes = report.size_megabytes();
        if size_megabytes > self.max_file_megabytes {
            return Err(MediaError::TooLarge {
                size_megabytes,
                limit_megabytes: self.max_file_megabytes,
            });
        }
        if report.duration_seconds > self.max_duration_seconds {
            return Err(MediaError::TooLong {
                duration_seconds: report.duration_seconds,
                limit_seconds: self.max_duration_seconds,
            });
        }
        Ok(())
    }
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self::from_settings(&MediaSettings::default())
    }
}

/// Validate `path` with `ffprobe`/`ffmpeg` as configured in `settings`.
///
/// Returns the path of a file with an audio stream: `path` itself, or a
/// sibling `.wav` extracted from a video-only container.
pub fn validate_media(path: &Path, settings: &MediaSettings) -> Result<PathBuf, MediaError> {
    validate_media_with(
        &FfmpegTool::from_settings(settings),
        &MediaPolicy::from_settings(settings),
        path,
    )
}

/// [`validate_media`] with an explicit tool and policy.
pub fn validate_media_with(
    tool: &dyn MediaTool,
    policy: &MediaPolicy,
    path: &Path,
) -> Result<PathBuf, MediaError> {
    let report = tool.probe(path)?;
    if let Err(rejection) = policy.check(&report) {
        tracing::warn!("Rejected {}: {rejection}", path.display());
        return Err(rejection);
    }
    if report.has_audio() {
        return Ok(path.to_path_buf());
    }

    let output = path.with_extension("wav");
    if output == path {
        return Err(MediaError::Transcode {
            path: path.to_path_buf(),
            message: "file has no audio stream".to_string(),
        });
    }
    tool.extract_audio(path, &output, policy.transcode_sample_rate)?;
    tracing::info!(
        "Extracted audio from {} into {}",
        path.display(),
        output.display()
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeTool {
        report: Option<ProbeReport>,
        extracted: RefCell<Vec<(PathBuf, PathBuf, u32)>>,
    }

    impl FakeTool {
        fn new(report: Option<ProbeReport>) -> Self {
            Self {
                report,
                extracted: RefCell::new(Vec::new()),
            }
        }
    }

    impl MediaTool for FakeTool {
        fn probe(&self, path: &Path) -> Result<ProbeReport, MediaError> {
            self.report.clone().ok_or_else(|| MediaError::InvalidMedia {
                path: path.to_path_buf(),
                message: "Invalid data found when processing input".into(),
            })
        }

        fn extract_audio(
            &self,
            input: &Path,
            output: &Path,
            sample_rate: u32,
        ) -> Result<(), MediaError> {
            self.extracted
                .borrow_mut()
                .push((input.to_path_buf(), output.to_path_buf(), sample_rate));
            Ok(())
        }
    }

    fn report(size_bytes: u64, duration_seconds: f64, streams: &[&str]) -> ProbeReport {
        ProbeReport {
            duration_seconds,
            size_bytes,
            stream_types: streams.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn oversized_file_is_rejected_with_message() {
        let size = (100.5 * 1024.0 * 1024.0) as u64;
        let tool = FakeTool::new(Some(report(size, 30.0, &["audio"])));
        let err = validate_media_with(&tool, &MediaPolicy::default(), Path::new("big.mp3"))
            .unwrap_err();
        assert!(err.is_policy_rejection());
        assert_eq!(err.to_string(), "File is too large (over 100MB)");
    }

    #[test]
    fn overlong_file_is_rejected_with_message() {
        let tool = FakeTool::new(Some(report(1024, 21.0 * 60.0, &["audio"])));
        let err = validate_media_with(&tool, &MediaPolicy::default(), Path::new("long.flac"))
            .unwrap_err();
        assert!(err.is_policy_rejection());
        assert_eq!(err.to_string(), "File is too long (over 20 minutes)");
    }

    #[test]
    fn size_is_checked_before_duration() {
        let tool = FakeTool::new(Some(report(200 * 1024 * 1024, 3_600.0, &["audio"])));
        let err = validate_media_with(&tool, &MediaPolicy::default(), Path::new("x.wav"))
            .unwrap_err();
        assert!(matches!(err, MediaError::TooLarge { .. }));
    }

    #[test]
    fn limits_are_inclusive() {
        let tool = FakeTool::new(Some(report(100 * 1024 * 1024, 1_200.0, &["audio"])));
        let path = validate_media_with(&tool, &MediaPolicy::default(), Path::new("edge.ogg"))
            .unwrap();
        assert_eq!(path, PathBuf::from("edge.ogg"));
    }

    #[test]
    fn audio_file_is_returned_unchanged() {
        let tool = FakeTool::new(Some(report(4_096, 12.0, &["video", "audio"])));
        let path = validate_media_with(&tool, &MediaPolicy::default(), Path::new("a/song.mp4"))
            .unwrap();
        assert_eq!(path, PathBuf::from("a/song.mp4"));
        assert!(tool.extracted.borrow().is_empty());
    }

    #[test]
    fn video_without_audio_is_extracted_to_sibling_wav() {
        let tool = FakeTool::new(Some(report(4_096, 12.0, &["video"])));
        let path = validate_media_with(&tool, &MediaPolicy::default(), Path::new("clips/video.mp4"))
            .unwrap();
        assert_eq!(path, PathBuf::from("clips/video.wav"));
        assert_eq!(
            tool.extracted.borrow().as_slice(),
            &[(
                PathBuf::from("clips/video.mp4"),
                PathBuf::from("clips/video.wav"),
                16_000
            )]
        );
    }

    #[test]
    fn unreadable_file_is_invalid_media() {
        let tool = FakeTool::new(None);
        let err = validate_media_with(&tool, &MediaPolicy::default(), Path::new("notes.txt"))
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidMedia { .. }));
        assert!(!err.is_policy_rejection());
    }

    #[test]
    fn missing_ffprobe_binary_is_a_spawn_error() {
        let tool = FfmpegTool::new("ffmpeg", "/nonexistent/bin/ffprobe-missing");
        let err = tool.probe(Path::new("anything.mp3")).unwrap_err();
        assert!(matches!(err, MediaError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn failing_ffprobe_is_invalid_media() {
        let tool = FfmpegTool::new("ffmpeg", "false");
        let err = tool.probe(Path::new("anything.mp3")).unwrap_err();
        assert!(matches!(err, MediaError::InvalidMedia { .. }));
        assert!(!err.is_policy_rejection());
    }

    #[cfg(unix)]
    #[test]
    fn empty_ffprobe_output_is_invalid_media() {
        let tool = FfmpegTool::new("ffmpeg", "true");
        let err = tool.probe(Path::new("anything.mp3")).unwrap_err();
        match err {
            MediaError::InvalidMedia { message, .. } => {
                assert!(message.starts_with("unreadable probe output"), "{message}")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn failing_ffprobe_rejects_validation() {
        let settings = MediaSettings {
            ffprobe_path: "false".into(),
            ..MediaSettings::default()
        };
        let err = validate_media(Path::new("anything.mp3"), &settings).unwrap_err();
        assert!(matches!(err, MediaError::InvalidMedia { .. }));
    }
}
