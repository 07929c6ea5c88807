use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use super::MediaError;

/// Container metadata for one media file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeReport {
    /// Container duration in seconds (0 when unknown).
    pub duration_seconds: f64,
    /// File size in bytes (0 when unknown).
    pub size_bytes: u64,
    /// `codec_type` of every stream, in container order.
    pub stream_types: Vec<String>,
}

impl ProbeReport {
    /// Size in MiB.
    pub fn size_megabytes(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    /// True when at least one stream carries audio.
    pub fn has_audio(&self) -> bool {
        self.stream_types.iter().any(|kind| kind == "audio")
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
}

/// Parse the JSON printed by `ffprobe -print_format json -show_format -show_streams`.
pub(crate) fn parse_ffprobe_json(json: &[u8]) -> Result<ProbeReport, serde_json::Error> {
    let output: FfprobeOutput = serde_json::from_slice(json)?;
    let duration_seconds = output
        .format
        .duration
        .as_deref()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(0.0);
    let size_bytes = output
        .format
        .size
        .as_deref()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0);
    Ok(ProbeReport {
        duration_seconds,
        size_bytes,
        stream_types: output
            .streams
            .into_iter()
            .filter_map(|stream| stream.codec_type)
            .collect(),
    })
}

pub(super) fn run_ffprobe(ffprobe: &str, path: &Path) -> Result<ProbeReport, MediaError> {
    let output = Command::new(ffprobe)
        .arg("-v")
        .arg("error")
        .arg("-print_format")
        .arg("json")
        .arg("-show_format")
        .arg("-show_streams")
        .arg(path)
        .output()
        .map_err(|source| MediaError::Spawn {
            program: ffprobe.to_string(),
            source,
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::InvalidMedia {
            path: path.to_path_buf(),
            message: stderr.trim().to_string(),
        });
    }
    parse_ffprobe_json(&output.stdout).map_err(|err| MediaError::InvalidMedia {
        path: path.to_path_buf(),
        message: format!("unreadable probe output: {err}"),
    })
}

pub(super) fn run_ffmpeg_extract(
    ffmpeg: &str,
    input: &Path,
    output: &Path,
    sample_rate: u32,
) -> Result<(), MediaError> {
    let result = Command::new(ffmpeg)
        .arg("-y")
        .arg("-hide_banner")
        .arg("-loglevel")
        .arg("error")
        .arg("-i")
        .arg(input)
        .arg("-vn")
        .arg("-ac")
        .arg("1")
        .arg("-ar")
        .arg(sample_rate.to_string())
        .arg("-f")
        .arg("wav")
        .arg(output)
        .output()
        .map_err(|source| MediaError::Spawn {
            program: ffmpeg.to_string(),
            source,
        })?;
    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(MediaError::Transcode {
            path: input.to_path_buf(),
            message: stderr.trim().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_format_and_stream_types() {
        let json = br#"{
            "streams": [
                {"index": 0, "codec_type": "video", "codec_name": "h264"},
                {"index": 1, "codec_type": "audio", "codec_name": "aac"}
            ],
            "format": {"filename": "clip.mp4", "duration": "61.500000", "size": "2097152"}
        }"#;
        let report = parse_ffprobe_json(json).unwrap();
        assert_eq!(report.duration_seconds, 61.5);
        assert_eq!(report.size_bytes, 2_097_152);
        assert_eq!(report.size_megabytes(), 2.0);
        assert_eq!(report.stream_types, vec!["video", "audio"]);
        assert!(report.has_audio());
    }

    #[test]
    fn missing_fields_count_as_zero() {
        let report = parse_ffprobe_json(br#"{"format": {"duration": "N/A"}}"#).unwrap();
        assert_eq!(report, ProbeReport::default());
        assert!(!report.has_audio());
    }

    #[test]
    fn non_json_output_is_rejected() {
        assert!(parse_ffprobe_json(b"moov atom not found").is_err());
    }
}
