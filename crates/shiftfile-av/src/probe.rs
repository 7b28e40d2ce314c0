//! FFprobe-based audio probing.
//!
//! Shells out to `ffprobe -v error -print_format json -show_format
//! -show_streams` and extracts what the effect chain needs up front: sample
//! rate (for speed changes), channel count (for the mono downmix), and total
//! duration when the container reports one (for fade-out).

use std::path::Path;

use serde::{Deserialize, Serialize};
use shiftfile_core::{Error, Result};

use crate::tools::ToolConfig;

/// Properties of the first audio stream in a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioInfo {
    /// Duration in seconds, if the container reports a positive one.
    pub duration: Option<f64>,
    pub sample_rate: u32,
    pub channels: u32,
    pub codec: String,
}

/// Probe `path` with ffprobe.
///
/// # Errors
///
/// - [`Error::BackendUnavailable`] if ffprobe cannot be started.
/// - [`Error::Decode`] if ffprobe rejects the file or finds no audio stream.
pub async fn probe_audio(ffprobe: &ToolConfig, path: &Path) -> Result<AudioInfo> {
    let mut cmd = ffprobe.command();
    cmd.args([
        "-v", "error",
        "-print_format", "json",
        "-show_format",
        "-show_streams",
    ]);
    cmd.arg(path.to_string_lossy().as_ref());

    let output = cmd.execute().await.map_err(|e| e.into_decode())?;
    parse_ffprobe_json(&output.stdout)
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
    duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn parse_ffprobe_json(json: &str) -> Result<AudioInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::Decode(format!("ffprobe JSON parse error: {e}")))?;

    let stream = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .ok_or_else(|| Error::Decode("no audio stream found".into()))?;

    let sample_rate = stream
        .sample_rate
        .as_deref()
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|&r| r > 0)
        .ok_or_else(|| Error::Decode("audio stream has no sample rate".into()))?;

    let channels = stream
        .channels
        .filter(|&c| c > 0)
        .ok_or_else(|| Error::Decode("audio stream has no channels".into()))?;

    // Stream duration is more precise when present; containers like raw AAC
    // only report it at the format level.
    let duration = parse_secs(stream.duration.as_deref())
        .or_else(|| parse_secs(output.format.as_ref().and_then(|f| f.duration.as_deref())));

    Ok(AudioInfo {
        duration,
        sample_rate,
        channels,
        codec: stream.codec_name.clone().unwrap_or_else(|| "unknown".into()),
    })
}

fn parse_secs(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftfile_core::ErrorKind;

    #[test]
    fn parses_wav_probe() {
        let json = r#"{
            "streams": [{
                "codec_type": "audio",
                "codec_name": "pcm_s16le",
                "sample_rate": "44100",
                "channels": 2,
                "duration": "5.000000"
            }],
            "format": {"duration": "5.000000"}
        }"#;
        let info = parse_ffprobe_json(json).unwrap();
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.duration, Some(5.0));
        assert_eq!(info.codec, "pcm_s16le");
    }

    #[test]
    fn skips_cover_art_stream() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "codec_name": "mjpeg"},
                {"codec_type": "audio", "codec_name": "mp3", "sample_rate": "48000", "channels": 1}
            ],
            "format": {"duration": "12.5"}
        }"#;
        let info = parse_ffprobe_json(json).unwrap();
        assert_eq!(info.codec, "mp3");
        assert_eq!(info.channels, 1);
        assert_eq!(info.duration, Some(12.5));
    }

    #[test]
    fn no_audio_stream_is_decode_error() {
        let json = r#"{"streams": [{"codec_type": "video"}], "format": {}}"#;
        let err = parse_ffprobe_json(json).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeError);
    }

    #[test]
    fn missing_or_zero_duration_is_unknown() {
        let json = r#"{"streams": [{"codec_type": "audio", "sample_rate": "8000", "channels": 1}]}"#;
        assert_eq!(parse_ffprobe_json(json).unwrap().duration, None);

        let json = r#"{
            "streams": [{"codec_type": "audio", "sample_rate": "8000", "channels": 1, "duration": "0.000000"}],
            "format": {"duration": "N/A"}
        }"#;
        assert_eq!(parse_ffprobe_json(json).unwrap().duration, None);
    }

    #[test]
    fn garbage_is_decode_error() {
        let err = parse_ffprobe_json("not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeError);
    }
}
