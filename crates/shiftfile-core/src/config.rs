//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON. Every section
//! defaults sensibly so a completely empty `{}` file is valid. The loaded
//! value is read-only for the life of the process and shared across
//! concurrent conversions.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub scratch: ScratchConfig,
    pub image: ImageConfig,
    pub audio: AudioConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    ///
    /// This is intentionally string-based so the caller can read the file
    /// however it sees fit.
    pub fn from_json(json_str: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json_str)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.tools.timeout_secs == 0 {
            warnings.push("tools.timeout_secs is 0; every external tool call will time out".into());
        }

        for (name, path) in [
            ("ffmpeg_path", &self.tools.ffmpeg_path),
            ("ffprobe_path", &self.tools.ffprobe_path),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!(
                        "tools.{name} {} does not exist; falling back to PATH",
                        p.display()
                    ));
                }
            }
        }

        if self.image.max_dimension < 32 {
            warnings.push(format!(
                "image.max_dimension {} is smaller than an icon",
                self.image.max_dimension
            ));
        }

        if !(8..=512).contains(&self.audio.default_bitrate_kbps) {
            warnings.push(format!(
                "audio.default_bitrate_kbps {} is outside 8..=512",
                self.audio.default_bitrate_kbps
            ));
        }

        let l = &self.audio.loudness;
        if !(-70.0..=-5.0).contains(&l.integrated) {
            warnings.push(format!("audio.loudness.integrated {} is outside -70..=-5", l.integrated));
        }
        if !(-9.0..=0.0).contains(&l.true_peak) {
            warnings.push(format!("audio.loudness.true_peak {} is outside -9..=0", l.true_peak));
        }
        if !(1.0..=50.0).contains(&l.range) {
            warnings.push(format!("audio.loudness.range {} is outside 1..=50", l.range));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Paths to external CLI tools and how long they may run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            timeout_secs: 300,
        }
    }
}

/// Where request-scoped scratch files are created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchConfig {
    pub dir: PathBuf,
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("shiftfile"),
        }
    }
}

/// Image transcoding limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Longest edge allowed before the image is downscaled.
    pub max_dimension: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self { max_dimension: 8000 }
    }
}

/// Audio encoding defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Bitrate used for lossy targets when the request names none.
    pub default_bitrate_kbps: u32,
    pub loudness: LoudnessConfig,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            default_bitrate_kbps: 192,
            loudness: LoudnessConfig::default(),
        }
    }
}

/// EBU R128 targets used by the normalize effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoudnessConfig {
    /// Integrated loudness target, LUFS.
    pub integrated: f64,
    /// Maximum true peak, dBTP.
    pub true_peak: f64,
    /// Loudness range target, LU.
    pub range: f64,
}

impl Default for LoudnessConfig {
    fn default() -> Self {
        Self {
            integrated: -16.0,
            true_peak: -1.5,
            range: 11.0,
        }
    }
}
