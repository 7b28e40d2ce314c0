//! Audio effect parameters and their parsing from flat upload fields.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Form field carrying the target format token.
pub const FIELD_FORMAT: &str = "format";
/// Form field carrying the gain in decibels.
pub const FIELD_VOLUME: &str = "volume";
pub const FIELD_SPEED: &str = "speed";
pub const FIELD_FADE_IN: &str = "fadeIn";
pub const FIELD_FADE_OUT: &str = "fadeOut";
pub const FIELD_NORMALIZE: &str = "normalize";
pub const FIELD_MONO: &str = "mono";
pub const FIELD_BITRATE: &str = "bitrate";

const GAIN_RANGE: RangeInclusive<f64> = -60.0..=60.0;
const SPEED_RANGE: RangeInclusive<f64> = 0.1..=10.0;
const FADE_RANGE: RangeInclusive<f64> = 0.0..=3600.0;
const BITRATE_RANGE: RangeInclusive<u32> = 8..=512;

/// Effects requested for an audio conversion. Every field defaults to a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EffectParams {
    /// Additive gain in dB.
    pub gain_db: f64,
    /// Playback speed factor; changes pitch and duration together.
    pub speed: f64,
    pub fade_in_secs: f64,
    pub fade_out_secs: f64,
    pub normalize: bool,
    pub mono: bool,
    /// Target bitrate in kbps; ignored for lossless targets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            gain_db: 0.0,
            speed: 1.0,
            fade_in_secs: 0.0,
            fade_out_secs: 0.0,
            normalize: false,
            mono: false,
            bitrate_kbps: None,
        }
    }
}

impl EffectParams {
    /// Parse and validate effect fields from a flat string map (upload form
    /// fields). Absent fields keep their defaults; blank fields count as absent.
    ///
    /// # Errors
    ///
    /// [`Error::EffectParameter`] for unparseable or out-of-range values.
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self> {
        let field = |name: &str| {
            form.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let mut params = Self::default();
        if let Some(v) = field(FIELD_VOLUME) {
            params.gain_db = parse_number(FIELD_VOLUME, v)?;
        }
        if let Some(v) = field(FIELD_SPEED) {
            params.speed = parse_number(FIELD_SPEED, v)?;
        }
        if let Some(v) = field(FIELD_FADE_IN) {
            params.fade_in_secs = parse_number(FIELD_FADE_IN, v)?;
        }
        if let Some(v) = field(FIELD_FADE_OUT) {
            params.fade_out_secs = parse_number(FIELD_FADE_OUT, v)?;
        }
        if let Some(v) = field(FIELD_NORMALIZE) {
            params.normalize = parse_flag(FIELD_NORMALIZE, v)?;
        }
        if let Some(v) = field(FIELD_MONO) {
            params.mono = parse_flag(FIELD_MONO, v)?;
        }
        if let Some(v) = field(FIELD_BITRATE) {
            params.bitrate_kbps = Some(parse_bitrate(v)?);
        }

        params.validate()?;
        Ok(params)
    }

    /// Reject values outside sane ranges. Nothing is clamped.
    pub fn validate(&self) -> Result<()> {
        check_range(FIELD_VOLUME, self.gain_db, &GAIN_RANGE)?;
        if self.speed <= 0.0 {
            return Err(Error::EffectParameter(format!(
                "{FIELD_SPEED} must be greater than 0, got {}",
                self.speed
            )));
        }
        check_range(FIELD_SPEED, self.speed, &SPEED_RANGE)?;
        check_range(FIELD_FADE_IN, self.fade_in_secs, &FADE_RANGE)?;
        check_range(FIELD_FADE_OUT, self.fade_out_secs, &FADE_RANGE)?;
        if let Some(kbps) = self.bitrate_kbps {
            if !BITRATE_RANGE.contains(&kbps) {
                return Err(Error::EffectParameter(format!(
                    "{FIELD_BITRATE} must be between {}k and {}k, got {kbps}k",
                    BITRATE_RANGE.start(),
                    BITRATE_RANGE.end()
                )));
            }
        }
        Ok(())
    }

    /// True when no effect would change the signal.
    pub fn is_identity(&self) -> bool {
        self.gain_db == 0.0
            && self.speed == 1.0
            && self.fade_in_secs == 0.0
            && self.fade_out_secs == 0.0
            && !self.normalize
            && !self.mono
    }
}

fn check_range(name: &str, value: f64, range: &RangeInclusive<f64>) -> Result<()> {
    if !value.is_finite() || !range.contains(&value) {
        return Err(Error::EffectParameter(format!(
            "{name} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )));
    }
    Ok(())
}

fn parse_number(name: &str, raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|_| Error::EffectParameter(format!("{name} is not a number: '{raw}'")))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::EffectParameter(format!(
            "{name} must be true or false, got '{raw}'"
        ))),
    }
}

/// "192" and "192k" both mean 192 kbps.
fn parse_bitrate(raw: &str) -> Result<u32> {
    let digits = raw
        .strip_suffix('k')
        .or_else(|| raw.strip_suffix('K'))
        .unwrap_or(raw);
    digits
        .parse::<u32>()
        .map_err(|_| Error::EffectParameter(format!("{FIELD_BITRATE} is not a bitrate: '{raw}'")))
}
