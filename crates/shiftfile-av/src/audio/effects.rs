//! The audio effect chain.
//!
//! Effects run in a fixed order: gain, speed, fade in, fade out, normalize,
//! mono. Each stage sees the stream as the previous stage left it, so fade-out
//! timing is computed on the post-speed timeline and the mono downmix knows
//! how many channels it is folding. Every stage renders to ffmpeg filter
//! expressions; the whole chain becomes one `-af` graph.

use shiftfile_core::config::LoudnessConfig;
use shiftfile_core::{EffectParams, Error, Result};

use crate::probe::AudioInfo;

/// Shape of the stream between two effects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamState {
    pub sample_rate: u32,
    pub channels: u32,
    /// Seconds; `None` when the source did not report a duration.
    pub duration: Option<f64>,
}

impl From<&AudioInfo> for StreamState {
    fn from(info: &AudioInfo) -> Self {
        Self {
            sample_rate: info.sample_rate,
            channels: info.channels,
            duration: info.duration,
        }
    }
}

/// One stage of the chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Gain { db: f64 },
    /// Resample-style speed change: pitch moves with tempo.
    Speed { factor: f64 },
    FadeIn { secs: f64 },
    FadeOut { secs: f64 },
    Normalize { loudness: LoudnessConfig },
    /// Equal-weight downmix of every channel. No-op on mono input.
    Mono,
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gain { .. } => "gain",
            Self::Speed { .. } => "speed",
            Self::FadeIn { .. } => "fade_in",
            Self::FadeOut { .. } => "fade_out",
            Self::Normalize { .. } => "normalize",
            Self::Mono => "mono",
        }
    }

    /// Filter expressions for this stage applied to `input`, and the stream
    /// it hands to the next stage.
    ///
    /// # Errors
    ///
    /// [`Error::Decode`] for a fade-out on a stream of unknown duration.
    pub fn apply(&self, input: StreamState) -> Result<(Vec<String>, StreamState)> {
        let stage = match *self {
            Self::Gain { db } => (vec![format!("volume={}dB", num(db))], input),

            Self::Speed { factor } => {
                let rate = input.sample_rate;
                let shifted = ((f64::from(rate) * factor).round() as u32).max(1);
                // Rounding the rate means the effective factor can differ
                // slightly from the requested one; track the effective one.
                let effective = f64::from(shifted) / f64::from(rate);
                let filters = vec![format!("asetrate={shifted}"), format!("aresample={rate}")];
                let output = StreamState {
                    duration: input.duration.map(|d| d / effective),
                    ..input
                };
                (filters, output)
            }

            Self::FadeIn { secs } => (vec![format!("afade=t=in:st=0:d={}", num(secs))], input),

            Self::FadeOut { secs } => {
                let duration = input.duration.ok_or_else(|| {
                    Error::Decode("could not determine audio duration for fade-out".into())
                })?;
                let length = secs.min(duration);
                let start = (duration - length).max(0.0);
                (
                    vec![format!("afade=t=out:st={}:d={}", num(start), num(length))],
                    input,
                )
            }

            Self::Normalize { loudness } => {
                // loudnorm upsamples to 192 kHz internally; bring it back.
                let filters = vec![
                    format!(
                        "loudnorm=I={}:TP={}:LRA={}",
                        num(loudness.integrated),
                        num(loudness.true_peak),
                        num(loudness.range)
                    ),
                    format!("aresample={}", input.sample_rate),
                ];
                (filters, input)
            }

            Self::Mono if input.channels <= 1 => (Vec::new(), input),

            Self::Mono => {
                let weight = num(1.0 / f64::from(input.channels));
                let terms: Vec<String> = (0..input.channels).map(|c| format!("{weight}*c{c}")).collect();
                let output = StreamState { channels: 1, ..input };
                (vec![format!("pan=mono|c0={}", terms.join("+"))], output)
            }
        };
        Ok(stage)
    }
}

/// The effects `params` asks for, in chain order. Effects that would not
/// change the signal are left out.
pub fn chain(params: &EffectParams, loudness: &LoudnessConfig) -> Vec<Effect> {
    let mut effects = Vec::new();
    if params.is_identity() {
        return effects;
    }
    if params.gain_db != 0.0 {
        effects.push(Effect::Gain { db: params.gain_db });
    }
    if params.speed != 1.0 {
        effects.push(Effect::Speed { factor: params.speed });
    }
    if params.fade_in_secs > 0.0 {
        effects.push(Effect::FadeIn { secs: params.fade_in_secs });
    }
    if params.fade_out_secs > 0.0 {
        effects.push(Effect::FadeOut { secs: params.fade_out_secs });
    }
    if params.normalize {
        effects.push(Effect::Normalize { loudness: *loudness });
    }
    if params.mono {
        effects.push(Effect::Mono);
    }
    effects
}

/// A rendered chain: the filter expressions and the stream they produce.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    pub filters: Vec<String>,
    pub output: StreamState,
}

impl FilterGraph {
    /// Fold `effects` over `source`, threading the stream state through.
    ///
    /// # Errors
    ///
    /// The first error any stage reports.
    pub fn build(effects: &[Effect], source: StreamState) -> Result<Self> {
        let mut filters = Vec::new();
        let mut state = source;
        for effect in effects {
            let (stage, next) = effect.apply(state)?;
            tracing::trace!(effect = effect.name(), filters = ?stage, "effect stage");
            filters.extend(stage);
            state = next;
        }
        Ok(Self { filters, output: state })
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// The `-af` argument, or `None` for a pass-through.
    pub fn to_arg(&self) -> Option<String> {
        (!self.is_empty()).then(|| self.filters.join(","))
    }
}

/// Compact decimal: at most six places, no trailing zeros.
fn num(value: f64) -> String {
    let s = format!("{value:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
