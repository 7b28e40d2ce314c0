//! Audio conversion: probe the source, render the effect chain, run ffmpeg.

pub mod effects;

use std::path::Path;

use shiftfile_core::config::AudioConfig;
use shiftfile_core::{AudioFormat, EffectParams, Result};

use crate::probe::probe_audio;
use crate::tools::ToolRegistry;

pub use effects::{chain, Effect, FilterGraph, StreamState};

/// Apply `params` to the audio at `input` and encode it as `format` at
/// `output`. Returns the shape of the stream that was written.
///
/// Parameters are validated before anything runs. The input is probed first
/// so that fades and speed changes know the real duration and sample rate.
///
/// # Errors
///
/// - [`shiftfile_core::Error::EffectParameter`] for out-of-range parameters.
/// - [`shiftfile_core::Error::BackendUnavailable`] if ffmpeg or ffprobe is
///   missing.
/// - [`shiftfile_core::Error::Decode`] if ffprobe cannot read the input, or a
///   fade-out is requested on input of unknown duration.
/// - [`shiftfile_core::Error::Encode`] if ffmpeg fails or times out.
pub async fn process(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    format: AudioFormat,
    params: &EffectParams,
    config: &AudioConfig,
) -> Result<StreamState> {
    params.validate()?;
    let ffprobe = tools.require("ffprobe")?;
    let ffmpeg = tools.require("ffmpeg")?;

    let info = probe_audio(ffprobe, input).await?;
    tracing::debug!(
        duration = ?info.duration,
        sample_rate = info.sample_rate,
        channels = info.channels,
        codec = %info.codec,
        "probed audio input"
    );

    let effects = chain(params, &config.loudness);
    let graph = FilterGraph::build(&effects, StreamState::from(&info))?;
    let bitrate = effective_bitrate(format, params, config);

    let mut cmd = ffmpeg.command();
    cmd.args(encode_args(input, output, format, &graph, bitrate));
    cmd.execute().await.map_err(|e| e.into_encode())?;

    tracing::debug!(format = %format, effects = effects.len(), "audio encoded");
    Ok(graph.output)
}

/// Bitrate for lossy targets: the request's, else the configured default.
/// Lossless targets have none.
pub fn effective_bitrate(format: AudioFormat, params: &EffectParams, config: &AudioConfig) -> Option<u32> {
    if format.is_lossless() {
        None
    } else {
        Some(params.bitrate_kbps.unwrap_or(config.default_bitrate_kbps))
    }
}

/// ffmpeg arguments for one encode. Only the first audio stream is kept;
/// cover art and video are dropped.
pub fn encode_args(
    input: &Path,
    output: &Path,
    format: AudioFormat,
    graph: &FilterGraph,
    bitrate_kbps: Option<u32>,
) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-y", "-i"]
        .into_iter()
        .map(String::from)
        .collect();
    args.push(input.to_string_lossy().into_owned());
    args.extend(["-vn", "-map", "0:a:0"].map(String::from));

    if let Some(filter) = graph.to_arg() {
        args.push("-af".into());
        args.push(filter);
    }

    args.push("-c:a".into());
    args.push(format.ffmpeg_codec().into());
    if let Some(kbps) = bitrate_kbps {
        args.push("-b:a".into());
        args.push(format!("{kbps}k"));
    }

    args.push("-f".into());
    args.push(format.ffmpeg_muxer().into());
    args.push(output.to_string_lossy().into_owned());
    args
}
