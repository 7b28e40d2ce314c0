//! # shiftfile-av
//!
//! The conversion pipeline: everything that touches media bytes, scratch
//! files, or external tools.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find ffmpeg and ffprobe once at
//!   startup and hand the read-only result to every conversion.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Scratch files** ([`ScratchDir`], [`ScratchFile`]) -- request-scoped
//!   temp files that are removed on every exit path.
//! - **Image transcoding** ([`imaging::transcode`]) -- color-mode
//!   normalization and format-specific encoding.
//! - **Audio effects** ([`audio::process`]) -- a fixed-order effect chain
//!   rendered as an ffmpeg filter graph.
//! - **Orchestration** ([`Converter`]) -- classify, stage, convert, hand off.

pub mod audio;
pub mod command;
pub mod converter;
pub mod imaging;
pub mod probe;
pub mod scratch;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{CommandError, ToolCommand, ToolOutput};
pub use converter::{ConversionRequest, ConversionResult, Converter, Stage, Upload};
pub use probe::{probe_audio, AudioInfo};
pub use scratch::{ScratchDir, ScratchFile, ScratchKind};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
