use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shiftfile")]
#[command(author, version, about = "Convert images and audio between formats")]
pub struct Cli {
    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a single image or audio file
    Convert {
        /// File to convert
        #[arg(required = true)]
        file: PathBuf,

        /// Target format (e.g. png, jpg, ico, mp3, flac)
        #[arg(short, long)]
        format: String,

        /// Where to write the result (defaults to converted_<name>.<ext> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Content type to declare for the input, as an upload would
        #[arg(long)]
        content_type: Option<String>,

        /// Gain in dB (audio only)
        #[arg(long, allow_hyphen_values = true)]
        volume: Option<String>,

        /// Playback speed factor (audio only)
        #[arg(long, allow_hyphen_values = true)]
        speed: Option<String>,

        /// Fade-in length in seconds (audio only)
        #[arg(long, allow_hyphen_values = true)]
        fade_in: Option<String>,

        /// Fade-out length in seconds (audio only)
        #[arg(long, allow_hyphen_values = true)]
        fade_out: Option<String>,

        /// Loudness-normalize (audio only)
        #[arg(long)]
        normalize: bool,

        /// Downmix to mono (audio only)
        #[arg(long)]
        mono: bool,

        /// Bitrate for lossy targets, e.g. 192 or 192k (audio only)
        #[arg(long)]
        bitrate: Option<String>,

        /// Print the result (or the error) as JSON
        #[arg(long)]
        json: bool,
    },

    /// List supported source extensions
    Formats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },
}
