//! shiftfile-core: error taxonomy, configuration, format tables, and effect
//! parameters shared by the conversion pipeline.
//!
//! Nothing in this crate touches media bytes. It decides *whether* a request
//! is well-formed (which kind of media, which target, which effect values);
//! `shiftfile-av` does the actual work.

pub mod classify;
pub mod config;
pub mod error;
pub mod media;
pub mod params;

// Re-export the most commonly used items at the crate root.
pub use classify::{classify, source_extension, supported_formats, validate_target, SupportedFormats};
pub use error::{Error, ErrorBody, ErrorKind, Result};
pub use media::*;
pub use params::EffectParams;
