//! Conversion orchestration.
//!
//! A conversion moves through [`Stage`]s: the upload is received, classified
//! and validated (no scratch files exist yet), staged into a scratch input
//! file, converted into a scratch output file, and finally delivered. The
//! input file is released as soon as conversion finishes either way; the
//! output file travels with the [`ConversionResult`] and is released when the
//! caller is done with it.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use shiftfile_core::config::Config;
use shiftfile_core::params::FIELD_FORMAT;
use shiftfile_core::{
    classify, source_extension, validate_target, EffectParams, Error, MediaKind, Result, TargetFormat,
};

use crate::scratch::{ScratchDir, ScratchFile, ScratchKind};
use crate::tools::ToolRegistry;
use crate::{audio, imaging};

/// Where a conversion is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Classified,
    InputStaged,
    Converted,
    Delivered,
    Errored,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Classified => "classified",
            Self::InputStaged => "input_staged",
            Self::Converted => "converted",
            Self::Delivered => "delivered",
            Self::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// An uploaded file as the transport layer hands it over: where the bytes
/// are, what the client called it, and the accompanying form fields.
#[derive(Debug, Clone)]
pub struct Upload {
    pub path: PathBuf,
    pub file_name: String,
    pub content_type: Option<String>,
    pub fields: HashMap<String, String>,
}

impl Upload {
    pub fn new(path: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_name: file_name.into(),
            content_type: None,
            fields: HashMap::new(),
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// A fully validated conversion: classified source, canonical target, and
/// effect parameters that are already known to be in range.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub source_path: PathBuf,
    pub source_name: String,
    pub source_kind: MediaKind,
    pub source_extension: String,
    pub target: TargetFormat,
    pub effects: EffectParams,
}

impl ConversionRequest {
    /// Classify and validate an upload. Nothing touches the filesystem.
    ///
    /// Effect fields are only parsed for audio; an image upload ignores them.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedFormat`], [`Error::InvalidTargetFormat`], or
    /// [`Error::EffectParameter`].
    pub fn from_upload(upload: &Upload) -> Result<Self> {
        let source_kind = classify(&upload.file_name, upload.content_type.as_deref())?;
        let source_extension = source_extension(&upload.file_name)
            .ok_or_else(|| Error::UnsupportedFormat(format!("'{}' has no file extension", upload.file_name)))?;

        let token = upload.fields.get(FIELD_FORMAT).map(String::as_str).unwrap_or_default();
        let target = validate_target(source_kind, token)?;

        let effects = match source_kind {
            MediaKind::Audio => EffectParams::from_form(&upload.fields)?,
            MediaKind::Image => EffectParams::default(),
        };

        Ok(Self {
            source_path: upload.path.clone(),
            source_name: upload.file_name.clone(),
            source_kind,
            source_extension,
            target,
            effects,
        })
    }

    /// Name the client should save the result as.
    pub fn download_name(&self) -> String {
        download_name(&self.source_name, self.target)
    }
}

/// A finished conversion. Owns the output scratch file: dropping the result
/// releases it, as does [`ConversionResult::complete`].
#[derive(Debug)]
pub struct ConversionResult {
    output: ScratchFile,
    download_name: String,
    target: TargetFormat,
}

impl ConversionResult {
    pub fn path(&self) -> &Path {
        self.output.path()
    }

    pub fn download_name(&self) -> &str {
        &self.download_name
    }

    pub fn target(&self) -> TargetFormat {
        self.target
    }

    /// Read the converted bytes and release the file.
    pub async fn into_bytes(self) -> Result<Vec<u8>> {
        let bytes = tokio::fs::read(self.output.path())
            .await
            .map_err(|e| Error::storage("failed to read converted output", e))?;
        self.complete();
        Ok(bytes)
    }

    /// Move the output to `dest`, outside the scratch directory.
    pub fn persist(self, dest: &Path) -> Result<PathBuf> {
        let saved = self.output.persist(dest)?;
        tracing::info!(stage = %Stage::Delivered, path = %saved.display(), "conversion delivered");
        Ok(saved)
    }

    /// Signal that delivery has finished and release the output.
    pub fn complete(self) {
        tracing::info!(stage = %Stage::Delivered, download = %self.download_name, "conversion delivered");
        self.output.release();
    }
}

/// Runs conversions. Holds only read-only, shared state, so one instance
/// (or its clones) serves any number of concurrent requests.
#[derive(Debug, Clone)]
pub struct Converter {
    tools: Arc<ToolRegistry>,
    scratch: ScratchDir,
    config: Arc<Config>,
}

impl Converter {
    /// Build a converter from configuration and an already-discovered tool
    /// registry.
    pub fn new(config: Config, tools: ToolRegistry) -> Self {
        Self {
            scratch: ScratchDir::from_config(&config.scratch),
            tools: Arc::new(tools),
            config: Arc::new(config),
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validate an upload and convert it.
    pub async fn convert_upload(&self, upload: &Upload) -> Result<ConversionResult> {
        tracing::debug!(stage = %Stage::Received, file = %upload.file_name, "upload received");
        let request = ConversionRequest::from_upload(upload).inspect_err(log_failure)?;
        self.convert(&request).await
    }

    /// Convert a validated request.
    ///
    /// The input scratch file is gone by the time this returns. On success the
    /// output scratch file is owned by the returned [`ConversionResult`]; on
    /// failure it has already been released.
    pub async fn convert(&self, request: &ConversionRequest) -> Result<ConversionResult> {
        tracing::info!(
            stage = %Stage::Classified,
            file = %request.source_name,
            kind = %request.source_kind,
            target = %request.target,
            "conversion accepted"
        );

        let output = self.run(request).await.inspect_err(log_failure)?;

        tracing::info!(stage = %Stage::Converted, target = %request.target, "conversion finished");
        Ok(ConversionResult {
            output,
            download_name: request.download_name(),
            target: request.target,
        })
    }

    async fn run(&self, request: &ConversionRequest) -> Result<ScratchFile> {
        if request.target.kind() != request.source_kind {
            return Err(Error::InvalidTargetFormat(format!(
                "'{}' is not a valid {} target format",
                request.target, request.source_kind
            )));
        }
        request.effects.validate()?;

        self.scratch
            .scoped(ScratchKind::Input, &request.source_extension, |input| async move {
                tokio::fs::copy(&request.source_path, &input)
                    .await
                    .map_err(|e| Error::storage("failed to stage upload", e))?;
                tracing::debug!(stage = %Stage::InputStaged, path = %input.display(), "input staged");

                let output = self.scratch.acquire(ScratchKind::Output, request.target.extension())?;
                match request.target {
                    TargetFormat::Image(format) => {
                        let max_dimension = self.config.image.max_dimension;
                        let bytes = tokio::task::spawn_blocking(move || {
                            imaging::load(&input).and_then(|img| imaging::render(img, format, max_dimension))
                        })
                        .await
                        .map_err(|e| Error::Encode(format!("image worker failed: {e}")))??;
                        tokio::fs::write(output.path(), bytes)
                            .await
                            .map_err(|e| Error::storage("failed to write converted image", e))?;
                    }
                    TargetFormat::Audio(format) => {
                        audio::process(
                            &self.tools,
                            &input,
                            output.path(),
                            format,
                            &request.effects,
                            &self.config.audio,
                        )
                        .await?;
                    }
                }
                Ok(output)
            })
            .await
    }
}

fn log_failure(error: &Error) {
    if error.is_client_error() {
        tracing::info!(stage = %Stage::Errored, kind = %error.kind(), "conversion rejected: {error}");
    } else {
        tracing::error!(stage = %Stage::Errored, kind = %error.kind(), "conversion failed: {error}");
    }
}

/// `converted_<stem>.<ext>`, with the stem reduced to characters that are
/// safe in a file name on any platform.
pub fn download_name(source_name: &str, target: TargetFormat) -> String {
    let base = source_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(source_name);
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };

    let safe: String = stem
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    let safe = safe.trim_matches('.');
    let safe = if safe.is_empty() { "file" } else { safe };

    format!("converted_{safe}.{}", target.extension())
}
