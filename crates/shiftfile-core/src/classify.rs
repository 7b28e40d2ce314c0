//! Format classification: source filename -> [`MediaKind`], and target token
//! -> [`TargetFormat`].
//!
//! The extension is authoritative. A declared content type only corroborates
//! it; when the two disagree the extension wins and the mismatch is logged.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::media::{AudioFormat, ImageFormat, MediaKind, TargetFormat};

/// Source extensions recognized as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "tiff", "bmp", "ico"];

/// Source extensions recognized as audio.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac", "m4a", "aac"];

/// Lowercased extension of `file_name`, if it has one.
pub fn source_extension(file_name: &str) -> Option<String> {
    // Strip any client-side directory components before looking for a dot.
    let base = file_name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(file_name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Classify an uploaded file by its name, with the declared content type as a
/// secondary signal.
///
/// # Errors
///
/// [`Error::UnsupportedFormat`] when the extension is missing or outside both
/// recognized sets.
pub fn classify(file_name: &str, content_type: Option<&str>) -> Result<MediaKind> {
    let ext = source_extension(file_name)
        .ok_or_else(|| Error::UnsupportedFormat(format!("'{file_name}' has no file extension")))?;

    let kind = if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Image
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Audio
    } else {
        return Err(Error::UnsupportedFormat(format!(
            "'.{ext}' is not a supported image or audio extension"
        )));
    };

    if let Some(declared) = content_type.and_then(content_type_kind) {
        if declared != kind {
            tracing::warn!(
                file = file_name,
                content_type = content_type.unwrap_or_default(),
                "declared content type says {declared}, extension says {kind}; using extension"
            );
        }
    }

    Ok(kind)
}

/// Top-level media kind named by a MIME type, if it names one.
fn content_type_kind(content_type: &str) -> Option<MediaKind> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let (top, _) = essence.split_once('/')?;
    match top {
        "image" => Some(MediaKind::Image),
        "audio" => Some(MediaKind::Audio),
        _ => None,
    }
}

/// Check a target token against the format set for `kind` and resolve it to
/// its canonical form.
///
/// # Errors
///
/// [`Error::InvalidTargetFormat`] when the token is empty or does not name a
/// format of that kind (e.g. "bmp" for audio).
pub fn validate_target(kind: MediaKind, token: &str) -> Result<TargetFormat> {
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::InvalidTargetFormat("target format not specified".into()));
    }

    let resolved = match kind {
        MediaKind::Image => ImageFormat::from_token(token).map(TargetFormat::Image),
        MediaKind::Audio => AudioFormat::from_token(token).map(TargetFormat::Audio),
    };

    resolved.ok_or_else(|| {
        Error::InvalidTargetFormat(format!("'{token}' is not a valid {kind} target format"))
    })
}

/// The extension sets, for display and discovery.
#[derive(Debug, Clone, Serialize)]
pub struct SupportedFormats {
    pub image: Vec<&'static str>,
    pub audio: Vec<&'static str>,
}

pub fn supported_formats() -> SupportedFormats {
    SupportedFormats {
        image: IMAGE_EXTENSIONS.to_vec(),
        audio: AUDIO_EXTENSIONS.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn extension_sets_are_disjoint() {
        for ext in IMAGE_EXTENSIONS {
            assert!(!AUDIO_EXTENSIONS.contains(ext), "{ext} is in both sets");
        }
    }

    #[test]
    fn source_extension_lowercases() {
        assert_eq!(source_extension("Photo.PNG").as_deref(), Some("png"));
        assert_eq!(source_extension("a.b.wav").as_deref(), Some("wav"));
        assert_eq!(source_extension("C:\\uploads\\song.Mp3").as_deref(), Some("mp3"));
        assert_eq!(source_extension("noext"), None);
        assert_eq!(source_extension(".hidden"), None);
        assert_eq!(source_extension("trailing."), None);
    }

    #[test]
    fn classify_by_extension() {
        assert_eq!(classify("a.jpg", None).unwrap(), MediaKind::Image);
        assert_eq!(classify("a.ICO", None).unwrap(), MediaKind::Image);
        assert_eq!(classify("a.flac", None).unwrap(), MediaKind::Audio);
    }

    #[test]
    fn classify_unknown_extension() {
        let err = classify("data.xyz", Some("image/png")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        let err = classify("README", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }

    #[test]
    fn content_type_never_overrides_extension() {
        assert_eq!(classify("a.png", Some("audio/mpeg")).unwrap(), MediaKind::Image);
        assert_eq!(
            classify("a.wav", Some("application/octet-stream")).unwrap(),
            MediaKind::Audio
        );
    }

    #[test]
    fn content_type_kind_parses_parameters() {
        assert_eq!(content_type_kind("image/png; q=1"), Some(MediaKind::Image));
        assert_eq!(content_type_kind("Audio/WAV"), Some(MediaKind::Audio));
        assert_eq!(content_type_kind("text/plain"), None);
        assert_eq!(content_type_kind("garbage"), None);
    }

    #[test]
    fn validate_target_resolves_case_insensitively() {
        assert_eq!(
            validate_target(MediaKind::Image, "JPG").unwrap(),
            TargetFormat::Image(ImageFormat::Jpeg)
        );
        assert_eq!(
            validate_target(MediaKind::Audio, "Mp3").unwrap(),
            TargetFormat::Audio(AudioFormat::Mp3)
        );
    }

    #[test]
    fn validate_target_rejects_kind_mismatch() {
        let err = validate_target(MediaKind::Audio, "bmp").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTargetFormat);
        let err = validate_target(MediaKind::Image, "wav").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTargetFormat);
    }

    #[test]
    fn validate_target_rejects_missing() {
        let err = validate_target(MediaKind::Image, "  ").unwrap_err();
        assert!(err.to_string().contains("not specified"));
    }

    #[test]
    fn supported_formats_lists_both_sets() {
        let formats = supported_formats();
        assert_eq!(formats.image.len(), 8);
        assert_eq!(formats.audio.len(), 6);
        let json = serde_json::to_value(&formats).unwrap();
        assert!(json["audio"].as_array().unwrap().contains(&"m4a".into()));
    }
}
