//! Per-target color-mode rules and encoder settings.
//!
//! One table, keyed by [`ImageFormat`], decides both how a decoded image is
//! normalized and how it is encoded. Adding a target means adding one arm.

use image::codecs::png::{CompressionType, FilterType as PngFilter};
use shiftfile_core::ImageFormat;

/// How the decoded pixel layout is adapted before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRule {
    /// Alpha is blended over opaque white, then the image becomes 3-channel
    /// color. Opaque grayscale is kept as is.
    FlattenOnWhite,
    /// Color and color-with-alpha pass; everything else becomes
    /// color-with-alpha.
    ColorOrRgba,
    /// Color and color-with-alpha pass; everything else becomes color. The
    /// encoder then quantizes to an adaptive 256-color palette.
    Palette,
    /// 8-bit gray and 8-bit color (with or without alpha) pass; anything else
    /// becomes 8-bit color, keeping alpha if it had any.
    EightBit,
    /// Resized to exactly `size`x`size` (aspect ratio ignored), then
    /// color-with-alpha.
    Icon { size: u32 },
}

/// Encoder settings for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeParams {
    Jpeg { quality: u8 },
    Png { compression: CompressionType, filter: PngFilter },
    /// Lossy VP8. `method` trades speed for size, 0 (fastest) to 6.
    Webp { quality: u8, method: u8 },
    /// NeuQuant speed, 1 (best) to 30 (fastest).
    Gif { speed: i32 },
    Tiff { compression: TiffCompression },
    Bmp,
    Ico,
}

/// Strip compression for TIFF output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffCompression {
    Uncompressed,
    Lzw,
}

/// Everything the transcoder needs to know about a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatProfile {
    pub color: ColorRule,
    pub encode: EncodeParams,
}

/// The profile for `format`.
pub fn profile(format: ImageFormat) -> FormatProfile {
    let (color, encode) = match format {
        ImageFormat::Jpeg => (ColorRule::FlattenOnWhite, EncodeParams::Jpeg { quality: 92 }),
        ImageFormat::Png => (
            ColorRule::ColorOrRgba,
            EncodeParams::Png {
                compression: CompressionType::Best,
                filter: PngFilter::Adaptive,
            },
        ),
        ImageFormat::Webp => (
            ColorRule::ColorOrRgba,
            EncodeParams::Webp { quality: 90, method: 6 },
        ),
        ImageFormat::Gif => (ColorRule::Palette, EncodeParams::Gif { speed: 10 }),
        ImageFormat::Tiff => (
            ColorRule::EightBit,
            EncodeParams::Tiff {
                compression: TiffCompression::Lzw,
            },
        ),
        ImageFormat::Bmp => (ColorRule::EightBit, EncodeParams::Bmp),
        ImageFormat::Ico => (ColorRule::Icon { size: 32 }, EncodeParams::Ico),
    };
    FormatProfile { color, encode }
}
