//! Image transcoding.
//!
//! Decode whatever the input is, bound its size, adapt its color mode to the
//! target (see [`profile`]), and encode. Everything here is synchronous and
//! CPU-bound; async callers run it on the blocking pool.

pub mod profile;

use std::io::{Cursor, Seek, Write};
use std::path::Path;

use image::codecs::bmp::BmpEncoder;
use image::codecs::gif::GifEncoder;
use image::codecs::ico::IcoEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Frame, Rgb, RgbImage, RgbaImage};
use shiftfile_core::config::ImageConfig;
use shiftfile_core::{Error, ImageFormat, Result};
use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::compression::{Compression, Lzw, Uncompressed};
use tiff::encoder::TiffEncoder;

pub use profile::{profile, ColorRule, EncodeParams, FormatProfile, TiffCompression};

/// Transcode the image at `input` into `format`, writing the result to
/// `output`.
///
/// # Errors
///
/// - [`Error::Decode`] if `input` is not a readable image.
/// - [`Error::Encode`] if the encoder rejects the normalized image.
/// - [`Error::Storage`] if either file cannot be read or written.
pub fn transcode(input: &Path, output: &Path, format: ImageFormat, config: &ImageConfig) -> Result<()> {
    let img = load(input)?;
    let bytes = render(img, format, config.max_dimension)?;
    std::fs::write(output, bytes)
        .map_err(|e| Error::storage(format!("failed to write {}", output.display()), e))
}

/// Read and decode the image at `path`. The container is sniffed from the
/// bytes, not the file name.
pub fn load(path: &Path) -> Result<DynamicImage> {
    let data = std::fs::read(path)
        .map_err(|e| Error::storage(format!("failed to read {}", path.display()), e))?;
    decode(&data)
}

/// Decode an in-memory image.
pub fn decode(data: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(data).map_err(|e| Error::Decode(format!("not a readable image: {e}")))
}

/// Bound, normalize, and encode a decoded image. Returns the encoded bytes.
pub fn render(img: DynamicImage, format: ImageFormat, max_dimension: u32) -> Result<Vec<u8>> {
    let FormatProfile { color, encode: params } = profile(format);
    let img = bound_dimensions(img, max_dimension);
    let img = normalize_color(img, color);

    tracing::debug!(
        format = %format,
        width = img.width(),
        height = img.height(),
        color = ?img.color(),
        "encoding image"
    );
    encode(&img, params, format)
}

/// Downscale so the longest edge is at most `max_dimension`, keeping the
/// aspect ratio. Smaller images are returned untouched.
pub fn bound_dimensions(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let max = max_dimension.max(1);
    if img.width().max(img.height()) <= max {
        return img;
    }
    tracing::debug!(width = img.width(), height = img.height(), max, "downscaling oversized image");
    img.resize(max, max, FilterType::Lanczos3)
}

/// Adapt the pixel layout of `img` according to `rule`. Total over every
/// color type the decoder can produce.
pub fn normalize_color(img: DynamicImage, rule: ColorRule) -> DynamicImage {
    match rule {
        ColorRule::FlattenOnWhite => {
            if img.color().has_alpha() {
                DynamicImage::ImageRgb8(flatten_on_white(&img.to_rgba8()))
            } else {
                match img {
                    DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img,
                    other => DynamicImage::ImageRgb8(other.to_rgb8()),
                }
            }
        }
        ColorRule::ColorOrRgba => match img {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
            other => DynamicImage::ImageRgba8(other.to_rgba8()),
        },
        ColorRule::Palette => match img {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        },
        ColorRule::EightBit => match img {
            DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageRgb8(_)
            | DynamicImage::ImageRgba8(_) => img,
            other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        },
        ColorRule::Icon { size } => {
            DynamicImage::ImageRgba8(img.resize_exact(size, size, FilterType::Lanczos3).to_rgba8())
        }
    }
}

/// Composite over opaque white: `out = c * a + 255 * (1 - a)` per channel.
fn flatten_on_white(rgba: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

fn encode(img: &DynamicImage, params: EncodeParams, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let image_err = |e: image::ImageError| e.to_string();
    let written = match params {
        EncodeParams::Jpeg { quality } => img
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
            .map_err(image_err),
        EncodeParams::Png { compression, filter } => img
            .write_with_encoder(PngEncoder::new_with_quality(&mut buf, compression, filter))
            .map_err(image_err),
        EncodeParams::Webp { quality, method } => {
            encode_webp(img, quality, method).map(|bytes| *buf.get_mut() = bytes)
        }
        EncodeParams::Gif { speed } => {
            // The encoder writes the trailer when dropped at the end of this block.
            let mut encoder = GifEncoder::new_with_speed(&mut buf, speed);
            encoder.encode_frame(Frame::new(img.to_rgba8())).map_err(image_err)
        }
        EncodeParams::Tiff { compression } => {
            encode_tiff(img, compression, &mut buf).map_err(|e| e.to_string())
        }
        EncodeParams::Bmp => img.write_with_encoder(BmpEncoder::new(&mut buf)).map_err(image_err),
        EncodeParams::Ico => img.write_with_encoder(IcoEncoder::new(&mut buf)).map_err(image_err),
    };
    written.map_err(|e| Error::Encode(format!("{} encoder failed: {e}", format.encoder_name())))?;
    Ok(buf.into_inner())
}

/// Lossy WebP through libwebp. Expects 8-bit color with or without alpha.
fn encode_webp(img: &DynamicImage, quality: u8, method: u8) -> std::result::Result<Vec<u8>, String> {
    let encoder = match img {
        DynamicImage::ImageRgb8(rgb) => webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height()),
        DynamicImage::ImageRgba8(rgba) => {
            webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
        }
        other => return Err(format!("unsupported color type {:?}", other.color())),
    };

    let mut config = webp::WebPConfig::new().map_err(|()| "invalid encoder configuration".to_string())?;
    config.lossless = 0;
    config.quality = f32::from(quality);
    config.method = i32::from(method);

    let memory = encoder.encode_advanced(&config).map_err(|e| format!("{e:?}"))?;
    Ok(memory.to_vec())
}

/// TIFF with the requested strip compression. Expects 8-bit gray, color, or
/// color with alpha.
fn encode_tiff<W: Write + Seek>(
    img: &DynamicImage,
    compression: TiffCompression,
    out: W,
) -> tiff::TiffResult<()> {
    let mut encoder = TiffEncoder::new(out)?;
    match compression {
        TiffCompression::Uncompressed => write_tiff(&mut encoder, img, Uncompressed),
        TiffCompression::Lzw => write_tiff(&mut encoder, img, Lzw::default()),
    }
}

fn write_tiff<W: Write + Seek, D: Compression>(
    encoder: &mut TiffEncoder<W>,
    img: &DynamicImage,
    compression: D,
) -> tiff::TiffResult<()> {
    let (w, h) = (img.width(), img.height());
    match img {
        DynamicImage::ImageLuma8(gray) => {
            write_strip::<colortype::Gray8, _, _>(encoder, w, h, compression, gray.as_raw())
        }
        DynamicImage::ImageRgba8(rgba) => {
            write_strip::<colortype::RGBA8, _, _>(encoder, w, h, compression, rgba.as_raw())
        }
        DynamicImage::ImageRgb8(rgb) => {
            write_strip::<colortype::RGB8, _, _>(encoder, w, h, compression, rgb.as_raw())
        }
        other => {
            let rgb = other.to_rgb8();
            write_strip::<colortype::RGB8, _, _>(encoder, w, h, compression, rgb.as_raw())
        }
    }
}

fn write_strip<C, W, D>(
    encoder: &mut TiffEncoder<W>,
    width: u32,
    height: u32,
    compression: D,
    data: &[u8],
) -> tiff::TiffResult<()>
where
    C: ColorType<Inner = u8>,
    W: Write + Seek,
    D: Compression,
{
    encoder.write_image_with_compression::<C, D>(width, height, compression, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba};
    use shiftfile_core::ErrorKind;

    fn every_color_type(w: u32, h: u32) -> Vec<DynamicImage> {
        vec![
            DynamicImage::new_luma8(w, h),
            DynamicImage::new_luma_a8(w, h),
            DynamicImage::new_rgb8(w, h),
            DynamicImage::new_rgba8(w, h),
            DynamicImage::new_luma16(w, h),
            DynamicImage::new_luma_a16(w, h),
            DynamicImage::new_rgb16(w, h),
            DynamicImage::new_rgba16(w, h),
            DynamicImage::new_rgb32f(w, h),
            DynamicImage::new_rgba32f(w, h),
        ]
    }

    /// A red disc on a fully transparent background.
    fn transparent_disc(size: u32) -> DynamicImage {
        let c = size as f32 / 2.0;
        let img = RgbaImage::from_fn(size, size, |x, y| {
            let (dx, dy) = (x as f32 + 0.5 - c, y as f32 + 0.5 - c);
            if (dx * dx + dy * dy).sqrt() < c / 2.0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn every_color_type_encodes_to_every_target() {
        for format in ImageFormat::ALL {
            for img in every_color_type(6, 4) {
                let color = img.color();
                let bytes = render(img, format, 8000)
                    .unwrap_or_else(|e| panic!("{color:?} -> {format}: {e}"));
                assert!(!bytes.is_empty(), "{color:?} -> {format}");
            }
        }
    }

    #[test]
    fn output_container_matches_target() {
        let expected = [
            (ImageFormat::Png, image::ImageFormat::Png),
            (ImageFormat::Jpeg, image::ImageFormat::Jpeg),
            (ImageFormat::Webp, image::ImageFormat::WebP),
            (ImageFormat::Gif, image::ImageFormat::Gif),
            (ImageFormat::Tiff, image::ImageFormat::Tiff),
            (ImageFormat::Bmp, image::ImageFormat::Bmp),
            (ImageFormat::Ico, image::ImageFormat::Ico),
        ];
        for (target, container) in expected {
            let bytes = render(DynamicImage::new_rgb8(20, 10), target, 8000).unwrap();
            assert_eq!(image::guess_format(&bytes).unwrap(), container, "{target}");
        }
    }

    #[test]
    fn webp_output_is_lossy() {
        let img = RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]));
        let bytes = render(DynamicImage::ImageRgb8(img), ImageFormat::Webp, 8000).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[12..16], b"VP8 ", "expected a lossy VP8 chunk");
        assert_eq!(decode(&bytes).unwrap().dimensions(), (64, 64));
    }

    #[test]
    fn tiff_output_is_lzw_compressed() {
        use tiff::decoder::Decoder;
        use tiff::tags::Tag;

        let img = RgbImage::from_fn(256, 256, |x, _| Rgb([x as u8, 0, 0]));
        let raw_len = img.as_raw().len();
        let bytes = render(DynamicImage::ImageRgb8(img), ImageFormat::Tiff, 8000).unwrap();
        assert!(bytes.len() < raw_len, "{} >= {raw_len}", bytes.len());

        let mut decoder = Decoder::new(Cursor::new(&bytes)).unwrap();
        // 5 is LZW in the TIFF compression tag.
        assert_eq!(decoder.get_tag_u32(Tag::Compression).unwrap(), 5);

        let out = decode(&bytes).unwrap().to_rgb8();
        assert_eq!(out.get_pixel(200, 10).0, [200, 0, 0]);
    }

    #[test]
    fn uncompressed_tiff_is_still_readable() {
        let img = DynamicImage::new_luma8(8, 8);
        let mut buf = Cursor::new(Vec::new());
        encode_tiff(&img, TiffCompression::Uncompressed, &mut buf).unwrap();
        let mut decoder = tiff::decoder::Decoder::new(Cursor::new(buf.into_inner())).unwrap();
        assert_eq!(decoder.get_tag_u32(tiff::tags::Tag::Compression).unwrap(), 1);
    }

    #[test]
    fn transparent_png_to_jpeg_has_white_background() {
        let bytes = render(transparent_disc(64), ImageFormat::Jpeg, 8000).unwrap();
        let out = decode(&bytes).unwrap();
        assert!(!out.color().has_alpha());

        let corner = out.get_pixel(0, 0).0;
        assert!(corner[..3].iter().all(|&c| c >= 250), "corner {corner:?}");
        let center = out.get_pixel(32, 32).0;
        assert!(center[0] > 200 && center[1] < 60 && center[2] < 60, "center {center:?}");
    }

    #[test]
    fn opaque_white_survives_jpeg() {
        let white = RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 255]));
        let bytes = render(DynamicImage::ImageRgba8(white), ImageFormat::Jpeg, 8000).unwrap();
        let out = decode(&bytes).unwrap().to_rgb8();
        assert!(out.pixels().all(|p| p.0.iter().all(|&c| c >= 250)));
    }

    #[test]
    fn half_transparent_black_blends_to_grey() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 128]));
        let flat = flatten_on_white(&img);
        assert_eq!(flat.get_pixel(0, 0).0, [127, 127, 127]);

        let opaque = RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 255]));
        assert_eq!(flatten_on_white(&opaque).get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn jpeg_keeps_opaque_grayscale() {
        let out = normalize_color(DynamicImage::new_luma8(2, 2), ColorRule::FlattenOnWhite);
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
        let out = normalize_color(DynamicImage::new_luma_a8(2, 2), ColorRule::FlattenOnWhite);
        assert!(matches!(out, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn deep_samples_are_reduced_for_tiff_and_bmp() {
        let out = normalize_color(DynamicImage::new_rgba16(2, 2), ColorRule::EightBit);
        assert!(matches!(out, DynamicImage::ImageRgba8(_)));
        let out = normalize_color(DynamicImage::new_rgb32f(2, 2), ColorRule::EightBit);
        assert!(matches!(out, DynamicImage::ImageRgb8(_)));
        let out = normalize_color(DynamicImage::new_luma_a8(2, 2), ColorRule::EightBit);
        assert!(matches!(out, DynamicImage::ImageRgba8(_)));
        let out = normalize_color(DynamicImage::new_luma8(2, 2), ColorRule::EightBit);
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn bmp_to_ico_is_32_square() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("red.bmp");
        let output = tmp.path().join("out.ico");
        RgbImage::from_pixel(100, 100, Rgb([255, 0, 0])).save(&input).unwrap();

        transcode(&input, &output, ImageFormat::Ico, &ImageConfig::default()).unwrap();
        let out = image::open(&output).unwrap();
        assert_eq!(out.dimensions(), (32, 32));
        let px = out.to_rgba8().get_pixel(16, 16).0;
        assert!(px[0] > 240 && px[1] < 16 && px[3] == 255, "{px:?}");
    }

    #[test]
    fn non_square_ico_is_stretched() {
        let bytes = render(DynamicImage::new_rgb8(300, 20), ImageFormat::Ico, 8000).unwrap();
        assert_eq!(decode(&bytes).unwrap().dimensions(), (32, 32));
    }

    #[test]
    fn oversized_image_is_downscaled() {
        let bytes = render(DynamicImage::new_rgb8(300, 150), ImageFormat::Png, 100).unwrap();
        assert_eq!(decode(&bytes).unwrap().dimensions(), (100, 50));

        let small = bound_dimensions(DynamicImage::new_rgb8(40, 30), 100);
        assert_eq!(small.dimensions(), (40, 30));
    }

    #[test]
    fn gif_round_trips_dimensions() {
        let bytes = render(transparent_disc(24), ImageFormat::Gif, 8000).unwrap();
        assert_eq!(decode(&bytes).unwrap().dimensions(), (24, 24));
    }

    #[test]
    fn garbage_input_is_decode_error() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("fake.png");
        let output = tmp.path().join("out.jpg");
        std::fs::write(&input, b"definitely not a png").unwrap();

        let err = transcode(&input, &output, ImageFormat::Jpeg, &ImageConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeError);
        assert!(!output.exists());
    }

    #[test]
    fn missing_input_is_storage_error() {
        let err = load(Path::new("/nonexistent/input.png")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageError);
    }
}
