//! Decoding, geometry and WebP encoding.
//!
//! Dimension math is kept in pure functions so the ladder rules can be tested
//! without touching pixels. Pixel work uses the `image` crate; lossy WebP
//! encoding goes through `webp` (libwebp), since `image` only writes lossless
//! WebP.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};

use crate::error::{MediaError, MediaResult};

const RESIZE_FILTER: FilterType = FilterType::Lanczos3;

/// Decode `bytes` and apply any EXIF orientation so the returned pixels are
/// upright.
pub fn decode_oriented(bytes: &[u8]) -> MediaResult<DynamicImage> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| MediaError::ImageProcessing(format!("read image failed: {err}")))?;
    if reader.format().is_none() {
        return Err(MediaError::ImageProcessing(
            "unrecognized image format".to_string(),
        ));
    }
    let mut decoder = reader.into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

pub fn detect_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.starts_with(b"BM") {
        return Some("image/bmp");
    }
    None
}

pub fn mime_to_format(mime_type: &str) -> Option<ImageFormat> {
    match mime_type {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
        "image/gif" => Some(ImageFormat::Gif),
        "image/webp" => Some(ImageFormat::WebP),
        "image/bmp" => Some(ImageFormat::Bmp),
        _ => None,
    }
}

/// True if the payload is already encoded in the storage format.
pub fn is_target_format(bytes: &[u8]) -> bool {
    detect_mime_type(bytes).and_then(mime_to_format) == Some(ImageFormat::WebP)
}

/// Scale `(width, height)` so the longer edge equals `long_edge`, keeping the
/// aspect ratio. Neither side rounds down to zero.
pub fn scale_to_long_edge(source: (u32, u32), long_edge: u32) -> (u32, u32) {
    let (w, h) = source;
    if w == 0 || h == 0 {
        return (0, 0);
    }
    if w >= h {
        let ratio = long_edge as f64 / w as f64;
        (long_edge, ((h as f64 * ratio).round() as u32).max(1))
    } else {
        let ratio = long_edge as f64 / h as f64;
        (((w as f64 * ratio).round() as u32).max(1), long_edge)
    }
}

/// Dimensions of the main asset: unchanged when both sides fit within
/// `max_dimension`, otherwise scaled down so the longer edge equals it.
pub fn fit_within(source: (u32, u32), max_dimension: u32) -> (u32, u32) {
    if source.0.max(source.1) <= max_dimension {
        source
    } else {
        scale_to_long_edge(source, max_dimension)
    }
}

/// One rung of the variant ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LadderStep {
    /// Nominal size (longer edge) used in the file name.
    pub size: u32,
    pub width: u32,
    pub height: u32,
}

/// Ladder steps for a source image. Sizes above the source's longer edge are
/// skipped; nothing is ever upscaled. Order follows `sizes`.
pub fn ladder_steps(source: (u32, u32), sizes: &[u32]) -> Vec<LadderStep> {
    let longer_edge = source.0.max(source.1);
    sizes
        .iter()
        .copied()
        .filter(|&size| size > 0 && size <= longer_edge)
        .map(|size| {
            let (width, height) = scale_to_long_edge(source, size);
            LadderStep {
                size,
                width,
                height,
            }
        })
        .collect()
}

pub fn resize_exact(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    if image.width() == width && image.height() == height {
        return image.clone();
    }
    image.resize_exact(width, height, RESIZE_FILTER)
}

/// Scale to cover `(width, height)` and center-crop to exactly that size.
pub fn cover_crop(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    image.resize_to_fill(width, height, RESIZE_FILTER)
}

/// Encode as lossy WebP.
pub fn encode_webp(image: &DynamicImage, quality: u8) -> MediaResult<Vec<u8>> {
    // libwebp only takes 8-bit RGB/RGBA buffers
    let converted;
    let source = match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => image,
        other => {
            converted = DynamicImage::ImageRgba8(other.to_rgba8());
            &converted
        }
    };
    let encoder = webp::Encoder::from_image(source)
        .map_err(|err| MediaError::ImageProcessing(format!("webp encoder: {err}")))?;
    let encoded = encoder.encode(quality as f32);
    if encoded.is_empty() {
        return Err(MediaError::ImageProcessing(
            "webp encoder produced no data".to_string(),
        ));
    }
    Ok(encoded.to_vec())
}
