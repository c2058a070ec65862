//! Image checks and transforms applied before a photo is sent for recognition.

use std::io::Cursor;

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageFormat};
use serde::Serialize;

pub const ALLOWED_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_WIDTH: u32 = 800;
pub const MAX_HEIGHT: u32 = 600;
pub const JPEG_QUALITY: u8 = 80;
pub const DEFAULT_MIME: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub size: usize,
    pub mime_type: String,
}

/// MIME type sniffed from the leading bytes, `None` when they match no known
/// image format.
#[must_use]
pub fn detect_mime(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::Bmp => Some("image/bmp"),
        _ => Some("application/octet-stream"),
    }
}

pub fn validate_image(bytes: &[u8], mime_type: &str) -> Result<()> {
    if !ALLOWED_MIME_TYPES.contains(&mime_type) {
        bail!("Unsupported image format '{mime_type}'. Use JPEG, PNG or WebP");
    }
    if bytes.is_empty() {
        bail!("Image file is empty");
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        bail!(
            "Image is too large ({}). Maximum is {}",
            format_file_size(bytes.len() as u64),
            format_file_size(MAX_IMAGE_BYTES as u64)
        );
    }
    Ok(())
}

/// Scale down to fit within `max_width` x `max_height`, keeping the aspect
/// ratio. Images already inside the box are unchanged.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn calculate_new_dimensions(
    width: u32,
    height: u32,
    max_width: u32,
    max_height: u32,
) -> (u32, u32) {
    let (mut w, mut h) = (f64::from(width), f64::from(height));
    if w > f64::from(max_width) {
        h = h * f64::from(max_width) / w;
        w = f64::from(max_width);
    }
    if h > f64::from(max_height) {
        w = w * f64::from(max_height) / h;
        h = f64::from(max_height);
    }
    (w.round() as u32, h.round() as u32)
}

fn load(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).context("Failed to decode image")
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .context("Failed to encode JPEG")?;
    Ok(buf)
}

/// Re-encode in the format the input arrived in.
fn encode_like(img: &DynamicImage, original: &[u8]) -> Result<Vec<u8>> {
    match image::guess_format(original) {
        Ok(format @ (ImageFormat::Png | ImageFormat::WebP)) => {
            let mut buf = Vec::new();
            img.write_to(&mut Cursor::new(&mut buf), format)
                .context("Failed to encode image")?;
            Ok(buf)
        }
        _ => encode_jpeg(img, 90),
    }
}

/// Fit within the bounding box and re-encode as JPEG.
pub fn compress(bytes: &[u8], max_width: u32, max_height: u32, quality: u8) -> Result<Vec<u8>> {
    let img = load(bytes)?;
    let (w, h) = calculate_new_dimensions(img.width(), img.height(), max_width, max_height);
    let resized = if (w, h) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(w.max(1), h.max(1), FilterType::Lanczos3)
    };
    encode_jpeg(&resized, quality)
}

pub fn crop(bytes: &[u8], x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>> {
    let img = load(bytes)?;
    if width == 0 || height == 0 {
        bail!("Crop area must not be empty");
    }
    if x.saturating_add(width) > img.width() || y.saturating_add(height) > img.height() {
        bail!(
            "Crop area {width}x{height}+{x}+{y} exceeds image size {}x{}",
            img.width(),
            img.height()
        );
    }
    encode_like(&img.crop_imm(x, y, width, height), bytes)
}

/// Rotate clockwise by a multiple of 90 degrees.
pub fn rotate(bytes: &[u8], degrees: i32) -> Result<Vec<u8>> {
    let turns = match degrees.rem_euclid(360) {
        0 => return Ok(bytes.to_vec()),
        90 => 1,
        180 => 2,
        270 => 3,
        _ => bail!("Rotation must be a multiple of 90 degrees (got {degrees})"),
    };
    let img = load(bytes)?;
    let rotated = match turns {
        1 => img.rotate90(),
        2 => img.rotate180(),
        _ => img.rotate270(),
    };
    encode_like(&rotated, bytes)
}

pub fn metadata(bytes: &[u8]) -> Result<ImageMetadata> {
    let img = load(bytes)?;
    Ok(ImageMetadata {
        width: img.width(),
        height: img.height(),
        size: bytes.len(),
        mime_type: detect_mime(bytes).unwrap_or(DEFAULT_MIME).to_string(),
    })
}

/// `1536` becomes `1.5 KB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut index = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && index < UNITS.len() - 1 {
        value /= 1024.0;
        index += 1;
    }
    let formatted = format!("{value:.2}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[index])
}

#[must_use]
pub fn to_data_url(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{mime_type};base64,{}", BASE64.encode(bytes))
}

/// MIME type named by a data URL, `image/jpeg` otherwise.
#[must_use]
pub fn mime_from_data_url(s: &str) -> &str {
    s.strip_prefix("data:")
        .and_then(|rest| rest.split([';', ',']).next())
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_MIME)
}

/// Decode a data URL or bare base64 string into bytes and a MIME type.
pub fn decode_data_url(s: &str) -> Result<(Vec<u8>, String)> {
    let s = s.trim();
    let payload = if s.starts_with("data:") {
        s.split_once(',')
            .map(|(_, data)| data)
            .context("Data URL has no payload")?
    } else {
        s
    };
    let bytes = BASE64
        .decode(payload)
        .context("Image data is not valid base64")?;
    Ok((bytes, mime_from_data_url(s).to_string()))
}

#[must_use]
pub fn to_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 40, 40])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_calculate_new_dimensions() {
        assert_eq!(calculate_new_dimensions(1600, 1200, 800, 600), (800, 600));
        assert_eq!(calculate_new_dimensions(1000, 500, 800, 600), (800, 400));
        assert_eq!(calculate_new_dimensions(600, 1200, 800, 600), (300, 600));
        assert_eq!(calculate_new_dimensions(640, 480, 800, 600), (640, 480));
    }

    #[test]
    fn test_validate_image() {
        let bytes = png(4, 4);
        assert!(validate_image(&bytes, "image/png").is_ok());
        assert!(validate_image(&bytes, "image/gif").is_err());
        assert!(validate_image(&[], "image/png").is_err());
        let huge = vec![0u8; MAX_IMAGE_BYTES + 1];
        assert!(validate_image(&huge, "image/jpeg").is_err());
    }

    #[test]
    fn test_compress_fits_box_and_outputs_jpeg() {
        let out = compress(&png(1000, 500), MAX_WIDTH, MAX_HEIGHT, JPEG_QUALITY).unwrap();
        assert_eq!(detect_mime(&out), Some("image/jpeg"));
        let meta = metadata(&out).unwrap();
        assert_eq!((meta.width, meta.height), (800, 400));
    }

    #[test]
    fn test_crop_and_bounds() {
        let out = crop(&png(40, 30), 5, 5, 10, 20).unwrap();
        assert_eq!(detect_mime(&out), Some("image/png"));
        let meta = metadata(&out).unwrap();
        assert_eq!((meta.width, meta.height), (10, 20));

        assert!(crop(&png(40, 30), 35, 0, 10, 10).is_err());
        assert!(crop(&png(40, 30), 0, 0, 0, 10).is_err());
    }

    #[test]
    fn test_rotate_swaps_dimensions() {
        let out = rotate(&png(40, 30), 90).unwrap();
        let meta = metadata(&out).unwrap();
        assert_eq!((meta.width, meta.height), (30, 40));

        let out = rotate(&png(40, 30), -180).unwrap();
        assert_eq!(metadata(&out).unwrap().width, 40);

        assert_eq!(rotate(&png(4, 4), 360).unwrap(), png(4, 4));
        assert!(rotate(&png(4, 4), 45).is_err());
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(500), "500 B");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(10 * 1024 * 1024), "10 MB");
    }

    #[test]
    fn test_data_urls() {
        let bytes = png(2, 2);
        let url = to_data_url(&bytes, "image/png");
        assert!(url.starts_with("data:image/png;base64,"));
        let (decoded, mime) = decode_data_url(&url).unwrap();
        assert_eq!(decoded, bytes);
        assert_eq!(mime, "image/png");

        let (_, mime) = decode_data_url(&to_base64(&bytes)).unwrap();
        assert_eq!(mime, "image/jpeg");
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
        assert_eq!(mime_from_data_url("data:image/webp;base64,xx"), "image/webp");
        assert_eq!(mime_from_data_url("AAAA"), "image/jpeg");
    }

    #[test]
    fn test_detect_mime() {
        assert_eq!(detect_mime(&png(1, 1)), Some("image/png"));
        assert_eq!(detect_mime(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]), Some("image/jpeg"));
        assert_eq!(detect_mime(b"not an image"), None);
    }
}
