//! Thumbnail codec.
//!
//! Thumbnails travel as base64 data URLs. [`decode`] turns an accepted data
//! URL back into image bytes and [`shrink_and_encode`] bounds an image and
//! wraps it as a data URL again.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops::FilterType, DynamicImage, ImageFormat};

use crate::errors::PipelineError;

/// Data-URL prefix of JPEG thumbnails.
pub const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Data-URL prefix of PNG thumbnails.
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

const ACCEPTED_PREFIXES: [&str; 2] = [JPEG_DATA_URL_PREFIX, PNG_DATA_URL_PREFIX];

/// Bounding box for generated thumbnails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailConfig {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_width: 150,
            max_height: 150,
        }
    }
}

/// Strip an accepted data-URL prefix and base64-decode the rest.
pub fn decode(payload: &str) -> Result<Vec<u8>, PipelineError> {
    let body = ACCEPTED_PREFIXES
        .iter()
        .find_map(|prefix| payload.strip_prefix(prefix))
        .ok_or_else(|| {
            let head: String = payload.chars().take(32).collect();
            PipelineError::unrecognized_payload(format!("expected an image data URL, got {head:?}"))
        })?;

    STANDARD
        .decode(body.trim())
        .map_err(|e| PipelineError::image(format!("invalid base64 body: {e}")))
}

/// Bound an image to `max_width` x `max_height` and wrap it as a data URL.
///
/// Images that already fit are re-wrapped byte-for-byte when they are JPEG or
/// PNG. Larger images are downsampled with Lanczos3, preserving the aspect
/// ratio, and re-encoded as JPEG. Any other format is re-encoded as JPEG.
pub fn shrink_and_encode(
    bytes: &[u8],
    max_width: u32,
    max_height: u32,
) -> Result<String, PipelineError> {
    if max_width == 0 || max_height == 0 {
        return Err(PipelineError::image(format!(
            "invalid thumbnail bounds {max_width}x{max_height}"
        )));
    }

    let format = image::guess_format(bytes).map_err(|e| PipelineError::image(e.to_string()))?;
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| PipelineError::image(e.to_string()))?;

    if img.width() <= max_width && img.height() <= max_height {
        return match format {
            ImageFormat::Jpeg => Ok(wrap(JPEG_DATA_URL_PREFIX, bytes)),
            ImageFormat::Png => Ok(wrap(PNG_DATA_URL_PREFIX, bytes)),
            _ => encode_jpeg(&img),
        };
    }

    encode_jpeg(&img.resize(max_width, max_height, FilterType::Lanczos3))
}

fn encode_jpeg(img: &DynamicImage) -> Result<String, PipelineError> {
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, ImageFormat::Jpeg)
        .map_err(|e| PipelineError::image(e.to_string()))?;
    Ok(wrap(JPEG_DATA_URL_PREFIX, out.get_ref()))
}

fn wrap(prefix: &str, bytes: &[u8]) -> String {
    let mut url = String::with_capacity(prefix.len() + bytes.len() * 4 / 3 + 4);
    url.push_str(prefix);
    STANDARD.encode_string(bytes, &mut url);
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{encoded_image, gradient};

    #[test]
    fn test_decode_rejects_unknown_prefix() {
        let result = decode("data:image/webp;base64,AAAA");
        assert!(matches!(result, Err(PipelineError::UnrecognizedPayloadFormat(_))));

        let result = decode("not a data url");
        assert!(matches!(result, Err(PipelineError::UnrecognizedPayloadFormat(_))));
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        let result = decode("data:image/png;base64,%%%");
        assert!(matches!(result, Err(PipelineError::ImageCodec(_))));
    }

    #[test]
    fn test_image_within_bounds_is_pixel_identical() {
        let original = gradient(120, 80);
        let png = encoded_image(&original, ImageFormat::Png);

        let url = shrink_and_encode(&png, 150, 150).unwrap();
        assert!(url.starts_with(PNG_DATA_URL_PREFIX));

        let bytes = decode(&url).unwrap();
        assert_eq!(bytes, png);
        let roundtrip = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(roundtrip, original);
    }

    #[test]
    fn test_large_image_is_bounded_and_keeps_aspect_ratio() {
        let png = encoded_image(&gradient(600, 300), ImageFormat::Png);

        let url = shrink_and_encode(&png, 150, 150).unwrap();
        assert!(url.starts_with(JPEG_DATA_URL_PREFIX));

        let shrunk = image::load_from_memory(&decode(&url).unwrap()).unwrap();
        assert_eq!((shrunk.width(), shrunk.height()), (150, 75));
    }

    #[test]
    fn test_tall_image_is_bounded_by_height() {
        let jpeg = encoded_image(&gradient(200, 1000), ImageFormat::Jpeg);

        let url = shrink_and_encode(&jpeg, 150, 150).unwrap();
        let shrunk = image::load_from_memory(&decode(&url).unwrap()).unwrap();
        assert!(shrunk.width() <= 150 && shrunk.height() <= 150);
        assert_eq!((shrunk.width(), shrunk.height()), (30, 150));
    }

    #[test]
    fn test_shrink_is_idempotent() {
        let png = encoded_image(&gradient(400, 400), ImageFormat::Png);

        let once = shrink_and_encode(&png, 150, 150).unwrap();
        let twice = shrink_and_encode(&decode(&once).unwrap(), 150, 150).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_other_formats_are_reencoded_as_jpeg() {
        let gif = encoded_image(&gradient(40, 40), ImageFormat::Gif);

        let url = shrink_and_encode(&gif, 150, 150).unwrap();
        assert!(url.starts_with(JPEG_DATA_URL_PREFIX));
        assert!(decode(&url).is_ok());
    }

    #[test]
    fn test_garbage_bytes_are_a_codec_error() {
        let result = shrink_and_encode(b"definitely not an image", 150, 150);
        assert!(matches!(result, Err(PipelineError::ImageCodec(_))));
    }
}
