//! Image codec for the fallback storage path
//!
//! Converts a raw upload into a transportable text payload (bounded
//! downscale, lossy JPEG re-encode, base64 data URL) and back into a
//! displayable byte buffer. Pure transforms, no I/O.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::GenericImageView;

use crate::errors::CodecError;

/// Compression bounds applied before an image is inlined into a fallback
/// backend. Injected from configuration.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality, 1-100.
    pub quality: u8,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            max_width: 800,
            max_height: 600,
            quality: 70,
        }
    }
}

/// Decoded image bytes suitable for immediate display. Owned by the caller;
/// dropping it releases the buffer.
#[derive(Debug)]
pub struct DisplayImage {
    mime_type: String,
    bytes: Vec<u8>,
}

impl DisplayImage {
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Decode `data`, scale it down so neither dimension exceeds the configured
/// bounds (aspect ratio preserved, never upscaled), re-encode as JPEG and
/// serialize as a self-describing data URL.
pub fn encode_to_data_url(data: &[u8], options: &EncodeOptions) -> Result<String, CodecError> {
    let img = image::load_from_memory(data)
        .map_err(|e| CodecError::Encode(format!("unsupported source image: {}", e)))?;

    let (width, height) = img.dimensions();
    let (target_width, target_height) =
        fit_within(width, height, options.max_width, options.max_height);

    let img = if (target_width, target_height) != (width, height) {
        let filter = select_filter(width, height, target_width, target_height);
        img.resize_exact(target_width, target_height, filter)
    } else {
        img
    };

    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, options.quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| CodecError::Encode(e.to_string()))?;

    Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(&jpeg)))
}

/// Parse the media type and raw bytes back out of a data URL produced by
/// `encode_to_data_url` (or stored by either fallback backend).
pub fn decode_to_displayable(data_url: &str) -> Result<DisplayImage, CodecError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| CodecError::Decode("missing data: prefix".to_string()))?;

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| CodecError::Decode("missing payload separator".to_string()))?;

    let mime_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| CodecError::Decode("payload is not base64-encoded".to_string()))?;
    if mime_type.is_empty() {
        return Err(CodecError::Decode("empty media type".to_string()));
    }

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| CodecError::Decode(format!("invalid base64 payload: {}", e)))?;

    Ok(DisplayImage {
        mime_type: mime_type.to_string(),
        bytes,
    })
}

/// Largest (w, h) with the source aspect ratio that fits inside the bounds.
/// Images already inside the bounds are returned unchanged.
fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let width_scale = max_width as f64 / width as f64;
    let height_scale = max_height as f64 / height as f64;
    let scale = width_scale.min(height_scale);

    let target_width = ((width as f64 * scale).round() as u32).max(1);
    let target_height = ((height as f64 * scale).round() as u32).max(1);
    (target_width.min(max_width), target_height.min(max_height))
}

/// Pick a resampling filter by downscale ratio: cheap filters for heavy
/// reductions, sharper ones near 1:1.
fn select_filter(width: u32, height: u32, new_width: u32, new_height: u32) -> FilterType {
    let width_ratio = width as f32 / new_width as f32;
    let height_ratio = height as f32 / new_height as f32;
    let max_ratio = width_ratio.max(height_ratio);

    if max_ratio > 2.0 {
        FilterType::Triangle
    } else if max_ratio > 1.5 {
        FilterType::CatmullRom
    } else {
        FilterType::Lanczos3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_within_keeps_small_images_untouched() {
        assert_eq!(fit_within(640, 480, 800, 600), (640, 480));
        assert_eq!(fit_within(800, 600, 800, 600), (800, 600));
    }

    #[test]
    fn fit_within_bounds_both_dimensions() {
        let (w, h) = fit_within(1600, 1200, 800, 600);
        assert_eq!((w, h), (800, 600));

        // Tall image is constrained by height
        let (w, h) = fit_within(600, 2400, 800, 600);
        assert_eq!(h, 600);
        assert_eq!(w, 150);
    }

    #[test]
    fn fit_within_never_produces_zero() {
        let (w, h) = fit_within(10_000, 1, 800, 600);
        assert!(w >= 1 && h >= 1);
    }

    #[test]
    fn decode_rejects_malformed_payloads() {
        assert!(decode_to_displayable("not a data url").is_err());
        assert!(decode_to_displayable("data:image/jpeg;base64").is_err());
        assert!(decode_to_displayable("data:image/jpeg,plain").is_err());
        assert!(decode_to_displayable("data:image/jpeg;base64,!!!not-base64!!!").is_err());
    }

    #[test]
    fn decode_extracts_mime_type_and_bytes() {
        let url = format!("data:image/png;base64,{}", BASE64.encode(b"pngbytes"));
        let display = decode_to_displayable(&url).unwrap();
        assert_eq!(display.mime_type(), "image/png");
        assert_eq!(display.as_bytes(), b"pngbytes");
    }

    #[test]
    fn encode_rejects_non_image_bytes() {
        let err = encode_to_data_url(b"definitely not an image", &EncodeOptions::default());
        assert!(matches!(err, Err(CodecError::Encode(_))));
    }

    #[test]
    fn filter_hardens_with_ratio() {
        assert!(matches!(select_filter(3200, 2400, 800, 600), FilterType::Triangle));
        assert!(matches!(select_filter(1400, 1050, 800, 600), FilterType::CatmullRom));
        assert!(matches!(select_filter(900, 675, 800, 600), FilterType::Lanczos3));
    }
}
