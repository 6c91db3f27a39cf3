//! Image preparation before a vision model call
//!
//! Phone photos of receipts are routinely 12+ megapixels. Vision APIs bill and
//! time out by image size, and anything past ~2000 px on the long edge adds no
//! legibility, so uploads are decoded, downscaled and re-encoded as JPEG.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};

/// Default bound for the longest image edge, in pixels
pub const DEFAULT_MAX_DIMENSION: u32 = 2048;

/// Default JPEG quality for re-encoded images
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// An upload normalized for the model API
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Encoded image bytes
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
    /// SHA-256 of the original upload (hex), for log correlation
    pub fingerprint: String,
}

impl PreparedImage {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:` URL form used by OpenAI-style image parts
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

/// Decodes, bounds and re-encodes uploaded images
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ImagePreprocessor {
    pub fn new(max_dimension: u32, jpeg_quality: u8) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// Decode `bytes`, shrink to fit `max_dimension`, and re-encode as JPEG
    ///
    /// Images already within bounds keep their size; nothing is upscaled.
    pub fn prepare(&self, bytes: &[u8]) -> Result<PreparedImage> {
        if bytes.is_empty() {
            return Err(Error::ImageProcessing("empty image data".into()));
        }

        let fingerprint = fingerprint(bytes);
        let img = image::load_from_memory(bytes)?;
        let (orig_width, orig_height) = (img.width(), img.height());

        let img = if orig_width.max(orig_height) > self.max_dimension {
            img.resize(self.max_dimension, self.max_dimension, FilterType::Lanczos3)
        } else {
            img
        };

        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let mut buf = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buf, self.jpeg_quality);
        rgb.write_with_encoder(encoder)?;

        debug!(
            fingerprint = %fingerprint,
            original = %format!("{}x{}", orig_width, orig_height),
            prepared = %format!("{}x{}", rgb.width(), rgb.height()),
            input_bytes = bytes.len(),
            output_bytes = buf.len(),
            "Prepared receipt image"
        );

        Ok(PreparedImage {
            bytes: buf,
            mime_type: "image/jpeg",
            width: rgb.width(),
            height: rgb.height(),
            fingerprint,
        })
    }
}

/// SHA-256 of the raw bytes as lowercase hex
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Guess an image MIME type from magic bytes
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Tiff => Some("image/tiff"),
        _ => None,
    }
}
