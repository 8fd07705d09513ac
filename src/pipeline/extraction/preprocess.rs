//! Image size ceiling for the vision path.
//!
//! Vision backends reject or silently truncate large payloads, so every image
//! is brought under a configured byte ceiling before it is sent. Images that
//! already fit pass through untouched; larger ones are orientation-corrected,
//! recompressed as JPEG and scaled down until they fit.

use std::borrow::Cow;
use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};

use super::ExtractionError;

/// Quality of the first recompression, before any scaling.
const FIRST_PASS_QUALITY: u8 = 95;

/// Quality used once the image is being scaled.
const SHRINK_QUALITY: u8 = 85;

/// Upper bound on scale-and-encode rounds.
const MAX_ROUNDS: usize = 8;

/// Each round shrinks by at least this factor so the loop always progresses.
const MAX_SCALE_PER_ROUND: f64 = 0.9;

pub struct ImageDownscaler {
    max_bytes: usize,
}

impl ImageDownscaler {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Return `bytes` unchanged if under the ceiling, otherwise a smaller JPEG.
    pub fn fit<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, [u8]>, ExtractionError> {
        if bytes.len() <= self.max_bytes {
            return Ok(Cow::Borrowed(bytes));
        }

        let decoded = image::load_from_memory(bytes)
            .map_err(|e| ExtractionError::ImageProcessing(format!("decode failed: {e}")))?;
        let oriented = apply_orientation(decoded, read_exif_orientation(bytes));
        let mut img = DynamicImage::ImageRgb8(oriented.to_rgb8());

        let mut encoded = encode_jpeg(&img, FIRST_PASS_QUALITY)?;
        let mut rounds = 0;
        while encoded.len() > self.max_bytes && rounds < MAX_ROUNDS {
            let scale = (self.max_bytes as f64 / encoded.len() as f64)
                .sqrt()
                .min(MAX_SCALE_PER_ROUND);
            let (w, h) = img.dimensions();
            let new_w = ((w as f64 * scale) as u32).max(1);
            let new_h = ((h as f64 * scale) as u32).max(1);
            img = img.resize_exact(new_w, new_h, FilterType::Lanczos3);
            encoded = encode_jpeg(&img, SHRINK_QUALITY)?;
            rounds += 1;
        }

        if encoded.len() > self.max_bytes {
            tracing::warn!(
                size = encoded.len(),
                limit = self.max_bytes,
                "Image still above size ceiling after downscaling"
            );
        } else {
            tracing::debug!(
                original = bytes.len(),
                resized = encoded.len(),
                rounds,
                "Image downscaled under size ceiling"
            );
        }

        Ok(Cow::Owned(encoded))
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ExtractionError> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageOutputFormat::Jpeg(quality))
        .map_err(|e| ExtractionError::ImageProcessing(format!("JPEG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

/// Read EXIF orientation tag from raw image bytes.
/// Returns 1 (normal) if no EXIF data or tag not present.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Apply an EXIF orientation (1-8) so the image reads upright.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}
