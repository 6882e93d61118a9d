//! Frame rasterisation and still-image encoding

use crate::errors::SplatCamError;
use crate::types::{FrameEncoding, MediaType};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, RgbImage};

/// Largest raster edge the encoder will produce.
pub const MAX_DIMENSION: u32 = 8192;

/// Draws device frames into a raster of the target size and encodes them.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEncoder {
    width: u32,
    height: u32,
    encoding: FrameEncoding,
}

impl FrameEncoder {
    pub fn new(width: u32, height: u32, encoding: FrameEncoding) -> Self {
        Self {
            width: width.clamp(1, MAX_DIMENSION),
            height: height.clamp(1, MAX_DIMENSION),
            encoding,
        }
    }

    pub fn mime(&self) -> &'static str {
        self.encoding.media_type.mime()
    }

    /// Stretch `image` onto the target raster and encode it.
    pub fn encode(&self, image: &RgbImage) -> Result<Bytes, SplatCamError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(SplatCamError::Encode("empty source frame".to_string()));
        }

        let raster = if image.dimensions() == (self.width, self.height) {
            None
        } else {
            Some(imageops::resize(
                image,
                self.width,
                self.height,
                FilterType::Triangle,
            ))
        };
        let raster = raster.as_ref().unwrap_or(image);

        let mut out = Vec::with_capacity(capacity_hint(self.width, self.height));
        match self.encoding.media_type {
            MediaType::Jpeg => {
                JpegEncoder::new_with_quality(&mut out, jpeg_quality(self.encoding.quality))
                    .write_image(
                        raster.as_raw(),
                        self.width,
                        self.height,
                        ExtendedColorType::Rgb8,
                    )
                    .map_err(|e| SplatCamError::Encode(format!("JPEG encoding failed: {}", e)))?;
            }
            MediaType::Webp => {
                // image only ships a lossless WebP encoder; quality does not apply.
                WebPEncoder::new_lossless(&mut out)
                    .write_image(
                        raster.as_raw(),
                        self.width,
                        self.height,
                        ExtendedColorType::Rgb8,
                    )
                    .map_err(|e| SplatCamError::Encode(format!("WebP encoding failed: {}", e)))?;
            }
        }

        Ok(Bytes::from(out))
    }
}

/// Initial output buffer size: a quarter of the pixel count.
fn capacity_hint(width: u32, height: u32) -> usize {
    (width as usize).saturating_mul(height as usize) / 4
}

/// Map a `0.0..=1.0` quality factor onto JPEG's `1..=100` scale.
pub fn jpeg_quality(quality: f32) -> u8 {
    if !quality.is_finite() {
        return 70;
    }
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}
