//! Synthetic image and frame data
//!
//! Deterministic content so tests and benchmarks can run offline without a
//! camera.

use crate::types::{Frame, MediaType};
use image::{Rgb, RgbImage};

/// Gradient image that shifts with `frame_number`, so consecutive frames
/// differ the way a panning camera's would.
pub fn synthetic_rgb_image(frame_number: u64, width: u32, height: u32) -> RgbImage {
    let base = (frame_number % 256) as u8;
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            base.wrapping_add((x % 256) as u8),
            base.wrapping_add((y % 256) as u8),
            base.wrapping_add(((x + y) % 256) as u8),
        ])
    })
}

/// Encoded-looking frame with a recognisable payload.
///
/// The payload is `size` bytes of `sequence as u8`; it is not a valid image,
/// which is fine for transport tests that never decode.
pub fn synthetic_frame(sequence: u64, size: usize) -> Frame {
    Frame::new(
        vec![(sequence % 256) as u8; size],
        MediaType::Webp.mime(),
        1_700_000_000_000 + sequence as i64,
    )
}

/// A run of frames with increasing timestamps.
pub fn synthetic_frames(count: usize, size: usize) -> Vec<Frame> {
    (0..count as u64).map(|i| synthetic_frame(i, size)).collect()
}
