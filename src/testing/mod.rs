//! Testing utilities for splatcam
//!
//! Synthetic frames plus recording doubles for the channel and preview
//! seams, so the pipeline can be exercised offline without a camera or a
//! reconstruction service.

pub mod recording;
pub mod synthetic_data;

pub use recording::{PreviewEvent, RecordingChannel, RecordingPreview};
pub use synthetic_data::{synthetic_frame, synthetic_frames, synthetic_rgb_image};
