//! Camera backends
//!
//! A backend hands out a live [`VideoStream`] for a [`StreamRequest`]. All
//! calls here are blocking; the capture adapter drives them from
//! `spawn_blocking`.

#[cfg(feature = "native-camera")]
pub mod native;
pub mod synthetic;

use crate::errors::SplatCamError;
use crate::types::FacingMode;
use image::RgbImage;
use std::sync::Arc;

#[cfg(feature = "native-camera")]
pub use native::NativeCamera;
pub use synthetic::SyntheticCamera;

/// Camera stream constraints, mirroring a `getUserMedia` video request.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

/// A live device stream.
pub trait VideoStream: Send {
    /// Grab the current video frame.
    fn read_frame(&mut self) -> Result<RgbImage, SplatCamError>;

    /// Release every track held by the stream. Must be idempotent.
    fn stop(&mut self);

    /// Human-readable name of the device backing the stream.
    fn label(&self) -> String;
}

/// Something that can open camera streams.
pub trait CameraBackend: Send + Sync {
    fn acquire(&self, request: &StreamRequest) -> Result<Box<dyn VideoStream>, SplatCamError>;

    fn name(&self) -> &str;
}

pub struct CameraSystem;

impl CameraSystem {
    /// Hardware backend when compiled with `native-camera`, synthetic otherwise.
    pub fn default_backend() -> Arc<dyn CameraBackend> {
        #[cfg(feature = "native-camera")]
        {
            Arc::new(NativeCamera::new())
        }
        #[cfg(not(feature = "native-camera"))]
        {
            log::info!("Built without native-camera, using synthetic camera backend");
            Arc::new(SyntheticCamera::new())
        }
    }

    pub fn synthetic() -> Arc<dyn CameraBackend> {
        Arc::new(SyntheticCamera::new())
    }
}
