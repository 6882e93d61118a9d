use super::{CameraBackend, StreamRequest, VideoStream};
use crate::errors::SplatCamError;
use crate::types::FacingMode;
use image::RgbImage;
use nokhwa::{
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraFormat, CameraIndex, CameraInfo, FrameFormat, RequestedFormat,
        RequestedFormatType, Resolution,
    },
    CallbackCamera,
};

const FRONT_HINTS: &[&str] = &["front", "user", "facetime", "integrated"];
const REAR_HINTS: &[&str] = &["back", "rear", "environment", "world"];

/// Hardware camera backend built on nokhwa's native input.
#[derive(Debug, Default)]
pub struct NativeCamera;

impl NativeCamera {
    pub fn new() -> Self {
        Self
    }
}

/// Pick the device whose name best matches the facing preference.
///
/// Falls back to the first device when no name carries a hint.
fn select_device(devices: &[CameraInfo], facing: FacingMode) -> Option<CameraIndex> {
    let hints = match facing {
        FacingMode::User => FRONT_HINTS,
        FacingMode::Environment => REAR_HINTS,
    };

    devices
        .iter()
        .find(|info| {
            let name = info.human_name().to_ascii_lowercase();
            hints.iter().any(|hint| name.contains(hint))
        })
        .or_else(|| devices.first())
        .map(|info| info.index().clone())
}

impl CameraBackend for NativeCamera {
    fn acquire(&self, request: &StreamRequest) -> Result<Box<dyn VideoStream>, SplatCamError> {
        let devices = query(ApiBackend::Auto)
            .map_err(|e| SplatCamError::Device(format!("Failed to query cameras: {}", e)))?;

        let index = select_device(&devices, request.facing)
            .ok_or_else(|| SplatCamError::Device("No camera devices found".to_string()))?;

        let closest = CameraFormat::new(
            Resolution::new(request.ideal_width, request.ideal_height),
            FrameFormat::MJPEG,
            30,
        );
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(closest));

        let mut camera = CallbackCamera::new(index.clone(), requested, |_| {}).map_err(|e| {
            SplatCamError::Device(format!("Failed to initialize camera: {}", e))
        })?;

        camera
            .open_stream()
            .map_err(|e| SplatCamError::Device(format!("Failed to start stream: {}", e)))?;

        let label = camera
            .info()
            .map(|info| info.human_name())
            .unwrap_or_else(|_| format!("camera {}", index));

        log::info!("Opened native camera stream on {}", label);

        Ok(Box::new(NativeStream {
            camera,
            label,
            stopped: false,
        }))
    }

    fn name(&self) -> &str {
        "native"
    }
}

struct NativeStream {
    camera: CallbackCamera,
    label: String,
    stopped: bool,
}

impl VideoStream for NativeStream {
    fn read_frame(&mut self) -> Result<RgbImage, SplatCamError> {
        if self.stopped {
            return Err(SplatCamError::Device("stream stopped".to_string()));
        }

        let buffer = self
            .camera
            .poll_frame()
            .map_err(|e| SplatCamError::Device(format!("Failed to capture frame: {}", e)))?;

        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| SplatCamError::Encode(format!("Failed to decode frame: {}", e)))?;

        let (width, height) = (decoded.width(), decoded.height());
        RgbImage::from_raw(width, height, decoded.into_raw())
            .ok_or_else(|| SplatCamError::Encode("Decoded frame has wrong size".to_string()))
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Err(e) = self.camera.stop_stream() {
            log::warn!("Failed to stop camera stream {}: {}", self.label, e);
        }
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}

impl Drop for NativeStream {
    fn drop(&mut self) {
        self.stop();
    }
}
