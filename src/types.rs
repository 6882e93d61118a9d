//! Core data types shared by the capture and delivery pipeline.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lower bound on the sampling interval, whatever the requested rate.
pub const MIN_SAMPLING_INTERVAL_MS: u64 = 50;

/// Which camera the device should prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera, facing the user.
    User,
    /// Rear camera, facing the scene.
    #[default]
    Environment,
}

/// Container format of encoded frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MediaType {
    #[default]
    #[serde(rename = "image/webp")]
    Webp,
    #[serde(rename = "image/jpeg")]
    Jpeg,
}

impl MediaType {
    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Webp => "image/webp",
            MediaType::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaType::Webp => "webp",
            MediaType::Jpeg => "jpg",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/webp" => Some(MediaType::Webp),
            "image/jpeg" | "image/jpg" => Some(MediaType::Jpeg),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "webp" => Some(MediaType::Webp),
            "jpg" | "jpeg" => Some(MediaType::Jpeg),
            _ => None,
        }
    }
}

/// Target encoding for sampled frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameEncoding {
    pub media_type: MediaType,
    /// Compression quality in `0.0..=1.0`.
    pub quality: f32,
}

impl Default for FrameEncoding {
    fn default() -> Self {
        Self {
            media_type: MediaType::Webp,
            quality: 0.7,
        }
    }
}

/// Attributes of one capture session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Desired sample rate in frames per second.
    pub fps: u32,
    pub encoding: FrameEncoding,
    pub width: u32,
    pub height: u32,
    pub facing: FacingMode,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            fps: 5,
            encoding: FrameEncoding::default(),
            width: 1280,
            height: 720,
            facing: FacingMode::Environment,
        }
    }
}

impl CaptureSettings {
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_encoding(mut self, media_type: MediaType, quality: f32) -> Self {
        self.encoding = FrameEncoding {
            media_type,
            quality,
        };
        self
    }

    pub fn with_facing(mut self, facing: FacingMode) -> Self {
        self.facing = facing;
        self
    }

    /// Time between two sampling ticks.
    pub fn sampling_interval(&self) -> Duration {
        sampling_interval_for(self.fps)
    }
}

/// `max(50ms, floor(1000ms / max(1, fps)))`
pub fn sampling_interval_for(fps: u32) -> Duration {
    let per_frame = 1000 / u64::from(fps.max(1));
    Duration::from_millis(per_frame.max(MIN_SAMPLING_INTERVAL_MS))
}

/// One sampled, encoded still image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Bytes,
    /// Declared media type, e.g. `image/webp`.
    pub mime: String,
    /// Wall-clock milliseconds since the Unix epoch at emission.
    pub timestamp_ms: i64,
}

impl Frame {
    pub fn new(data: impl Into<Bytes>, mime: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            data: data.into(),
            mime: mime.into(),
            timestamp_ms,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// File extension matching the declared media type.
    pub fn extension(&self) -> &'static str {
        MediaType::from_mime(&self.mime)
            .map(|m| m.extension())
            .unwrap_or("bin")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_interval_floor() {
        assert_eq!(sampling_interval_for(5), Duration::from_millis(200));
        assert_eq!(sampling_interval_for(3), Duration::from_millis(333));
        assert_eq!(sampling_interval_for(30), Duration::from_millis(50));
        assert_eq!(sampling_interval_for(120), Duration::from_millis(50));
        assert_eq!(sampling_interval_for(0), Duration::from_millis(1000));
    }

    #[test]
    fn test_default_settings_match_capture_screen() {
        let settings = CaptureSettings::default();
        assert_eq!(settings.fps, 5);
        assert_eq!(settings.encoding.media_type, MediaType::Webp);
        assert_eq!(settings.facing, FacingMode::Environment);
        assert_eq!(settings.sampling_interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_media_type_parsing() {
        assert_eq!(MediaType::from_mime("IMAGE/JPEG"), Some(MediaType::Jpeg));
        assert_eq!(MediaType::from_extension(".webp"), Some(MediaType::Webp));
        assert_eq!(MediaType::from_extension("png"), None);
    }

    #[test]
    fn test_frame_extension() {
        let frame = Frame::new(vec![1u8, 2, 3], "image/jpeg", 0);
        assert_eq!(frame.size(), 3);
        assert_eq!(frame.extension(), "jpg");
        assert_eq!(Frame::new(Vec::new(), "text/plain", 0).extension(), "bin");
    }

    #[test]
    fn test_media_type_serde_uses_mime() {
        let json = serde_json::to_string(&MediaType::Jpeg).unwrap();
        assert_eq!(json, "\"image/jpeg\"");
        let facing: FacingMode = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(facing, FacingMode::User);
    }
}
