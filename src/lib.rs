//! splatcam: camera capture, frame streaming and splat job pipeline
//!
//! This crate samples a live camera feed at a controlled rate, encodes the
//! frames, and delivers them to a reconstruction service that turns a room
//! scan into a 3D gaussian splat.
//!
//! # Features
//! - Rate-limited, non-overlapping frame sampling from a camera stream
//! - Bounded drop-oldest frame queue with immediate or batched delivery
//! - WebSocket streaming with an init handshake and header/payload framing
//! - Job submission, status polling and result download with cancellation
//! - Synthetic camera and recording doubles for offline testing
//!
//! # Usage
//! ```rust,ignore
//! use splatcam::job::{DiskArtifactSink, JobClient};
//! use splatcam::pipeline::JobCoordinator;
//! use std::sync::Arc;
//!
//! let client = JobClient::new("https://reconstruct.example.com")?;
//! let coordinator = JobCoordinator::new(client, Arc::new(DiskArtifactSink::new("./splats")));
//! let handle = coordinator.on_capture(frames).await?;
//! let phase = coordinator.wait_settled().await;
//! ```
pub mod capture;
pub mod config;
pub mod errors;
pub mod job;
pub mod pipeline;
pub mod platform;
pub mod timing;
pub mod transport;
pub mod types;
pub mod viewer;

// Testing utilities - synthetic data and recording doubles for offline testing
pub mod testing;

// Re-exports for convenience
pub use capture::{CaptureAdapter, FrameEncoder};
pub use config::SplatCamConfig;
pub use errors::SplatCamError;
pub use job::{JobClient, JobHandle, SplatArtifact};
pub use pipeline::{CaptureScreen, DeliveryMode, JobCoordinator, JobPhase};
pub use platform::{CameraBackend, CameraSystem};
pub use transport::{FrameTransport, StreamInit, StreamingConnection};
pub use types::{CaptureSettings, FacingMode, Frame, MediaType};

/// Initialize logging for the pipeline
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "splatcam=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        camera_backend: CameraSystem::default_backend().name().to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub camera_backend: String,
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_info() {
        let info = get_info();
        assert_eq!(info.name, "splatcam");
        assert!(!info.version.is_empty());
        assert!(!info.description.is_empty());
        assert!(!info.camera_backend.is_empty());
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
