//! Synthetic camera backend
//!
//! Produces moving gradient frames without hardware. Failures and read
//! latency can be injected to exercise the adapter's error and tick-skipping
//! paths.

use super::{CameraBackend, StreamRequest, VideoStream};
use crate::errors::SplatCamError;
use crate::testing::synthetic_data::synthetic_rgb_image;
use image::RgbImage;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicU64,
    released: AtomicU64,
    reads: AtomicU64,
}

/// Camera backend that renders frames in memory.
#[derive(Debug, Clone, Default)]
pub struct SyntheticCamera {
    native_size: Option<(u32, u32)>,
    read_delay: Duration,
    fail_acquire: Option<String>,
    fail_reads: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolution the fake sensor produces, regardless of the request.
    pub fn with_native_size(mut self, width: u32, height: u32) -> Self {
        self.native_size = Some((width, height));
        self
    }

    /// Block every frame read for `delay`.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Make `acquire` fail with the given message.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_acquire = Some(message.into());
        self
    }

    /// Toggle read failures on streams handed out by this backend.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn acquired_count(&self) -> u64 {
        self.counters.acquired.load(Ordering::SeqCst)
    }

    pub fn released_count(&self) -> u64 {
        self.counters.released.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> u64 {
        self.counters.reads.load(Ordering::SeqCst)
    }
}

impl CameraBackend for SyntheticCamera {
    fn acquire(&self, request: &StreamRequest) -> Result<Box<dyn VideoStream>, SplatCamError> {
        if let Some(message) = &self.fail_acquire {
            return Err(SplatCamError::Device(message.clone()));
        }

        let (width, height) = self
            .native_size
            .unwrap_or((request.ideal_width.max(1), request.ideal_height.max(1)));

        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        log::debug!(
            "Synthetic camera acquired {}x{} ({:?} facing)",
            width,
            height,
            request.facing
        );

        Ok(Box::new(SyntheticStream {
            width,
            height,
            frame_number: 0,
            read_delay: self.read_delay,
            fail_reads: self.fail_reads.clone(),
            counters: self.counters.clone(),
            stopped: false,
        }))
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

struct SyntheticStream {
    width: u32,
    height: u32,
    frame_number: u64,
    read_delay: Duration,
    fail_reads: Arc<AtomicBool>,
    counters: Arc<Counters>,
    stopped: bool,
}

impl VideoStream for SyntheticStream {
    fn read_frame(&mut self) -> Result<RgbImage, SplatCamError> {
        if self.stopped {
            return Err(SplatCamError::Device("stream stopped".to_string()));
        }
        if !self.read_delay.is_zero() {
            std::thread::sleep(self.read_delay);
        }
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SplatCamError::Encode("synthetic read failure".to_string()));
        }

        let image = synthetic_rgb_image(self.frame_number, self.width, self.height);
        self.frame_number += 1;
        Ok(image)
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.counters.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn label(&self) -> String {
        format!("Synthetic camera {}x{}", self.width, self.height)
    }
}
