//! Capture screen orchestration.
//!
//! One screen owns one capture adapter and routes its frames either into a
//! small batch that is submitted as a job when capture stops, or straight
//! onto a streaming connection that is closed when capture stops.

use super::coordinator::JobCoordinator;
use crate::capture::{CaptureAdapter, PreviewSurface};
use crate::errors::SplatCamError;
use crate::job::{JobHandle, MAX_UPLOAD_FRAMES};
use crate::platform::CameraBackend;
use crate::timing::SharedClock;
use crate::transport::{StreamInit, StreamOptions, StreamingConnection, TransportStats};
use crate::types::{CaptureSettings, Frame};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Where captured frames go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Keep the first frames and submit them as a job on stop.
    #[default]
    Batch,
    /// Stream every frame over a WebSocket while capturing.
    Stream,
}

impl std::str::FromStr for DeliveryMode {
    type Err = SplatCamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "batch" => Ok(DeliveryMode::Batch),
            "stream" => Ok(DeliveryMode::Stream),
            other => Err(SplatCamError::InvalidInput(format!(
                "unknown delivery mode: {}",
                other
            ))),
        }
    }
}

/// Shopping context the screen was opened with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenContext {
    pub category: Option<String>,
    pub surprise: bool,
    pub product_ids: Vec<String>,
}

impl ScreenContext {
    fn stream_init(&self, session_id: String) -> StreamInit {
        let mut init = StreamInit::new(session_id).with_surprise(self.surprise);
        if let Some(category) = &self.category {
            init = init.with_category(category.clone());
        }
        if !self.product_ids.is_empty() {
            init = init.with_product_ids(self.product_ids.clone());
        }
        init
    }
}

#[derive(Debug, Clone)]
pub struct ScreenOptions {
    pub mode: DeliveryMode,
    /// Frames kept for a batch submission.
    pub upload_frames: usize,
    /// WebSocket endpoint used in stream mode.
    pub stream_url: Option<String>,
    pub stream: StreamOptions,
}

impl Default for ScreenOptions {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::Batch,
            upload_frames: MAX_UPLOAD_FRAMES,
            stream_url: None,
            stream: StreamOptions::default(),
        }
    }
}

/// What stopping a capture produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// Not capturing.
    Idle,
    /// Batch mode stopped before any frame was sampled.
    NothingCaptured,
    Submitted(JobHandle),
    Streamed(TransportStats),
}

/// Frame routing shared with the adapter callback.
#[derive(Default)]
struct FrameRouter {
    collected: Mutex<Vec<Frame>>,
    limit: usize,
    stream: Mutex<Option<Arc<StreamingConnection>>>,
}

impl FrameRouter {
    fn route(&self, frame: Frame) {
        let stream = self.stream.lock().expect("lock poisoned").clone();
        if let Some(stream) = stream {
            stream.enqueue_frame(frame);
            return;
        }

        let mut collected = self.collected.lock().expect("lock poisoned");
        if collected.len() < self.limit {
            log::debug!("Collected frame {} for upload", collected.len() + 1);
            collected.push(frame);
        }
    }

    fn take_collected(&self) -> Vec<Frame> {
        std::mem::take(&mut *self.collected.lock().expect("lock poisoned"))
    }

    fn take_stream(&self) -> Option<Arc<StreamingConnection>> {
        self.stream.lock().expect("lock poisoned").take()
    }
}

/// A capture screen: preview, record, deliver.
pub struct CaptureScreen {
    adapter: CaptureAdapter,
    coordinator: JobCoordinator,
    options: ScreenOptions,
    context: ScreenContext,
    router: Arc<FrameRouter>,
}

impl CaptureScreen {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        settings: CaptureSettings,
        preview: impl PreviewSurface + 'static,
        coordinator: JobCoordinator,
        options: ScreenOptions,
        context: ScreenContext,
    ) -> Self {
        Self::with_clock(
            backend,
            settings,
            preview,
            coordinator,
            options,
            context,
            crate::timing::system_clock(),
        )
    }

    pub fn with_clock(
        backend: Arc<dyn CameraBackend>,
        settings: CaptureSettings,
        preview: impl PreviewSurface + 'static,
        coordinator: JobCoordinator,
        options: ScreenOptions,
        context: ScreenContext,
        clock: SharedClock,
    ) -> Self {
        let router = Arc::new(FrameRouter {
            limit: options.upload_frames.max(1),
            ..Default::default()
        });
        let frame_router = router.clone();
        let adapter = CaptureAdapter::builder(backend)
            .settings(settings)
            .preview(preview)
            .clock(clock)
            .on_frame(move |frame| frame_router.route(frame))
            .build();

        Self {
            adapter,
            coordinator,
            options,
            context,
            router,
        }
    }

    pub fn adapter(&self) -> &CaptureAdapter {
        &self.adapter
    }

    pub fn coordinator(&self) -> &JobCoordinator {
        &self.coordinator
    }

    pub fn mode(&self) -> DeliveryMode {
        self.options.mode
    }

    pub fn is_recording(&self) -> bool {
        self.adapter.is_capturing()
    }

    /// Open the camera preview; in stream mode also connect the stream.
    pub async fn enter(&self) -> Result<(), SplatCamError> {
        self.adapter.open_preview().await?;
        if self.options.mode == DeliveryMode::Stream {
            self.connect_stream().await?;
        }
        Ok(())
    }

    async fn connect_stream(&self) -> Result<(), SplatCamError> {
        let existing = self.router.stream.lock().expect("lock poisoned").clone();
        if let Some(stream) = existing {
            if !stream.is_closed() {
                return stream.open().await;
            }
        }

        let url = self.options.stream_url.clone().ok_or_else(|| {
            SplatCamError::Config("stream mode requires a stream URL".to_string())
        })?;
        let session_id = uuid::Uuid::new_v4().to_string();
        let stream = Arc::new(StreamingConnection::new(
            url,
            self.context.stream_init(session_id),
            self.options.stream,
        ));
        stream.open().await?;
        *self.router.stream.lock().expect("lock poisoned") = Some(stream);
        Ok(())
    }

    /// Start recording. Returns `false` when already recording or when the
    /// preview is not open.
    pub async fn start(&self) -> Result<bool, SplatCamError> {
        if self.adapter.is_capturing() {
            return Ok(false);
        }
        match self.options.mode {
            DeliveryMode::Batch => {
                self.router.take_collected();
            }
            DeliveryMode::Stream => self.connect_stream().await?,
        }
        Ok(self.adapter.start_capture())
    }

    /// Stop recording and hand the result to its sink.
    pub async fn stop(&self) -> Result<StopOutcome, SplatCamError> {
        if !self.adapter.is_capturing() {
            return Ok(StopOutcome::Idle);
        }
        self.adapter.stop_capture();

        match self.options.mode {
            DeliveryMode::Batch => {
                let frames = self.router.take_collected();
                if frames.is_empty() {
                    log::info!("Capture stopped before any frame was sampled");
                    return Ok(StopOutcome::NothingCaptured);
                }
                let handle = self.coordinator.on_capture(frames).await?;
                Ok(StopOutcome::Submitted(handle))
            }
            DeliveryMode::Stream => match self.router.take_stream() {
                Some(stream) => {
                    stream.close_normal().await;
                    Ok(StopOutcome::Streamed(stream.stats()))
                }
                None => Ok(StopOutcome::Streamed(TransportStats::default())),
            },
        }
    }

    /// Tear the screen down: close the camera, close any stream, cancel the
    /// in-flight job.
    pub async fn exit(&self) {
        self.adapter.close();
        if let Some(stream) = self.router.take_stream() {
            stream.close_normal().await;
        }
        self.router.take_collected();
        self.coordinator.cancel_current();
    }
}

impl Drop for CaptureScreen {
    fn drop(&mut self) {
        self.adapter.close();
        // StreamingConnection's own Drop releases the socket.
        drop(self.router.take_stream());
        self.coordinator.cancel_current();
    }
}
