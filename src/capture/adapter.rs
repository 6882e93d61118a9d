//! Capture device adapter
//!
//! Owns one camera stream and its preview attachment, and runs the
//! timer-driven sampling loop that turns the live stream into encoded
//! [`Frame`]s. Ticks never overlap: a tick that fires while the previous one
//! is still reading or encoding is skipped, not queued.

use super::encoder::FrameEncoder;
use super::preview::{NullPreview, PreviewAttachment, PreviewSurface};
use crate::errors::SplatCamError;
use crate::platform::{CameraBackend, StreamRequest, VideoStream};
use crate::timing::{system_clock, SharedClock};
use crate::types::{sampling_interval_for, CaptureSettings, Frame};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Receives every emitted frame.
pub type FrameCallback = Arc<dyn Fn(Frame) + Send + Sync>;

type StreamSlot = Arc<Mutex<Option<Box<dyn VideoStream>>>>;

/// Counters for one adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames_emitted: u64,
    pub ticks_skipped: u64,
    pub encode_failures: u64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Sampler {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct AdapterInner {
    backend: Arc<dyn CameraBackend>,
    settings: Mutex<CaptureSettings>,
    interval_ms: AtomicU64,
    stream: StreamSlot,
    preview: Mutex<Box<dyn PreviewSurface>>,
    sampler: Mutex<Option<Sampler>>,
    previewing: AtomicBool,
    processing: AtomicBool,
    /// Bumped by every close so late acquisitions can tell they are stale.
    generation: AtomicU64,
    last_error: Mutex<Option<SplatCamError>>,
    on_frame: Option<FrameCallback>,
    clock: SharedClock,
    frames_emitted: AtomicU64,
    ticks_skipped: AtomicU64,
    encode_failures: AtomicU64,
}

impl AdapterInner {
    fn record_error(&self, error: SplatCamError) {
        *lock(&self.last_error) = Some(error);
    }

    fn encoder(&self) -> FrameEncoder {
        let settings = lock(&self.settings);
        FrameEncoder::new(settings.width, settings.height, settings.encoding)
    }
}

/// Builder for [`CaptureAdapter`].
pub struct CaptureAdapterBuilder {
    backend: Arc<dyn CameraBackend>,
    settings: CaptureSettings,
    preview: Box<dyn PreviewSurface>,
    on_frame: Option<FrameCallback>,
    clock: SharedClock,
}

impl CaptureAdapterBuilder {
    pub fn settings(mut self, settings: CaptureSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn preview(mut self, preview: impl PreviewSurface + 'static) -> Self {
        self.preview = Box::new(preview);
        self
    }

    pub fn on_frame(mut self, callback: impl Fn(Frame) + Send + Sync + 'static) -> Self {
        self.on_frame = Some(Arc::new(callback));
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> CaptureAdapter {
        let interval = self.settings.sampling_interval().as_millis() as u64;
        CaptureAdapter {
            inner: Arc::new(AdapterInner {
                backend: self.backend,
                settings: Mutex::new(self.settings),
                interval_ms: AtomicU64::new(interval),
                stream: Arc::new(Mutex::new(None)),
                preview: Mutex::new(self.preview),
                sampler: Mutex::new(None),
                previewing: AtomicBool::new(false),
                processing: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                last_error: Mutex::new(None),
                on_frame: self.on_frame,
                clock: self.clock,
                frames_emitted: AtomicU64::new(0),
                ticks_skipped: AtomicU64::new(0),
                encode_failures: AtomicU64::new(0),
            }),
        }
    }
}

/// Camera stream + sampling loop for one capture screen.
///
/// Dropping the adapter closes it, so teardown never depends on the owner
/// remembering to call [`CaptureAdapter::close`].
pub struct CaptureAdapter {
    inner: Arc<AdapterInner>,
}

impl CaptureAdapter {
    pub fn builder(backend: Arc<dyn CameraBackend>) -> CaptureAdapterBuilder {
        CaptureAdapterBuilder {
            backend,
            settings: CaptureSettings::default(),
            preview: Box::new(NullPreview::default()),
            on_frame: None,
            clock: system_clock(),
        }
    }

    /// Acquire the camera and attach it to the preview surface.
    ///
    /// If a stream is already held this only marks the adapter as
    /// previewing. On failure the error is recorded, the adapter is fully
    /// closed and the error is returned.
    pub async fn open_preview(&self) -> Result<(), SplatCamError> {
        *lock(&self.inner.last_error) = None;

        if lock(&self.inner.stream).is_some() {
            self.inner.previewing.store(true, Ordering::SeqCst);
            return Ok(());
        }

        let request = {
            let settings = lock(&self.inner.settings);
            StreamRequest {
                facing: settings.facing,
                ideal_width: settings.width,
                ideal_height: settings.height,
            }
        };
        let generation = self.inner.generation.load(Ordering::SeqCst);
        let backend = self.inner.backend.clone();

        log::info!(
            "Requesting {} camera stream ({}x{}, {:?} facing)",
            backend.name(),
            request.ideal_width,
            request.ideal_height,
            request.facing
        );

        let acquired = tokio::task::spawn_blocking(move || backend.acquire(&request))
            .await
            .map_err(|e| SplatCamError::Device(format!("Task join error: {}", e)))
            .and_then(|result| result);

        let mut stream = match acquired {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("Camera acquisition failed: {}", e);
                self.close();
                self.inner.record_error(e.clone());
                return Err(e);
            }
        };

        if self.inner.generation.load(Ordering::SeqCst) != generation {
            // Closed while we were waiting on the device.
            stream.stop();
            return Err(SplatCamError::Cancelled);
        }

        let label = stream.label();
        {
            let mut slot = lock(&self.inner.stream);
            if slot.is_some() {
                stream.stop();
                self.inner.previewing.store(true, Ordering::SeqCst);
                return Ok(());
            }
            *slot = Some(stream);
        }

        lock(&self.inner.preview).attach(PreviewAttachment::for_device(label.clone()));
        self.inner.previewing.store(true, Ordering::SeqCst);
        log::info!("Preview open on {}", label);
        Ok(())
    }

    /// Start the sampling loop.
    ///
    /// Returns `false` without doing anything when no preview is open or the
    /// loop is already running.
    pub fn start_capture(&self) -> bool {
        if !self.is_previewing() || lock(&self.inner.stream).is_none() {
            log::debug!("start_capture ignored: preview not open");
            return false;
        }

        let mut sampler = lock(&self.inner.sampler);
        if sampler.is_some() {
            return false;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                self.inner
                    .record_error(SplatCamError::Device(format!("No async runtime: {}", e)));
                return false;
            }
        };

        let cancel = CancellationToken::new();
        let task = runtime.spawn(sampling_loop(self.inner.clone(), cancel.clone()));
        *sampler = Some(Sampler { cancel, task });

        log::info!(
            "Capture started at {}ms interval",
            self.inner.interval_ms.load(Ordering::SeqCst)
        );
        true
    }

    /// Halt the sampling loop. Idempotent.
    pub fn stop_capture(&self) {
        if let Some(sampler) = lock(&self.inner.sampler).take() {
            sampler.cancel.cancel();
            sampler.task.abort();
            log::info!("Capture stopped");
        }
    }

    /// Stop capture, release the device stream, detach the preview.
    ///
    /// Safe to call any number of times; also runs on drop.
    pub fn close(&self) {
        self.stop_capture();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);

        let stream = lock(&self.inner.stream).take();
        let had_stream = stream.is_some();
        if let Some(mut stream) = stream {
            stream.stop();
            log::info!("Released camera stream {}", stream.label());
        }

        let was_previewing = self.inner.previewing.swap(false, Ordering::SeqCst);
        if had_stream || was_previewing {
            lock(&self.inner.preview).detach();
        }
    }

    /// Change the sample rate used by subsequent ticks.
    pub fn set_fps(&self, fps: u32) {
        lock(&self.inner.settings).fps = fps;
        let interval = sampling_interval_for(fps).as_millis() as u64;
        self.inner.interval_ms.store(interval, Ordering::SeqCst);
        log::debug!("Sampling interval set to {}ms ({} fps)", interval, fps);
    }

    pub fn fps(&self) -> u32 {
        lock(&self.inner.settings).fps
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.inner.interval_ms.load(Ordering::SeqCst))
    }

    pub fn settings(&self) -> CaptureSettings {
        lock(&self.inner.settings).clone()
    }

    pub fn is_previewing(&self) -> bool {
        self.inner.previewing.load(Ordering::SeqCst)
    }

    pub fn is_capturing(&self) -> bool {
        lock(&self.inner.sampler).is_some()
    }

    /// Most recent device or encode error.
    pub fn last_error(&self) -> Option<SplatCamError> {
        lock(&self.inner.last_error).clone()
    }

    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_emitted: self.inner.frames_emitted.load(Ordering::SeqCst),
            ticks_skipped: self.inner.ticks_skipped.load(Ordering::SeqCst),
            encode_failures: self.inner.encode_failures.load(Ordering::SeqCst),
        }
    }
}

impl Drop for CaptureAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

async fn sampling_loop(inner: Arc<AdapterInner>, cancel: CancellationToken) {
    loop {
        let interval = Duration::from_millis(inner.interval_ms.load(Ordering::SeqCst));
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        if inner.processing.swap(true, Ordering::AcqRel) {
            inner.ticks_skipped.fetch_add(1, Ordering::Relaxed);
            log::trace!("Sampling tick skipped, previous frame still in flight");
            continue;
        }

        let tick_inner = inner.clone();
        let tick_cancel = cancel.clone();
        tokio::spawn(async move {
            process_tick(&tick_inner, &tick_cancel).await;
            tick_inner.processing.store(false, Ordering::Release);
        });
    }
}

async fn process_tick(inner: &Arc<AdapterInner>, cancel: &CancellationToken) {
    let encoder = inner.encoder();
    let mime = encoder.mime();
    let stream = inner.stream.clone();

    let encoded = tokio::task::spawn_blocking(move || {
        let image = {
            let mut slot = lock(&stream);
            let stream = slot
                .as_mut()
                .ok_or_else(|| SplatCamError::Device("stream released".to_string()))?;
            stream.read_frame()?
        };
        encoder.encode(&image)
    })
    .await
    .map_err(|e| SplatCamError::Encode(format!("Task join error: {}", e)))
    .and_then(|result| result);

    // Frames that finish after stop are discarded.
    if cancel.is_cancelled() {
        return;
    }

    match encoded {
        Ok(data) => {
            let frame = Frame::new(data, mime, inner.clock.now_millis());
            inner.frames_emitted.fetch_add(1, Ordering::Relaxed);
            log::trace!("Frame emitted ({} bytes)", frame.size());
            if let Some(callback) = &inner.on_frame {
                callback(frame);
            }
        }
        Err(e) => {
            inner.encode_failures.fetch_add(1, Ordering::Relaxed);
            log::warn!("Frame sampling failed: {}", e);
            inner.record_error(e);
        }
    }
}
