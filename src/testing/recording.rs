//! Recording doubles for the channel and preview seams.

use crate::capture::preview::{PreviewAttachment, PreviewSurface};
use crate::errors::SplatCamError;
use crate::transport::channel::{ChannelMessage, FrameChannel};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory [`FrameChannel`] that records everything sent through it.
#[derive(Debug, Clone)]
pub struct RecordingChannel {
    inner: Arc<ChannelState>,
}

#[derive(Debug)]
struct ChannelState {
    messages: Mutex<Vec<ChannelMessage>>,
    ready: AtomicBool,
    /// Sends fail once this many messages have gone through.
    fail_after: Mutex<Option<usize>>,
    send_delay: Mutex<Duration>,
    attempts: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ChannelState {
                messages: Mutex::new(Vec::new()),
                ready: AtomicBool::new(true),
                fail_after: Mutex::new(None),
                send_delay: Mutex::new(Duration::ZERO),
                attempts: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.inner.ready.store(ready, Ordering::SeqCst);
    }

    /// Fail every send after `count` successful ones.
    pub fn fail_after(&self, count: usize) {
        *self.inner.fail_after.lock().expect("lock poisoned") = Some(count);
    }

    pub fn heal(&self) {
        *self.inner.fail_after.lock().expect("lock poisoned") = None;
    }

    pub fn set_send_delay(&self, delay: Duration) {
        *self.inner.send_delay.lock().expect("lock poisoned") = delay;
    }

    pub fn messages(&self) -> Vec<ChannelMessage> {
        self.inner.messages.lock().expect("lock poisoned").clone()
    }

    /// Parsed JSON bodies of every text message.
    pub fn text_messages(&self) -> Vec<serde_json::Value> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                ChannelMessage::Text(text) => serde_json::from_str(&text).ok(),
                ChannelMessage::Binary(_) => None,
            })
            .collect()
    }

    pub fn binary_messages(&self) -> Vec<Vec<u8>> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                ChannelMessage::Binary(data) => Some(data.to_vec()),
                ChannelMessage::Text(_) => None,
            })
            .collect()
    }

    pub fn send_attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Highest number of sends observed running at once.
    pub fn max_concurrent_sends(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameChannel for RecordingChannel {
    fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    async fn send(&self, message: ChannelMessage) -> Result<(), SplatCamError> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.inner.send_delay.lock().expect("lock poisoned");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let limit = *self.inner.fail_after.lock().expect("lock poisoned");
            let mut messages = self.inner.messages.lock().expect("lock poisoned");
            match limit {
                Some(limit) if messages.len() >= limit => {
                    Err(SplatCamError::Connection("recording channel broken".to_string()))
                }
                _ => {
                    messages.push(message);
                    Ok(())
                }
            }
        };

        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewEvent {
    Attached(PreviewAttachment),
    Detached,
}

/// [`PreviewSurface`] that keeps a log of attach/detach calls.
#[derive(Debug, Clone, Default)]
pub struct RecordingPreview {
    events: Arc<Mutex<Vec<PreviewEvent>>>,
}

impl RecordingPreview {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PreviewEvent> {
        self.events.lock().expect("lock poisoned").clone()
    }

    pub fn is_attached(&self) -> bool {
        matches!(self.events().last(), Some(PreviewEvent::Attached(_)))
    }
}

impl PreviewSurface for RecordingPreview {
    fn attach(&mut self, attachment: PreviewAttachment) {
        self.events
            .lock()
            .expect("lock poisoned")
            .push(PreviewEvent::Attached(attachment));
    }

    fn detach(&mut self) {
        self.events
            .lock()
            .expect("lock poisoned")
            .push(PreviewEvent::Detached);
    }
}
