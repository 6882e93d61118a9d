//! Bounded frame queue in front of a [`FrameChannel`].
//!
//! Frames are accepted only while the channel is ready. When the queue is
//! full the oldest frame is evicted. Delivery is either immediate (a flush is
//! triggered on every enqueue) or batched (frames accumulate until
//! `batch_size` are queued or the batch timer fires, whichever comes first).
//! At most one flush pass writes to the channel at a time, so header/payload
//! pairs never interleave.

use super::channel::FrameChannel;
use super::protocol::{ControlMessage, FrameHeader};
use super::queue::TransportQueue;
use crate::errors::SplatCamError;
use crate::types::Frame;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Queue and batching knobs for a frame transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOptions {
    pub max_queue_size: usize,
    pub batch_size: usize,
    pub batch_interval_ms: u64,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            max_queue_size: 50,
            batch_size: 1,
            batch_interval_ms: 0,
        }
    }
}

impl StreamOptions {
    pub fn policy(&self) -> DeliveryPolicy {
        DeliveryPolicy::from_options(self.batch_size, self.batch_interval_ms)
    }
}

/// When queued frames are written to the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// Flush on every enqueue, up to `batch_size` frames per pass.
    Immediate { batch_size: usize },
    /// Flush once `batch_size` frames are queued, or when the timer armed on
    /// enqueue fires.
    Batched {
        batch_size: usize,
        interval: Duration,
    },
}

impl DeliveryPolicy {
    /// Batching only kicks in with more than one frame per batch and a
    /// non-zero interval.
    pub fn from_options(batch_size: usize, batch_interval_ms: u64) -> Self {
        let batch_size = batch_size.max(1);
        if batch_size > 1 && batch_interval_ms > 0 {
            DeliveryPolicy::Batched {
                batch_size,
                interval: Duration::from_millis(batch_interval_ms),
            }
        } else {
            DeliveryPolicy::Immediate { batch_size }
        }
    }

    pub fn batch_size(&self) -> usize {
        match *self {
            DeliveryPolicy::Immediate { batch_size } => batch_size,
            DeliveryPolicy::Batched { batch_size, .. } => batch_size,
        }
    }

    /// Queue length at which a pass runs without waiting for a timer.
    fn flush_threshold(&self) -> usize {
        match *self {
            DeliveryPolicy::Immediate { .. } => 1,
            DeliveryPolicy::Batched { batch_size, .. } => batch_size,
        }
    }
}

/// Delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub sent: u64,
    pub queued: usize,
    /// Evicted from a full queue.
    pub dropped_backpressure: u64,
    /// Rejected because the channel was not ready or the transport was shut down.
    pub dropped_not_ready: u64,
    /// Taken for sending but abandoned after a send failure.
    pub lost_on_send_failure: u64,
}

struct BatchTimer {
    id: u64,
    task: JoinHandle<()>,
}

struct TransportInner<C> {
    channel: Arc<C>,
    queue: TransportQueue<Frame>,
    policy: DeliveryPolicy,
    busy: AtomicBool,
    closed: AtomicBool,
    timer: Mutex<Option<BatchTimer>>,
    timer_seq: AtomicU64,
    sent: AtomicU64,
    dropped_not_ready: AtomicU64,
    lost_on_send_failure: AtomicU64,
}

impl<C: FrameChannel> TransportInner<C> {
    fn can_send(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.channel.is_ready()
    }

    /// One guarded flush pass. Returns the number of frames written, or
    /// zero when another pass already holds the channel.
    async fn flush_pass(&self) -> usize {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return 0;
        }

        let mut written = 0;
        if self.can_send() {
            let batch = self.queue.take_batch(self.policy.batch_size());
            let total = batch.len();
            for (i, frame) in batch.iter().enumerate() {
                if let Err(e) = self.send_frame(frame).await {
                    let lost = (total - i) as u64;
                    self.lost_on_send_failure.fetch_add(lost, Ordering::Relaxed);
                    log::warn!("Frame send failed, {} frame(s) abandoned: {}", lost, e);
                    break;
                }
                written += 1;
            }
            self.sent.fetch_add(written as u64, Ordering::Relaxed);
        }

        self.busy.store(false, Ordering::SeqCst);
        written
    }

    async fn send_frame(&self, frame: &Frame) -> Result<(), SplatCamError> {
        let header = ControlMessage::Frame(FrameHeader::from(frame)).to_json()?;
        self.channel.send_frame(header, frame.data.clone()).await
    }

    /// Abort the armed timer. A timer task gives up its slot before it
    /// starts a pass, so this only ever interrupts the sleep.
    fn cancel_timer(&self) {
        if let Some(timer) = self.timer.lock().expect("lock poisoned").take() {
            timer.task.abort();
        }
    }

    /// Follow-up once a pass has released the channel.
    fn after_pass(self: &Arc<Self>) {
        if self.queue.is_empty() || !self.can_send() {
            return;
        }
        match self.policy {
            DeliveryPolicy::Batched { batch_size, interval } if self.queue.len() < batch_size => {
                self.schedule_batch(interval)
            }
            _ => self.drive(),
        }
    }

    /// Spawn a task that runs passes while a full batch is queued. A running
    /// pass owner re-checks the queue after releasing the busy flag, so
    /// bailing out when busy cannot strand frames.
    fn drive(self: &Arc<Self>) {
        if self.busy.load(Ordering::SeqCst) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("No async runtime, {} frame(s) left queued", self.queue.len());
            return;
        };

        let inner = self.clone();
        runtime.spawn(async move {
            loop {
                if !inner.can_send() || inner.busy.load(Ordering::SeqCst) {
                    return;
                }
                if inner.queue.len() < inner.policy.flush_threshold() {
                    break;
                }
                inner.flush_pass().await;
            }
            if let DeliveryPolicy::Batched { interval, .. } = inner.policy {
                if !inner.queue.is_empty() {
                    inner.schedule_batch(interval);
                }
            }
        });
    }

    /// Arm the one-shot batch timer unless one is already pending.
    fn schedule_batch(self: &Arc<Self>, interval: Duration) {
        let mut slot = self.timer.lock().expect("lock poisoned");
        if slot.is_some() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("No async runtime, batch timer not armed");
            return;
        };

        let id = self.timer_seq.fetch_add(1, Ordering::SeqCst);
        let inner = self.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(interval).await;
            {
                let mut slot = inner.timer.lock().expect("lock poisoned");
                if slot.as_ref().map(|t| t.id) != Some(id) {
                    return;
                }
                *slot = None;
            }
            inner.flush_pass().await;
            inner.after_pass();
        });
        *slot = Some(BatchTimer { id, task });
    }
}

/// Drop-oldest frame queue feeding a [`FrameChannel`].
pub struct FrameTransport<C: FrameChannel> {
    inner: Arc<TransportInner<C>>,
}

impl<C: FrameChannel> Clone for FrameTransport<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: FrameChannel> FrameTransport<C> {
    pub fn new(channel: Arc<C>, options: StreamOptions) -> Self {
        Self {
            inner: Arc::new(TransportInner {
                channel,
                queue: TransportQueue::new(options.max_queue_size),
                policy: options.policy(),
                busy: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                timer: Mutex::new(None),
                timer_seq: AtomicU64::new(0),
                sent: AtomicU64::new(0),
                dropped_not_ready: AtomicU64::new(0),
                lost_on_send_failure: AtomicU64::new(0),
            }),
        }
    }

    pub fn channel(&self) -> &Arc<C> {
        &self.inner.channel
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.inner.policy
    }

    /// Queue a frame for delivery and trigger a flush per the policy.
    ///
    /// Returns `false` when the frame was dropped because the channel is not
    /// ready.
    pub fn enqueue(&self, frame: Frame) -> bool {
        if !self.inner.can_send() {
            self.inner.dropped_not_ready.fetch_add(1, Ordering::Relaxed);
            log::trace!("Channel not ready, frame dropped");
            return false;
        }

        if self.inner.queue.push_drop_oldest(frame).is_some() {
            log::warn!(
                "Frame queue full, dropped oldest frame ({} dropped so far)",
                self.inner.queue.dropped()
            );
        }

        match self.inner.policy {
            DeliveryPolicy::Immediate { .. } => self.inner.drive(),
            DeliveryPolicy::Batched { batch_size, .. } if self.inner.queue.len() >= batch_size => {
                self.inner.cancel_timer();
                self.inner.drive();
            }
            DeliveryPolicy::Batched { interval, .. } => self.inner.schedule_batch(interval),
        }
        true
    }

    /// Run one flush pass now. Frames left over afterwards are handled by
    /// the delivery policy.
    pub async fn flush(&self) -> usize {
        let written = self.inner.flush_pass().await;
        self.inner.after_pass();
        written
    }

    /// Disarm a pending batch timer, if any.
    pub fn cancel_timer(&self) {
        self.inner.cancel_timer();
    }

    /// Discard queued frames.
    pub fn clear(&self) -> usize {
        self.inner.queue.clear()
    }

    /// Stop accepting frames, disarm the timer, drop the queue.
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.cancel_timer();
        let discarded = self.clear();
        if discarded > 0 {
            log::debug!("Transport shut down with {} queued frame(s) discarded", discarded);
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn queued(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn has_pending_timer(&self) -> bool {
        self.inner.timer.lock().expect("lock poisoned").is_some()
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            sent: self.inner.sent.load(Ordering::Relaxed),
            queued: self.inner.queue.len(),
            dropped_backpressure: self.inner.queue.dropped(),
            dropped_not_ready: self.inner.dropped_not_ready.load(Ordering::Relaxed),
            lost_on_send_failure: self.inner.lost_on_send_failure.load(Ordering::Relaxed),
        }
    }
}
