//! Single in-flight reconstruction job.
//!
//! Starting a new capture cancels whatever the previous one was still doing
//! (upload, polling or download). Progress is published on a `watch`
//! channel; a cancelled chain never reports a failure.

use crate::errors::SplatCamError;
use crate::job::{ArtifactSink, JobClient, JobHandle};
use crate::types::Frame;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Where the current job is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPhase {
    Idle,
    Submitting,
    Submitted(JobHandle),
    Completed { timestamp: String, location: PathBuf },
    Failed { message: String },
}

impl JobPhase {
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            JobPhase::Idle | JobPhase::Completed { .. } | JobPhase::Failed { .. }
        )
    }
}

struct Operation {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

struct CoordinatorInner {
    client: JobClient,
    sink: Arc<dyn ArtifactSink>,
    current: Mutex<Option<Operation>>,
    phase: watch::Sender<JobPhase>,
}

impl CoordinatorInner {
    /// Cancel the running operation and install a fresh token.
    fn replace_operation(&self) -> CancellationToken {
        let cancel = CancellationToken::new();
        let previous = self.current.lock().expect("lock poisoned").replace(Operation {
            cancel: cancel.clone(),
            task: None,
        });
        if let Some(previous) = previous {
            previous.cancel.cancel();
            if let Some(task) = previous.task {
                task.abort();
            }
            log::debug!("Cancelled previous job operation");
        }
        cancel
    }

    fn publish(&self, cancel: &CancellationToken, phase: JobPhase) {
        if !cancel.is_cancelled() {
            self.phase.send_replace(phase);
        }
    }

    fn fail(&self, cancel: &CancellationToken, error: &SplatCamError) {
        if error.is_cancelled() || cancel.is_cancelled() {
            return;
        }
        log::error!("Job failed: {}", error);
        self.publish(
            cancel,
            JobPhase::Failed {
                message: error.user_message(),
            },
        );
    }

    async fn retrieve_and_deliver(
        &self,
        timestamp: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, SplatCamError> {
        let artifact = self.client.retrieve_result(timestamp, cancel).await?;
        if cancel.is_cancelled() {
            return Err(SplatCamError::Cancelled);
        }
        self.sink.deliver(&artifact).await
    }

    async fn poll_and_deliver(
        &self,
        handle: &JobHandle,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, SplatCamError> {
        self.client.poll_status(&handle.job_id, cancel).await?;
        self.retrieve_and_deliver(&handle.timestamp, cancel).await
    }

    async fn run_chain(&self, handle: JobHandle, cancel: CancellationToken) {
        match self.poll_and_deliver(&handle, &cancel).await {
            Ok(location) => self.publish(
                &cancel,
                JobPhase::Completed {
                    timestamp: handle.timestamp,
                    location,
                },
            ),
            Err(e) => self.fail(&cancel, &e),
        }
    }
}

/// Submits captures and drives their poll → retrieve → deliver chain.
#[derive(Clone)]
pub struct JobCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl JobCoordinator {
    pub fn new(client: JobClient, sink: Arc<dyn ArtifactSink>) -> Self {
        let (phase, _) = watch::channel(JobPhase::Idle);
        Self {
            inner: Arc::new(CoordinatorInner {
                client,
                sink,
                current: Mutex::new(None),
                phase,
            }),
        }
    }

    pub fn client(&self) -> &JobClient {
        &self.inner.client
    }

    pub fn phase(&self) -> JobPhase {
        self.inner.phase.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobPhase> {
        self.inner.phase.subscribe()
    }

    /// Submit `frames` as a new job, cancelling any previous one.
    ///
    /// Returns once the upload is accepted; polling, download and delivery
    /// continue in the background.
    pub async fn on_capture(&self, frames: Vec<Frame>) -> Result<JobHandle, SplatCamError> {
        if frames.is_empty() {
            return Err(SplatCamError::no_frames());
        }

        let cancel = self.inner.replace_operation();
        self.inner.publish(&cancel, JobPhase::Submitting);

        let handle = match self.inner.client.submit(&frames, &cancel).await {
            Ok(handle) => handle,
            Err(e) => {
                self.inner.fail(&cancel, &e);
                return Err(e);
            }
        };
        self.inner.publish(&cancel, JobPhase::Submitted(handle.clone()));

        let inner = self.inner.clone();
        let chain_handle = handle.clone();
        let chain_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            inner.run_chain(chain_handle, chain_cancel).await;
        });

        let mut current = self.inner.current.lock().expect("lock poisoned");
        match current.as_mut() {
            Some(op) if !cancel.is_cancelled() => op.task = Some(task),
            _ => task.abort(),
        }
        Ok(handle)
    }

    /// Download and deliver an existing result without resubmitting.
    pub async fn fetch_existing(&self, timestamp: &str) -> Result<PathBuf, SplatCamError> {
        let cancel = self.inner.replace_operation();
        match self.inner.retrieve_and_deliver(timestamp, &cancel).await {
            Ok(location) => {
                self.inner.publish(
                    &cancel,
                    JobPhase::Completed {
                        timestamp: timestamp.to_string(),
                        location: location.clone(),
                    },
                );
                Ok(location)
            }
            Err(e) => {
                self.inner.fail(&cancel, &e);
                Err(e)
            }
        }
    }

    /// Abort whatever is in flight. Never reported as a failure.
    pub fn cancel_current(&self) {
        let previous = self.inner.current.lock().expect("lock poisoned").take();
        if let Some(op) = previous {
            op.cancel.cancel();
            if let Some(task) = op.task {
                task.abort();
            }
            self.inner.phase.send_if_modified(|phase| {
                if phase.is_settled() {
                    false
                } else {
                    *phase = JobPhase::Idle;
                    true
                }
            });
            log::info!("Job operation cancelled");
        }
    }

    /// Wait for the current job to reach a settled phase.
    pub async fn wait_settled(&self) -> JobPhase {
        let mut rx = self.subscribe();
        let settled = match rx.wait_for(|phase| phase.is_settled()).await {
            Ok(phase) => phase.clone(),
            Err(_) => self.phase(),
        };
        settled
    }
}
