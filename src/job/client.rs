//! HTTP client for the reconstruction service.
//!
//! `POST /submit` uploads at most two frames together with a client-made
//! `ts<unix-seconds>` token, `GET /status/{job_id}` is polled until the job
//! is done or failed, and `GET /result/{timestamp}` downloads the splat.
//! Every request races the caller's [`CancellationToken`].

use super::disposition::filename_from_content_disposition;
use super::types::{JobHandle, JobStatus, SplatArtifact, StatusResponse, SubmitResponse};
use crate::errors::SplatCamError;
use crate::timing::{system_clock, timestamp_token, SharedClock};
use crate::types::Frame;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_DISPOSITION};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Delay between two status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Frames beyond this count are not uploaded.
pub const MAX_UPLOAD_FRAMES: usize = 2;

const SKIP_BROWSER_WARNING: &str = "ngrok-skip-browser-warning";

/// Client for submit, status and result endpoints.
#[derive(Clone)]
pub struct JobClient {
    http: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    clock: SharedClock,
}

impl std::fmt::Debug for JobClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobClient")
            .field("base_url", &self.base_url)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl JobClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SplatCamError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(SplatCamError::Config("API base URL is empty".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(SKIP_BROWSER_WARNING, HeaderValue::from_static("1"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SplatCamError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            poll_interval: DEFAULT_POLL_INTERVAL,
            clock: system_clock(),
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Upload the first frames as a new reconstruction job.
    ///
    /// Rejects an empty frame list before any network traffic.
    pub async fn submit(
        &self,
        frames: &[Frame],
        cancel: &CancellationToken,
    ) -> Result<JobHandle, SplatCamError> {
        if frames.is_empty() {
            return Err(SplatCamError::no_frames());
        }

        let timestamp = timestamp_token(self.clock.as_ref());
        let mut form = Form::new().text("timestamp", timestamp.clone());
        for (index, frame) in frames.iter().take(MAX_UPLOAD_FRAMES).enumerate() {
            let part = Part::bytes(frame.data.to_vec())
                .file_name(format!("frame_{}.{}", index, frame.extension()))
                .mime_str(&frame.mime)
                .map_err(|e| {
                    SplatCamError::InvalidInput(format!("invalid media type {}: {}", frame.mime, e))
                })?;
            form = form.part("images", part);
        }

        let request = self.http.post(self.endpoint("submit")).multipart(form);
        let response = send(request, cancel).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SplatCamError::Submission {
                status: status.as_u16(),
                message: reason(status),
            });
        }

        let body: SubmitResponse = read_json(response, cancel).await?;
        log::info!(
            "Submitted job {} ({} image(s), token {})",
            body.job_id,
            frames.len().min(MAX_UPLOAD_FRAMES),
            timestamp
        );
        Ok(JobHandle {
            job_id: body.job_id,
            timestamp,
        })
    }

    /// One status check.
    pub async fn check_status(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<StatusResponse, SplatCamError> {
        let request = self
            .http
            .get(self.endpoint(&format!("status/{}", job_id)));
        let response = send(request, cancel).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SplatCamError::status_http(status.as_u16(), &reason(status)));
        }
        read_json(response, cancel).await
    }

    /// Poll until the job reports `done`; a reported `error` fails with the
    /// server's message.
    pub async fn poll_status(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SplatCamError> {
        loop {
            let report = self.check_status(job_id, cancel).await?;
            match report.status {
                JobStatus::Done => {
                    log::info!("Job {} done", job_id);
                    return Ok(());
                }
                JobStatus::Error => return Err(SplatCamError::job_failed(report.error)),
                other => log::debug!("Job {} is {:?}", job_id, other),
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(SplatCamError::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Download the splat for a retrieval token.
    pub async fn retrieve_result(
        &self,
        timestamp: &str,
        cancel: &CancellationToken,
    ) -> Result<SplatArtifact, SplatCamError> {
        let request = self
            .http
            .get(self.endpoint(&format!("result/{}", timestamp)));
        let response = send(request, cancel).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SplatCamError::Download {
                status: status.as_u16(),
                message: reason(status),
            });
        }

        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let filename = filename_from_content_disposition(disposition.as_deref());

        let data = read_body(response, cancel).await?;
        log::info!("Downloaded {} ({} bytes)", filename, data.len());
        Ok(SplatArtifact { filename, data })
    }
}

fn reason(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or_default().to_string()
}

async fn read_json<T: DeserializeOwned>(
    response: Response,
    cancel: &CancellationToken,
) -> Result<T, SplatCamError> {
    let body = read_body(response, cancel).await?;
    Ok(serde_json::from_slice(&body)?)
}

async fn send(
    request: RequestBuilder,
    cancel: &CancellationToken,
) -> Result<Response, SplatCamError> {
    cancellable(cancel, async {
        request.send().await.map_err(SplatCamError::from)
    })
    .await
}

async fn read_body(response: Response, cancel: &CancellationToken) -> Result<Bytes, SplatCamError> {
    cancellable(cancel, async {
        response.bytes().await.map_err(SplatCamError::from)
    })
    .await
}

async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, SplatCamError>
where
    F: Future<Output = Result<T, SplatCamError>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(SplatCamError::Cancelled),
        result = fut => result,
    }
}
