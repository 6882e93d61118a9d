use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Body of a successful `POST /submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub num_images: u32,
}

/// Server-side state of a reconstruction job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Submitted,
    Done,
    Error,
    /// Any other non-terminal state the service reports.
    #[serde(other)]
    Pending,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

/// Body of `GET /status/{job_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A submitted job: server id plus the client-generated retrieval token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    /// `ts<unix-seconds>`, used to fetch the result.
    pub timestamp: String,
}

/// A downloaded splat file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplatArtifact {
    pub filename: String,
    pub data: Bytes,
}

impl SplatArtifact {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
