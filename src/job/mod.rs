//! Reconstruction job submission, status polling and result retrieval.

pub mod client;
pub mod disposition;
pub mod sink;
pub mod types;

pub use client::{JobClient, DEFAULT_POLL_INTERVAL, MAX_UPLOAD_FRAMES};
pub use disposition::{filename_from_content_disposition, DEFAULT_ARTIFACT_NAME};
pub use sink::{ArtifactSink, DiskArtifactSink, MemoryArtifactSink};
pub use types::{JobHandle, JobStatus, SplatArtifact, StatusResponse, SubmitResponse};
