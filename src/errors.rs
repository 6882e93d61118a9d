use thiserror::Error;

/// Errors produced by the capture and delivery pipeline.
///
/// `Cancelled` is not a failure: layers that observe it swallow it instead of
/// reporting it to the user. Use [`SplatCamError::is_cancelled`] to tell the
/// two apart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplatCamError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Submit failed: {status} {message}")]
    Submission { status: u16, message: String },
    /// `status` is `None` when the job itself reported an error.
    #[error("Status failed: {message}")]
    Status { status: Option<u16>, message: String },
    #[error("Download failed: {status} {message}")]
    Download { status: u16, message: String },
    #[error("Camera device error: {0}")]
    Device(String),
    #[error("Frame encode error: {0}")]
    Encode(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("operation cancelled")]
    Cancelled,
}

impl SplatCamError {
    /// The input error raised when a submission carries no frames.
    pub fn no_frames() -> Self {
        SplatCamError::InvalidInput("Select at least one image".to_string())
    }

    /// Non-success HTTP status while polling a job.
    pub fn status_http(status: u16, reason: &str) -> Self {
        SplatCamError::Status {
            status: Some(status),
            message: format!("{} {}", status, reason).trim_end().to_string(),
        }
    }

    /// Error reported by the reconstruction service for a job.
    pub fn job_failed(message: Option<String>) -> Self {
        SplatCamError::Status {
            status: None,
            message: message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Job error".to_string()),
        }
    }

    /// True when the operation was aborted through its cancellation token.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SplatCamError::Cancelled)
    }

    /// HTTP status code carried by the error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            SplatCamError::Submission { status, .. } | SplatCamError::Download { status, .. } => {
                Some(*status)
            }
            SplatCamError::Status { status, .. } => *status,
            _ => None,
        }
    }

    /// Message suitable for a user-facing alert.
    ///
    /// Server-reported job errors surface the server's message verbatim.
    pub fn user_message(&self) -> String {
        match self {
            SplatCamError::Status { status: None, message } => message.clone(),
            SplatCamError::InvalidInput(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for SplatCamError {
    fn from(e: std::io::Error) -> Self {
        SplatCamError::Io(e.to_string())
    }
}

impl From<reqwest::Error> for SplatCamError {
    fn from(e: reqwest::Error) -> Self {
        SplatCamError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for SplatCamError {
    fn from(e: serde_json::Error) -> Self {
        SplatCamError::Protocol(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SplatCamError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        SplatCamError::Connection(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_frames_message() {
        let err = SplatCamError::no_frames();
        assert_eq!(err.user_message(), "Select at least one image");
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_status_display_with_and_without_code() {
        let http = SplatCamError::status_http(502, "Bad Gateway");
        assert_eq!(http.to_string(), "Status failed: 502 Bad Gateway");
        assert_eq!(http.http_status(), Some(502));

        let job = SplatCamError::job_failed(Some("boom".to_string()));
        assert_eq!(job.user_message(), "boom");
        assert_eq!(job.http_status(), None);

        let unnamed = SplatCamError::job_failed(None);
        assert_eq!(unnamed.user_message(), "Job error");
    }

    #[test]
    fn test_cancelled_is_distinguishable() {
        assert!(SplatCamError::Cancelled.is_cancelled());
        assert!(!SplatCamError::Network("refused".to_string()).is_cancelled());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SplatCamError = io.into();
        assert!(matches!(err, SplatCamError::Io(ref m) if m.contains("missing")));
    }
}
