//! Where downloaded splats end up.

use super::types::SplatArtifact;
use crate::errors::SplatCamError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Hands a retrieved artifact to the user.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Deliver the artifact and return where it was placed.
    async fn deliver(&self, artifact: &SplatArtifact) -> Result<PathBuf, SplatCamError>;
}

/// Writes artifacts into a directory under their server-provided name.
#[derive(Debug, Clone)]
pub struct DiskArtifactSink {
    dir: PathBuf,
}

impl DiskArtifactSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Target path for `filename`, keeping only its final component.
    pub fn path_for(&self, filename: &str) -> PathBuf {
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| super::disposition::DEFAULT_ARTIFACT_NAME.into());
        self.dir.join(name)
    }
}

#[async_trait]
impl ArtifactSink for DiskArtifactSink {
    async fn deliver(&self, artifact: &SplatArtifact) -> Result<PathBuf, SplatCamError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&artifact.filename);
        tokio::fs::write(&path, &artifact.data).await?;
        log::info!("Saved {} ({} bytes)", path.display(), artifact.size());
        Ok(path)
    }
}

/// Keeps delivered artifacts in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifactSink {
    delivered: Arc<Mutex<Vec<SplatArtifact>>>,
}

impl MemoryArtifactSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<SplatArtifact> {
        self.delivered.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl ArtifactSink for MemoryArtifactSink {
    async fn deliver(&self, artifact: &SplatArtifact) -> Result<PathBuf, SplatCamError> {
        self.delivered
            .lock()
            .expect("lock poisoned")
            .push(artifact.clone());
        Ok(PathBuf::from(&artifact.filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_disk_sink_writes_file() {
        let dir = TempDir::new().unwrap();
        let sink = DiskArtifactSink::new(dir.path().join("splats"));
        let artifact = SplatArtifact {
            filename: "1_2_3.splat".to_string(),
            data: Bytes::from_static(b"splat-bytes"),
        };

        let path = sink.deliver(&artifact).await.unwrap();
        assert_eq!(path, dir.path().join("splats").join("1_2_3.splat"));
        assert_eq!(std::fs::read(&path).unwrap(), b"splat-bytes");
    }

    #[test]
    fn test_path_for_strips_directories() {
        let sink = DiskArtifactSink::new("/tmp/out");
        assert_eq!(sink.path_for("../../etc/x.splat"), Path::new("/tmp/out/x.splat"));
        assert_eq!(sink.path_for(".."), Path::new("/tmp/out/0_0_0.splat"));
    }
}
