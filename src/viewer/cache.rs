use crate::errors::SplatCamError;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File-backed store of downloaded scenes.
///
/// Each key maps to a stable file name derived from a v5 UUID of the key.
#[derive(Debug, Clone)]
pub struct SceneCache {
    dir: PathBuf,
}

impl SceneCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes());
        self.dir.join(format!("{}.splat", id))
    }

    pub async fn get(&self, key: &str) -> Result<Option<Bytes>, SplatCamError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn put(&self, key: &str, data: &[u8]) -> Result<PathBuf, SplatCamError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);

        // Only complete files ever sit at the cache path.
        let staging = self.dir.join(format!(".{}.partial", Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&staging, data).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        log::debug!("Cached {} bytes for {}", data.len(), key);
        Ok(path)
    }

    pub async fn remove(&self, key: &str) -> Result<bool, SplatCamError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_remove() {
        let dir = TempDir::new().unwrap();
        let cache = SceneCache::new(dir.path().join("scenes"));
        let key = "splat_https://cdn.example.com/room.splat";

        assert_eq!(cache.get(key).await.unwrap(), None);
        cache.put(key, b"scene").await.unwrap();
        assert_eq!(cache.get(key).await.unwrap(), Some(Bytes::from_static(b"scene")));

        assert!(cache.remove(key).await.unwrap());
        assert!(!cache.remove(key).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_replaces_entry_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let cache = SceneCache::new(dir.path());
        let key = "splat_https://cdn.example.com/room.splat";

        cache.put(key, b"first version").await.unwrap();
        let path = cache.put(key, b"second").await.unwrap();
        assert_eq!(path, cache.path_for(key));
        assert_eq!(cache.get(key).await.unwrap(), Some(Bytes::from_static(b"second")));

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(entries, vec![path]);
    }

    #[tokio::test]
    async fn test_failed_put_leaves_no_entry() {
        let dir = TempDir::new().unwrap();
        let cache = SceneCache::new(dir.path());
        let key = "splat_https://cdn.example.com/room.splat";

        // A directory at the entry path makes the final rename fail.
        std::fs::create_dir(cache.path_for(key)).unwrap();
        std::fs::write(cache.path_for(key).join("blocker"), b"x").unwrap();
        assert!(cache.put(key, b"scene").await.is_err());

        let staged = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|entry| {
                let name = entry.as_ref().unwrap().file_name();
                name.to_string_lossy().ends_with(".partial")
            })
            .count();
        assert_eq!(staged, 0);
    }

    #[test]
    fn test_keys_map_to_distinct_stable_files() {
        let cache = SceneCache::new("/cache");
        assert_eq!(cache.path_for("a"), cache.path_for("a"));
        assert_ne!(cache.path_for("a"), cache.path_for("b"));
    }
}
