use super::cache::SceneCache;
use super::{SplatViewer, ViewerCleanup, ViewerConfig, ViewerContext};
use crate::errors::SplatCamError;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the scene bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Checking,
    Cached,
    Fetching,
    Loaded,
}

#[derive(Debug, Clone)]
pub struct LoadedScene {
    pub url: String,
    pub data: Bytes,
    pub status: CacheStatus,
}

/// Resolves a viewer config to scene bytes, cache first.
#[derive(Debug, Clone)]
pub struct SceneLoader {
    cache: SceneCache,
    http: reqwest::Client,
}

impl SceneLoader {
    pub fn new(cache: SceneCache) -> Result<Self, SplatCamError> {
        let mut headers = HeaderMap::new();
        headers.insert("ngrok-skip-browser-warning", HeaderValue::from_static("1"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SplatCamError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { cache, http })
    }

    pub fn cache(&self) -> &SceneCache {
        &self.cache
    }

    pub async fn load(&self, config: &ViewerConfig) -> Result<LoadedScene, SplatCamError> {
        let url = config.effective_url()?;
        let key = config.cache_key()?;

        match self.cache.get(&key).await {
            Ok(Some(data)) => {
                log::info!("Scene {} served from cache", url);
                return Ok(LoadedScene {
                    url,
                    data,
                    status: CacheStatus::Cached,
                });
            }
            Ok(None) => log::debug!("Scene {} not cached, fetching", url),
            // A broken cache entry is refetched.
            Err(e) => log::warn!("Scene cache read failed for {}: {}", url, e),
        }

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SplatCamError::Download {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }
        let data = response.bytes().await?;

        if let Err(e) = self.cache.put(&key, &data).await {
            log::warn!("Failed to cache scene {}: {}", url, e);
        }
        log::info!("Scene {} fetched ({} bytes)", url, data.len());
        Ok(LoadedScene {
            url,
            data,
            status: CacheStatus::Loaded,
        })
    }

    /// Load the scene and start `viewer` on it.
    pub async fn open(
        &self,
        viewer: &dyn SplatViewer,
        config: &ViewerConfig,
    ) -> Result<ViewerCleanup, SplatCamError> {
        let scene = self.load(config).await?;
        viewer.init(ViewerContext {
            config: config.clone(),
            url: scene.url,
            data: scene.data,
            status: scene.status,
        })
    }
}
