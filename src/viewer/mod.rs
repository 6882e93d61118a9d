//! Boundary to the splat renderer.
//!
//! The renderer is opaque: it receives an explicit [`ViewerContext`] on
//! init and hands back a [`ViewerCleanup`] that must run when the view is
//! torn down. Scene bytes are cached on disk keyed by the effective URL.

pub mod cache;
pub mod loader;

pub use cache::SceneCache;
pub use loader::{CacheStatus, LoadedScene, SceneLoader};

use crate::errors::SplatCamError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// Scene shown when none is requested.
pub const DEFAULT_SCENE: &str = "chair_trellis.splat";

/// Base every relative scene URL is resolved against.
pub const DEFAULT_BASE_URL: &str =
    "https://raw.githubusercontent.com/bobbykabob/shopify-hackathon-cdn/main/gs_table.splat";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Scene to show, absolute or relative to `base_url`.
    pub scene_url: Option<String>,
    pub base_url: Option<String>,
    /// Show one scene only, no multi-scene merge.
    pub single: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            scene_url: None,
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            single: true,
        }
    }
}

impl ViewerConfig {
    pub fn for_scene(scene_url: impl Into<String>) -> Self {
        Self {
            scene_url: Some(scene_url.into()),
            ..Default::default()
        }
    }

    fn scene(&self) -> &str {
        self.scene_url
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SCENE)
    }

    /// The scene URL resolved against the base, if one is set.
    pub fn effective_url(&self) -> Result<String, SplatCamError> {
        match self.base_url.as_deref().filter(|b| !b.is_empty()) {
            Some(base) => {
                let base = Url::parse(base).map_err(|e| {
                    SplatCamError::Config(format!("invalid base URL {}: {}", base, e))
                })?;
                let url = base.join(self.scene()).map_err(|e| {
                    SplatCamError::Config(format!("invalid scene URL {}: {}", self.scene(), e))
                })?;
                Ok(url.to_string())
            }
            None => Ok(self.scene().to_string()),
        }
    }

    /// Cache key for the effective URL.
    pub fn cache_key(&self) -> Result<String, SplatCamError> {
        Ok(format!("splat_{}", self.effective_url()?))
    }
}

/// Everything the renderer gets on init.
#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub config: ViewerConfig,
    pub url: String,
    pub data: Bytes,
    pub status: CacheStatus,
}

/// Splat renderer entry point.
pub trait SplatViewer: Send + Sync {
    fn init(&self, context: ViewerContext) -> Result<ViewerCleanup, SplatCamError>;
}

/// Teardown handle returned by a viewer. Runs exactly once, explicitly or
/// on drop.
pub struct ViewerCleanup {
    cleanup: Option<Box<dyn FnOnce() + Send>>,
}

impl ViewerCleanup {
    pub fn new(cleanup: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cleanup: Some(Box::new(cleanup)),
        }
    }

    pub fn noop() -> Self {
        Self { cleanup: None }
    }

    pub fn run(mut self) {
        self.run_once();
    }

    fn run_once(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
            log::debug!("Viewer cleanup completed");
        }
    }
}

impl Drop for ViewerCleanup {
    fn drop(&mut self) {
        self.run_once();
    }
}

impl std::fmt::Debug for ViewerCleanup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerCleanup")
            .field("pending", &self.cleanup.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_effective_url_resolves_against_base() {
        let config = ViewerConfig {
            scene_url: Some("room.splat".to_string()),
            base_url: Some("https://cdn.example.com/scenes/base.splat".to_string()),
            single: true,
        };
        assert_eq!(
            config.effective_url().unwrap(),
            "https://cdn.example.com/scenes/room.splat"
        );
        assert_eq!(
            config.cache_key().unwrap(),
            "splat_https://cdn.example.com/scenes/room.splat"
        );
    }

    #[test]
    fn test_effective_url_defaults() {
        let no_base = ViewerConfig {
            scene_url: None,
            base_url: None,
            single: true,
        };
        assert_eq!(no_base.effective_url().unwrap(), DEFAULT_SCENE);

        let absolute = ViewerConfig::for_scene("https://other.example.com/x.splat");
        assert_eq!(
            absolute.effective_url().unwrap(),
            "https://other.example.com/x.splat"
        );

        let bad = ViewerConfig {
            base_url: Some("not a url".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad.effective_url(), Err(SplatCamError::Config(_))));
    }

    #[test]
    fn test_cleanup_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let cleanup = ViewerCleanup::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        cleanup.run();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let c = count.clone();
        drop(ViewerCleanup::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
