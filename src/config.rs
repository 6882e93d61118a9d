//! Configuration management for splatcam
//!
//! Provides loading, saving and layering of capture, service, streaming,
//! delivery, storage and viewer settings.

use crate::capture::encoder::MAX_DIMENSION;
use crate::errors::SplatCamError;
use crate::job::JobClient;
use crate::pipeline::{DeliveryMode, ScreenOptions};
use crate::transport::StreamOptions;
use crate::types::{CaptureSettings, FacingMode, FrameEncoding, MediaType};
use crate::viewer::ViewerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "SPLATCAM";

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplatCamConfig {
    pub capture: CaptureConfig,
    pub api: ApiConfig,
    pub stream: StreamConfig,
    pub delivery: DeliveryConfig,
    pub storage: StorageConfig,
    pub viewer: ViewerConfig,
}

/// Camera sampling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Frames sampled per second
    pub fps: u32,
    /// Encoded frame type (image/webp or image/jpeg)
    pub media_type: MediaType,
    /// Encoder quality (0.0-1.0)
    pub quality: f32,
    pub width: u32,
    pub height: u32,
    /// Preferred camera (user or environment)
    pub facing: FacingMode,
}

/// Reconstruction service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the submit/status/result endpoints
    pub base_url: String,
    /// Delay between status polls in milliseconds
    pub poll_interval_ms: u64,
}

/// Streaming transport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// WebSocket endpoint for stream delivery
    pub url: Option<String>,
    pub max_queue_size: usize,
    pub batch_size: usize,
    pub batch_interval_ms: u64,
}

/// How a capture is delivered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    pub mode: DeliveryMode,
    /// Frames submitted per batch job (1-2)
    pub upload_frames: usize,
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Where downloaded splats are written
    pub output_directory: String,
    /// Where viewer scenes are cached
    pub cache_directory: String,
}

impl Default for SplatCamConfig {
    fn default() -> Self {
        let encoding = FrameEncoding::default();
        Self {
            capture: CaptureConfig {
                fps: 5,
                media_type: encoding.media_type,
                quality: encoding.quality,
                width: 1280,
                height: 720,
                facing: FacingMode::Environment,
            },
            api: ApiConfig {
                base_url: "http://localhost:8000".to_string(),
                poll_interval_ms: 2000,
            },
            stream: StreamConfig {
                url: None,
                max_queue_size: 50,
                batch_size: 1,
                batch_interval_ms: 0,
            },
            delivery: DeliveryConfig {
                mode: DeliveryMode::Batch,
                upload_frames: 2,
            },
            storage: StorageConfig {
                output_directory: "./splats".to_string(),
                cache_directory: "./splats/cache".to_string(),
            },
            viewer: ViewerConfig::default(),
        }
    }
}

impl SplatCamConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SplatCamError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| SplatCamError::Config(format!("Failed to read config file: {}", e)))?;

        let config: SplatCamConfig = toml::from_str(&contents)
            .map_err(|e| SplatCamError::Config(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SplatCamError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SplatCamError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| SplatCamError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| SplatCamError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Defaults, then an optional TOML file, then `SPLATCAM_*` variables
    /// (`SPLATCAM_API__BASE_URL` sets `api.base_url`).
    pub fn load_layered(path: Option<&Path>) -> Result<Self, SplatCamError> {
        let defaults = toml::to_string(&Self::default())
            .map_err(|e| SplatCamError::Config(format!("Failed to serialize defaults: {}", e)))?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults,
            config::FileFormat::Toml,
        ));
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: SplatCamConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| SplatCamError::Config(format!("Failed to load configuration: {}", e)))?;

        config.validate().map_err(SplatCamError::Config)?;
        Ok(config)
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("splatcam.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.capture.fps == 0 || self.capture.fps > 60 {
            return Err("Invalid FPS (must be 1-60)".to_string());
        }
        if !(0.0..=1.0).contains(&self.capture.quality) {
            return Err("Quality must be between 0.0 and 1.0".to_string());
        }
        let dimension = 1..=MAX_DIMENSION;
        if !dimension.contains(&self.capture.width) || !dimension.contains(&self.capture.height) {
            return Err(format!(
                "Invalid capture dimensions (each must be 1-{})",
                MAX_DIMENSION
            ));
        }

        if self.api.base_url.trim().is_empty() {
            return Err("API base URL must not be empty".to_string());
        }
        if self.api.poll_interval_ms == 0 {
            return Err("Poll interval must be positive".to_string());
        }

        if self.stream.max_queue_size == 0 {
            return Err("Stream queue size must be positive".to_string());
        }
        if self.stream.batch_size == 0 {
            return Err("Stream batch size must be positive".to_string());
        }
        if let Some(url) = &self.stream.url {
            if url.trim().is_empty() {
                return Err("Stream URL must not be empty".to_string());
            }
        }
        if self.delivery.mode == DeliveryMode::Stream && self.stream.url.is_none() {
            return Err("Stream delivery requires stream.url".to_string());
        }

        if self.delivery.upload_frames == 0 || self.delivery.upload_frames > 2 {
            return Err("Upload frames must be between 1 and 2".to_string());
        }

        if self.storage.output_directory.trim().is_empty() {
            return Err("Output directory must not be empty".to_string());
        }

        Ok(())
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings::default()
            .with_fps(self.capture.fps)
            .with_encoding(self.capture.media_type, self.capture.quality)
            .with_dimensions(self.capture.width, self.capture.height)
            .with_facing(self.capture.facing)
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            max_queue_size: self.stream.max_queue_size,
            batch_size: self.stream.batch_size,
            batch_interval_ms: self.stream.batch_interval_ms,
        }
    }

    pub fn screen_options(&self) -> ScreenOptions {
        ScreenOptions {
            mode: self.delivery.mode,
            upload_frames: self.delivery.upload_frames,
            stream_url: self.stream.url.clone(),
            stream: self.stream_options(),
        }
    }

    pub fn job_client(&self) -> Result<JobClient, SplatCamError> {
        Ok(JobClient::new(self.api.base_url.clone())?
            .with_poll_interval(Duration::from_millis(self.api.poll_interval_ms)))
    }
}
