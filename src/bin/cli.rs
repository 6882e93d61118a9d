//! splatcam command-line interface
//!
//! Drives the capture and reconstruction pipeline headless: submit stills,
//! poll jobs, fetch results, or run a full capture session.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use splatcam::capture::NullPreview;
use splatcam::job::{DiskArtifactSink, JobClient};
use splatcam::pipeline::{
    CaptureScreen, DeliveryMode, JobCoordinator, JobPhase, ScreenContext, StopOutcome,
};
use splatcam::platform::CameraSystem;
use splatcam::timing::{Clock, SystemClock};
use splatcam::types::{Frame, MediaType};
use splatcam::viewer::{SceneCache, SceneLoader, ViewerConfig};
use splatcam::SplatCamConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// splatcam - room capture to gaussian splat
#[derive(Parser, Debug)]
#[command(name = "splatcam")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); SPLATCAM_* variables override it
    #[arg(long, global = true, env = "SPLATCAM_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload up to two images, wait for the job and download the splat
    Submit {
        /// Image files (.webp, .jpg)
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Poll a job until it is done or failed
    Status {
        job_id: String,
    },
    /// Download an existing result without resubmitting
    Fetch {
        /// Retrieval token, e.g. ts1700000000
        timestamp: String,
    },
    /// Run a capture session against the configured service
    Capture {
        /// Seconds to record
        #[arg(long, default_value_t = 5)]
        seconds: u64,

        /// Delivery mode (batch or stream)
        #[arg(long)]
        mode: Option<DeliveryMode>,

        /// Use the synthetic camera instead of hardware
        #[arg(long)]
        synthetic: bool,

        /// Shopping category sent with the stream init
        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        surprise: bool,
    },
    /// Resolve a scene URL and load it into the scene cache
    Scene {
        /// Scene URL, absolute or relative to the base
        url: Option<String>,

        #[arg(long)]
        base: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose && std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "splatcam=debug");
    }
    splatcam::init_logging();

    let config = SplatCamConfig::load_layered(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("Interrupted, cancelling...");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;

    match cli.command {
        Commands::Submit { images } => cmd_submit(&config, &images, &cancel).await,
        Commands::Status { job_id } => cmd_status(&config, &job_id, &cancel).await,
        Commands::Fetch { timestamp } => cmd_fetch(&config, &timestamp, &cancel).await,
        Commands::Capture {
            seconds,
            mode,
            synthetic,
            category,
            surprise,
        } => {
            let context = ScreenContext {
                category,
                surprise,
                product_ids: Vec::new(),
            };
            cmd_capture(&config, seconds, mode, synthetic, context, &cancel).await
        }
        Commands::Scene { url, base } => cmd_scene(&config, url, base).await,
    }
}

fn coordinator(config: &SplatCamConfig) -> Result<JobCoordinator> {
    let client = config.job_client()?;
    let sink = DiskArtifactSink::new(&config.storage.output_directory);
    Ok(JobCoordinator::new(client, Arc::new(sink)))
}

fn read_frame(path: &Path) -> Result<Frame> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let media_type = MediaType::from_extension(ext)
        .with_context(|| format!("Unsupported image type: {}", path.display()))?;
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Frame::new(data, media_type.mime(), SystemClock.now_millis()))
}

/// Wait for the coordinator to settle, cancelling it on Ctrl-C.
async fn settle(coordinator: &JobCoordinator, cancel: &CancellationToken) -> Result<()> {
    let phase = tokio::select! {
        phase = coordinator.wait_settled() => phase,
        _ = cancel.cancelled() => {
            coordinator.cancel_current();
            return Ok(());
        }
    };

    match phase {
        JobPhase::Completed { location, .. } => {
            println!("Saved {}", location.display());
            Ok(())
        }
        JobPhase::Failed { message } => bail!(message),
        other => {
            log::debug!("Job settled as {:?}", other);
            Ok(())
        }
    }
}

async fn cmd_submit(
    config: &SplatCamConfig,
    images: &[PathBuf],
    cancel: &CancellationToken,
) -> Result<()> {
    let frames = images
        .iter()
        .map(|p| read_frame(p))
        .collect::<Result<Vec<_>>>()?;
    if frames.len() > splatcam::job::MAX_UPLOAD_FRAMES {
        log::warn!(
            "Only the first {} images are uploaded",
            splatcam::job::MAX_UPLOAD_FRAMES
        );
    }

    let coordinator = coordinator(config)?;
    let submitted = tokio::select! {
        result = coordinator.on_capture(frames) => result,
        _ = cancel.cancelled() => {
            coordinator.cancel_current();
            return Ok(());
        }
    };
    let handle = submitted.map_err(|e| anyhow::anyhow!(e.user_message()))?;
    println!("Job {} submitted (token {})", handle.job_id, handle.timestamp);

    settle(&coordinator, cancel).await
}

async fn cmd_status(
    config: &SplatCamConfig,
    job_id: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let client: JobClient = config.job_client()?;
    match client.poll_status(job_id, cancel).await {
        Ok(()) => {
            println!("Job {} done", job_id);
            Ok(())
        }
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => bail!(e.user_message()),
    }
}

async fn cmd_fetch(
    config: &SplatCamConfig,
    timestamp: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let coordinator = coordinator(config)?;
    let fetched = tokio::select! {
        result = coordinator.fetch_existing(timestamp) => result,
        _ = cancel.cancelled() => {
            coordinator.cancel_current();
            return Ok(());
        }
    };
    match fetched {
        Ok(path) => {
            println!("Saved {}", path.display());
            Ok(())
        }
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => bail!(e.user_message()),
    }
}

async fn cmd_capture(
    config: &SplatCamConfig,
    seconds: u64,
    mode: Option<DeliveryMode>,
    synthetic: bool,
    context: ScreenContext,
    cancel: &CancellationToken,
) -> Result<()> {
    let backend = if synthetic {
        CameraSystem::synthetic()
    } else {
        CameraSystem::default_backend()
    };

    let mut options = config.screen_options();
    if let Some(mode) = mode {
        options.mode = mode;
    }
    if options.mode == DeliveryMode::Stream && options.stream_url.is_none() {
        bail!("Stream mode needs stream.url (or SPLATCAM_STREAM__URL)");
    }

    let screen = CaptureScreen::new(
        backend,
        config.capture_settings(),
        NullPreview::default(),
        coordinator(config)?,
        options,
        context,
    );

    screen
        .enter()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open camera: {}", e.user_message()))?;
    if !screen.start().await? {
        bail!("Capture did not start");
    }
    println!(
        "Recording for {}s at {} fps ({:?} delivery)...",
        seconds,
        screen.adapter().fps(),
        screen.mode()
    );

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
        _ = cancel.cancelled() => {
            screen.exit().await;
            return Ok(());
        }
    }

    let stats = screen.adapter().stats();
    log::info!(
        "Sampled {} frame(s), {} tick(s) skipped, {} encode failure(s)",
        stats.frames_emitted,
        stats.ticks_skipped,
        stats.encode_failures
    );

    let result = match screen.stop().await {
        Ok(StopOutcome::Submitted(handle)) => {
            println!("Job {} submitted (token {})", handle.job_id, handle.timestamp);
            settle(screen.coordinator(), cancel).await
        }
        Ok(StopOutcome::Streamed(stats)) => {
            println!(
                "Streamed {} frame(s); {} dropped, {} lost",
                stats.sent,
                stats.dropped_backpressure + stats.dropped_not_ready,
                stats.lost_on_send_failure
            );
            Ok(())
        }
        Ok(StopOutcome::NothingCaptured) | Ok(StopOutcome::Idle) => {
            println!("No frames captured");
            Ok(())
        }
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(anyhow::anyhow!(e.user_message())),
    };

    screen.exit().await;
    result
}

async fn cmd_scene(
    config: &SplatCamConfig,
    url: Option<String>,
    base: Option<String>,
) -> Result<()> {
    let mut viewer = ViewerConfig {
        single: true,
        ..config.viewer.clone()
    };
    if url.is_some() {
        viewer.scene_url = url;
    }
    if base.is_some() {
        viewer.base_url = base;
    }

    let loader = SceneLoader::new(SceneCache::new(&config.storage.cache_directory))?;
    let scene = loader.load(&viewer).await?;
    println!("{} ({} bytes, {:?})", scene.url, scene.data.len(), scene.status);
    Ok(())
}
