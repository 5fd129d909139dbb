//! Command-line front end for the image upload chain.
//!
//! Picks an image from the command line, submits it, prints every status
//! transition and upload progress, and cancels the chain on Ctrl-C.

use anyhow::{bail, Context, Result};
use clap::Parser;
use imagechain::notify::BroadcastProgressObserver;
use imagechain::observability::init_tracing;
use imagechain::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Optimize an image, upload it and clean up the generated files.
#[derive(Debug, Parser)]
#[command(name = "imagechain", version, about)]
struct Cli {
    /// Image to upload.
    image: PathBuf,

    /// JSON configuration file.
    #[arg(short, long, env = "IMAGECHAIN_CONFIG")]
    config: Option<PathBuf>,

    /// Upload endpoint URL.
    #[arg(short, long, env = "IMAGECHAIN_ENDPOINT")]
    endpoint: Option<String>,

    /// Directory receiving generated files.
    #[arg(short, long, env = "IMAGECHAIN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Longest side of the uploaded image, in pixels.
    #[arg(long)]
    max_dimension: Option<u32>,

    /// JPEG quality of the uploaded image.
    #[arg(long)]
    quality: Option<u8>,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn load_config(&self) -> Result<ChainConfig> {
        let mut config = match &self.config {
            Some(path) => ChainConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ChainConfig::default(),
        };
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint.clone());
        }
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir.clone());
        }
        if let Some(max_dimension) = self.max_dimension {
            config.max_dimension = max_dimension;
        }
        if let Some(quality) = self.quality {
            config.jpeg_quality = quality;
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs).context("Failed to initialize logging")?;

    let config = cli.load_config()?;
    let uploader = Arc::new(HttpUploader::from_config(&config)?);
    let progress = Arc::new(BroadcastProgressObserver::default());
    let mut progress_rx = progress.subscribe();

    let orchestrator = UploadOrchestrator::in_memory(uploader, config)?
        .with_notifier(Arc::new(LoggingNotifier))
        .with_progress_observer(progress);

    let image = ImageRef::from_path(&cli.image);
    let handle = orchestrator.submit(&image)?;
    let run_id = handle.run_id();
    info!(chain = CHAIN_NAME, %run_id, image = %image, "Submitted");

    if let Some(status) = handle.status() {
        println!("{}", status.state);
    }
    let mut statuses = handle.statuses();
    let mut last_percent = None;
    let terminal = loop {
        tokio::select! {
            status = statuses.changed() => {
                let Some(status) = status else {
                    bail!("Status stream closed before the chain finished");
                };
                if status.run_id != run_id {
                    continue;
                }
                println!("{}", status.state);
                if status.is_finished() {
                    break status;
                }
            }
            event = progress_rx.recv() => match event {
                Ok(event) => {
                    let percent = event.percent();
                    if last_percent != Some(percent) {
                        last_percent = Some(percent);
                        println!("  {} {percent}% ({}/{} bytes)", event.stage, event.bytes_done, event.bytes_total);
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Progress display fell behind"),
                Err(RecvError::Closed) => {}
            },
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                if orchestrator.cancel() {
                    println!("Cancelling...");
                }
            }
        }
    };

    match terminal.state {
        ChainState::Succeeded => {
            let token = terminal
                .output
                .as_ref()
                .and_then(WorkData::image)
                .map(|token| token.to_string())
                .unwrap_or_default();
            println!("Upload finished: {token}");
            Ok(())
        }
        ChainState::Cancelled => {
            println!("Upload cancelled");
            Ok(())
        }
        _ => bail!(
            "Upload failed: {}",
            terminal.error.as_deref().unwrap_or("unknown error")
        ),
    }
}
