// SPDX-License-Identifier: GPL-3.0-only

//! CLI command implementations

use qrscan::decoder::still::decode_image_file;
use qrscan::source::FileFrameSource;
use qrscan::{DecodeOutcome, RqrrDecoder, ScanConfig, ScanPipeline, StatusListener};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Decode a QR code from a still image and print the result
pub fn scan_image(image: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match decode_image_file(&image)? {
        DecodeOutcome::Success(text) => println!("{}", text),
        DecodeOutcome::NoMatch => {
            eprintln!("No QR code found in {}", image.display());
            std::process::exit(1);
        }
    }
    Ok(())
}

enum WatchEvent {
    Success(String),
    OpenFailed,
    Interrupted,
}

struct ChannelListener {
    tx: mpsc::UnboundedSender<WatchEvent>,
}

impl StatusListener for ChannelListener {
    fn on_device_open_failed(&self) {
        let _ = self.tx.send(WatchEvent::OpenFailed);
    }

    fn on_decode_success(&self, text: &str) {
        let _ = self.tx.send(WatchEvent::Success(text.to_string()));
    }
}

/// Run the live pipeline against an image-backed frame source until the
/// first hit or Ctrl-C
pub fn watch_file(
    image: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path.as_deref())?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let source = Arc::new(FileFrameSource::from_image_file(&image)?);
        let (tx, mut events) = mpsc::unbounded_channel();

        let interrupt_tx = tx.clone();
        ctrlc::set_handler(move || {
            let _ = interrupt_tx.send(WatchEvent::Interrupted);
        })?;

        let pipeline = ScanPipeline::new(
            source,
            Box::new(|| Box::new(RqrrDecoder::new())),
            Arc::new(ChannelListener { tx }),
            config,
        );
        pipeline.resume(true)?;
        info!(image = %image.display(), "Watching for QR codes");

        let result: Result<(), Box<dyn std::error::Error>> = match events.recv().await {
            Some(WatchEvent::Success(text)) => {
                println!("{}", text);
                Ok(())
            }
            Some(WatchEvent::OpenFailed) => Err("failed to open frame source".into()),
            Some(WatchEvent::Interrupted) | None => {
                eprintln!("Interrupted");
                Ok(())
            }
        };

        pipeline.shutdown().await?;
        result
    })
}

fn load_config(path: Option<&Path>) -> Result<ScanConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => Ok(ScanConfig::default()),
    }
}
