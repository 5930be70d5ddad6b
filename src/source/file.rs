// SPDX-License-Identifier: GPL-3.0-only

//! Image-backed frame source
//!
//! Serves the luminance plane of a still image as live preview frames,
//! paced at a fixed interval. Useful for demos and end-to-end testing
//! without camera hardware.

use super::{FocusDone, FocusMode, Frame, FrameSink, FrameSource};
use crate::errors::{SourceError, SourceResult};
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Default delivery pacing, roughly 30 fps
const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Frame source backed by a still image file.
///
/// Must be driven from within a tokio runtime: frame delivery is paced by a
/// spawned timer task so `request_next_frame` never blocks the caller.
pub struct FileFrameSource {
    luma: Arc<[u8]>,
    width: u32,
    height: u32,
    frame_interval: Duration,
    open: AtomicBool,
    streaming: AtomicBool,
    torch: AtomicBool,
    pending: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl FileFrameSource {
    /// Load an image file and use its luminance plane as the frame content
    pub fn from_image_file(path: &Path) -> SourceResult<Self> {
        let img = image::open(path)
            .map_err(|e| SourceError::OpenFailed(format!("{}: {}", path.display(), e)))?;
        let luma = img.to_luma8();
        let (width, height) = luma.dimensions();
        info!(path = %path.display(), width, height, "Loaded image as frame source");
        Ok(Self::from_luma(luma.into_raw(), width, height))
    }

    /// Build a source from a raw luminance buffer
    pub fn from_luma(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            luma: Arc::from(data.as_slice()),
            width,
            height,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            open: AtomicBool::new(false),
            streaming: AtomicBool::new(false),
            torch: AtomicBool::new(false),
            pending: Mutex::new(None),
        }
    }

    /// Override the delivery pacing interval
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    fn cancel_pending(&self) {
        if let Some(task) = self.pending.lock().unwrap().take() {
            task.abort();
        }
    }
}

impl FrameSource for FileFrameSource {
    fn open(&self) -> SourceResult<()> {
        self.open.store(true, Ordering::SeqCst);
        debug!("File frame source opened");
        Ok(())
    }

    fn close(&self) {
        self.cancel_pending();
        self.streaming.store(false, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        debug!("File frame source closed");
    }

    fn start_streaming(&self) -> SourceResult<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(SourceError::StreamingFailed("device not open".to_string()));
        }
        self.streaming.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_streaming(&self) {
        self.cancel_pending();
        self.streaming.store(false, Ordering::SeqCst);
    }

    fn request_next_frame(&self, sink: Option<FrameSink>) {
        self.cancel_pending();
        let Some(sink) = sink else {
            return;
        };
        if !self.streaming.load(Ordering::SeqCst) {
            debug!("Frame requested while not streaming; dropping request");
            return;
        }

        let data = Arc::clone(&self.luma);
        let (width, height) = (self.width, self.height);
        let interval = self.frame_interval;
        let task = tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            sink.deliver(Frame {
                data,
                width,
                height,
                captured_at: std::time::Instant::now(),
            });
        });
        *self.pending.lock().unwrap() = Some(task);
    }

    fn preview_dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_torch(&self, on: bool) {
        self.torch.store(on, Ordering::SeqCst);
    }

    fn supported_focus_modes(&self) -> Vec<FocusMode> {
        // Fixed focus: the image is always sharp
        Vec::new()
    }

    fn set_focus_mode(&self, mode: FocusMode) -> SourceResult<()> {
        Err(SourceError::Rejected(format!(
            "focus mode {} not supported",
            mode
        )))
    }

    fn trigger_focus(&self, _done: FocusDone) -> SourceResult<()> {
        Err(SourceError::Rejected("focus not supported".to_string()))
    }

    fn cancel_focus(&self) -> SourceResult<()> {
        Ok(())
    }
}
