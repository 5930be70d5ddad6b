// SPDX-License-Identifier: GPL-3.0-only

//! Frame source abstraction
//!
//! This module defines the pull-model device contract the pipeline consumes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   ScanPipeline      │  ← Caller-facing lifecycle API
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ PipelineController  │  ← Control task, state machine
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  FrameSource trait  │  ← Single-shot pull-model device contract
//! └──────────┬──────────┘
//!            │
//!            ▼
//!    ┌───────────────┐
//!    │ FileFrameSource│  ← Image-backed demo implementation
//!    └───────────────┘
//! ```
//!
//! The device never pushes unsolicited frames: every frame delivery is the
//! answer to exactly one `request_next_frame` call, and the [`FrameSink`]
//! token is consumed by the delivery so a second push is impossible.

pub mod file;
pub mod types;

pub use file::FileFrameSource;
pub use types::{FocusMode, Frame};

use crate::errors::SourceResult;
use tokio::sync::{mpsc, oneshot};

/// Single-shot frame delivery token.
///
/// Handed to the device with a frame request; `deliver` consumes the sink,
/// so the device can satisfy a request at most once. Dropping the sink
/// without delivering (deregistration, device teardown) is allowed.
pub struct FrameSink {
    session: u64,
    tx: mpsc::UnboundedSender<(u64, Frame)>,
}

impl FrameSink {
    pub(crate) fn new(session: u64, tx: mpsc::UnboundedSender<(u64, Frame)>) -> Self {
        Self { session, tx }
    }

    /// Deliver exactly one frame, consuming the sink.
    pub fn deliver(self, frame: Frame) {
        // Send failure means the controller is gone; the frame is dropped.
        let _ = self.tx.send((self.session, frame));
    }
}

impl std::fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FrameSink(session {})", self.session)
    }
}

/// Single-shot focus completion token.
///
/// Passed to `trigger_focus`; the device calls `complete` when the focus
/// attempt finishes. Dropping it unfinished counts as a failed attempt.
pub struct FocusDone(oneshot::Sender<bool>);

impl FocusDone {
    pub(crate) fn new(tx: oneshot::Sender<bool>) -> Self {
        Self(tx)
    }

    /// Report the outcome of the focus attempt, consuming the token.
    pub fn complete(self, success: bool) {
        let _ = self.0.send(success);
    }
}

impl std::fmt::Debug for FocusDone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FocusDone")
    }
}

/// Pull-model camera-like device contract
///
/// All frame source implementations must provide:
/// - Device lifecycle (open, close)
/// - Preview streaming control
/// - Single-shot frame requests (at most one frame per request)
/// - Torch and focus control
///
/// The device is treated as a single-owner resource: the implementation is
/// responsible for internally serialising focus operations against preview
/// frame delivery. Implementations must be cheap to call from the control
/// task; anything slow belongs on the device's own threads.
pub trait FrameSource: Send + Sync {
    /// Open the device.
    ///
    /// This is the only fatal, non-retried failure in the pipeline: an error
    /// here is surfaced once to the caller and the pipeline stays idle.
    fn open(&self) -> SourceResult<()>;

    /// Close the device and release it
    fn close(&self);

    /// Start preview streaming on an open device
    fn start_streaming(&self) -> SourceResult<()>;

    /// Stop preview streaming
    fn stop_streaming(&self);

    /// Register (or clear) interest in the next preview frame.
    ///
    /// `Some(sink)` asks the device to deliver exactly one frame; the device
    /// keeps no registration once the sink is consumed. `None` deregisters a
    /// pending request so no further frame is delivered.
    fn request_next_frame(&self, sink: Option<FrameSink>);

    /// Current preview dimensions as (width, height)
    fn preview_dimensions(&self) -> (u32, u32);

    /// Turn the torch on or off (best effort)
    fn set_torch(&self, on: bool);

    /// Focus modes this device supports.
    ///
    /// Queried once at session start; the focus controller computes its
    /// fallback ladder from this list instead of probing at runtime.
    fn supported_focus_modes(&self) -> Vec<FocusMode>;

    /// Select the active focus mode
    fn set_focus_mode(&self, mode: FocusMode) -> SourceResult<()>;

    /// Start a single focus attempt.
    ///
    /// A synchronous `Err` means the driver rejected the call outright; on
    /// `Ok` the device reports the attempt's outcome through `done` exactly
    /// once.
    fn trigger_focus(&self, done: FocusDone) -> SourceResult<()>;

    /// Cancel an in-flight focus attempt (advisory, best effort)
    fn cancel_focus(&self) -> SourceResult<()>;
}
