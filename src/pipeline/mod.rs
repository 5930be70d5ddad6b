// SPDX-License-Identifier: GPL-3.0-only

//! The frame-acquisition / decode / focus pipeline
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  single frame   ┌────────────────────┐
//! │ FrameSource │ ───────────────▶│ PipelineController │
//! └─────────────┘                 └─────────┬──────────┘
//!        ▲                                  │ frame + region
//!        │ focus cycle                      ▼
//! ┌──────┴──────────┐            ┌──────────────────┐
//! │ FocusController │            │   DecodeWorker   │
//! └─────────────────┘            └─────────┬────────┘
//!                                          │ outcome message
//!                                          ▼
//!                                 result callback to caller
//! ```
//!
//! Three logical execution contexts: the control task (state machine and
//! device callbacks), the decode worker thread, and the focus cycle task.
//! They share no mutable state; everything crosses on typed channels.

pub mod controller;
pub mod decode_worker;
pub mod focus;
pub mod region;

pub use controller::{PipelineState, ScanPipeline, StatusListener};
pub use focus::{FocusController, FocusState};
pub use region::{Rect, RegionOfInterest};
