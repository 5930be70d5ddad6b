// SPDX-License-Identifier: GPL-3.0-only

//! qrscan - continuous QR code scanning pipeline
//!
//! This library drives continuous, low-latency QR recognition from a live
//! video feed: it pulls frames from a camera-like device one at a time,
//! hands each frame to a decoder running off the capture path, periodically
//! re-focuses the optics, and reports results back to the caller without
//! ever blocking the device's capture thread or a UI thread.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`pipeline`]: the control-task state machine, decode worker and focus cycle
//! - [`source`]: the pull-model device abstraction consumed by the pipeline
//! - [`decoder`]: the opaque decode seam and its rqrr-backed implementation
//! - [`config`]: pipeline timing configuration
//! - [`errors`]: error taxonomy
//!
//! # Example
//!
//! ```ignore
//! let source = Arc::new(FileFrameSource::from_image_file(path)?);
//! let pipeline = ScanPipeline::new(
//!     source,
//!     Box::new(|| Box::new(RqrrDecoder::new())),
//!     listener,
//!     ScanConfig::default(),
//! );
//! pipeline.resume(true)?;
//! ```

pub mod config;
pub mod constants;
pub mod decoder;
pub mod errors;
pub mod pipeline;
pub mod source;

// Re-export commonly used types
pub use config::ScanConfig;
pub use decoder::{DecodeOutcome, Decoder, DecoderFactory, RqrrDecoder};
pub use errors::{PipelineError, SourceError};
pub use pipeline::{PipelineState, Rect, RegionOfInterest, ScanPipeline, StatusListener};
pub use source::{FileFrameSource, FocusMode, Frame, FrameSource};
