// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanning pipeline

use std::fmt;

/// Result type alias for frame source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type alias for pipeline lifecycle operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors reported by a [`crate::source::FrameSource`] implementation
#[derive(Debug, Clone)]
pub enum SourceError {
    /// Device could not be opened (I/O error or driver-runtime rejection)
    OpenFailed(String),
    /// Streaming could not be started on an open device
    StreamingFailed(String),
    /// Driver rejected an operation at runtime (focus trigger, mode change, ...)
    Rejected(String),
    /// Device disconnected during operation
    Disconnected,
}

/// Errors surfaced by the pipeline's caller-facing API
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// Operation on a pipeline that has already been shut down
    AlreadyStopped,
    /// Source error surfaced through the pipeline
    Source(SourceError),
    /// Storage/filesystem errors (still-image decoding)
    Storage(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::OpenFailed(msg) => write!(f, "Failed to open device: {}", msg),
            SourceError::StreamingFailed(msg) => write!(f, "Failed to start streaming: {}", msg),
            SourceError::Rejected(msg) => write!(f, "Driver rejected operation: {}", msg),
            SourceError::Disconnected => write!(f, "Device disconnected"),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::AlreadyStopped => write!(f, "Pipeline already stopped"),
            PipelineError::Source(e) => write!(f, "Source error: {}", e),
            PipelineError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}
impl std::error::Error for PipelineError {}

impl From<SourceError> for PipelineError {
    fn from(err: SourceError) -> Self {
        PipelineError::Source(err)
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Storage(err.to_string())
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::Storage(err.to_string())
    }
}
