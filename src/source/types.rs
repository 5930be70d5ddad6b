// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for frame sources

use std::sync::Arc;
use std::time::Instant;

/// A single captured preview frame.
///
/// Holds a packed 8-bit luminance plane (row-major, `width * height` bytes).
/// The frame is immutable and moved through the pipeline: captured by the
/// source, transferred to the decode worker, dropped after one decode cycle.
#[derive(Clone)]
pub struct Frame {
    /// Luminance plane, `width * height` bytes
    pub data: Arc<[u8]>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Capture timestamp
    pub captured_at: Instant,
}

impl Frame {
    /// Create a frame from a luminance buffer.
    ///
    /// The buffer must hold at least `width * height` bytes.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert!(data.len() >= (width as usize) * (height as usize));
        Self {
            data: Arc::from(data.as_slice()),
            width,
            height,
            captured_at: Instant::now(),
        }
    }

    /// Length of the luminance buffer in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the frame holds no data
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Frame({}x{}, {} bytes)",
            self.width,
            self.height,
            self.data.len()
        )
    }
}

/// Focus modes a device may support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusMode {
    /// Continuous picture-taking focus, preferred when available
    ContinuousPicture,
    /// Single-shot autofocus
    Auto,
    /// Close-range single-shot focus
    Macro,
}

impl std::fmt::Display for FocusMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FocusMode::ContinuousPicture => write!(f, "continuous-picture"),
            FocusMode::Auto => write!(f, "auto"),
            FocusMode::Macro => write!(f, "macro"),
        }
    }
}
