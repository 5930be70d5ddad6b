// SPDX-License-Identifier: GPL-3.0-only

//! Decoder abstraction
//!
//! The pipeline treats decoding as an opaque call: a luminance view goes in,
//! recognised text or "no match" comes out. Decode errors are never
//! distinguished from "nothing found".

pub mod qr;
pub mod still;

pub use qr::RqrrDecoder;

use crate::pipeline::region::Rect;
use crate::source::Frame;

/// Result of one decode attempt.
///
/// Produced once per requested frame and consumed exactly once by the
/// pipeline controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A symbol was recognised
    Success(String),
    /// Nothing recognised (includes decode errors)
    NoMatch,
}

/// Read-only luminance window over a frame, limited to a region of interest.
///
/// Rows are addressed in view coordinates; the view clamps its region to the
/// frame bounds so out-of-range crops degrade instead of panicking.
pub struct LuminanceView<'a> {
    data: &'a [u8],
    stride: u32,
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

impl<'a> LuminanceView<'a> {
    /// View over the whole frame
    pub fn full(frame: &'a Frame) -> Self {
        Self {
            data: &frame.data,
            stride: frame.width,
            left: 0,
            top: 0,
            width: frame.width,
            height: frame.height,
        }
    }

    /// View limited to `rect`, clamped to the frame bounds
    pub fn cropped(frame: &'a Frame, rect: Rect) -> Self {
        let left = rect.left.min(frame.width);
        let top = rect.top.min(frame.height);
        let width = rect.width.min(frame.width - left);
        let height = rect.height.min(frame.height - top);
        Self {
            data: &frame.data,
            stride: frame.width,
            left,
            top,
            width,
            height,
        }
    }

    /// View width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// View height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sample the luminance at view coordinates (x, y)
    pub fn sample(&self, x: usize, y: usize) -> u8 {
        let px = self.left as usize + x.min(self.width.saturating_sub(1) as usize);
        let py = self.top as usize + y.min(self.height.saturating_sub(1) as usize);
        self.data
            .get(py * self.stride as usize + px)
            .copied()
            .unwrap_or(0)
    }

    /// One row of the view as a slice
    pub fn row(&self, y: u32) -> &[u8] {
        let y = y.min(self.height.saturating_sub(1));
        let start = (self.top + y) as usize * self.stride as usize + self.left as usize;
        &self.data[start..start + self.width as usize]
    }
}

/// Opaque symbol decoder.
///
/// `decode` returns the recognised text or `None`; implementations fold any
/// internal error into `None`. `reset` is invoked after every attempt,
/// successful or not, so state from one frame cannot leak into the next.
pub trait Decoder: Send {
    /// Attempt to decode one symbol from the view
    fn decode(&mut self, luma: &LuminanceView<'_>) -> Option<String>;

    /// Clear internal state between attempts
    fn reset(&mut self) {}
}

/// Factory producing a fresh decoder for each scan session's worker
pub type DecoderFactory = Box<dyn Fn() -> Box<dyn Decoder> + Send + Sync>;
