// SPDX-License-Identifier: GPL-3.0-only

//! Region-of-interest selection and rescaling
//!
//! The crop rectangle is expressed in preview-pixel coordinates. When the
//! device reports preview dimensions different from the ones the rectangle
//! was computed against, each edge is rescaled proportionally before use, so
//! the rectangle is never applied to data it was not rescaled against.

use tracing::debug;

/// A rectangle within a frame, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    /// Left edge
    pub left: u32,
    /// Top edge
    pub top: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Rect {
    /// Create a rectangle from its left/top corner and size
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Optional decode crop region with proportional rescaling.
///
/// Mutated only by the control context; the decode worker receives a plain
/// [`Rect`] copy with each request, never a live reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionOfInterest {
    rect: Rect,
    /// Preview dimensions the rectangle was last computed against.
    /// `None` means the rectangle is used verbatim and never rescaled.
    reference: Option<(u32, u32)>,
}

impl RegionOfInterest {
    /// Region used verbatim, without rescaling
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            reference: None,
        }
    }

    /// Region expressed against known preview dimensions.
    ///
    /// When the device later reports different dimensions, the rectangle is
    /// rescaled by `new / old` per axis before use.
    pub fn with_reference(rect: Rect, preview_width: u32, preview_height: u32) -> Self {
        Self {
            rect,
            reference: Some((preview_width, preview_height)),
        }
    }

    /// Rectangle to crop against a preview of the given dimensions.
    ///
    /// Rescales and re-anchors the stored rectangle when the dimensions
    /// changed; idempotent for repeated calls with identical dimensions.
    pub fn current_region(&mut self, preview_width: u32, preview_height: u32) -> Rect {
        if let Some((old_width, old_height)) = self.reference
            && (old_width, old_height) != (preview_width, preview_height)
            && old_width > 0
            && old_height > 0
        {
            let width_ratio = preview_width as f64 / old_width as f64;
            let height_ratio = preview_height as f64 / old_height as f64;
            self.rect = Rect {
                left: (self.rect.left as f64 * width_ratio) as u32,
                top: (self.rect.top as f64 * height_ratio) as u32,
                width: (self.rect.width as f64 * width_ratio) as u32,
                height: (self.rect.height as f64 * height_ratio) as u32,
            };
            debug!(
                old_width,
                old_height,
                preview_width,
                preview_height,
                rect = ?self.rect,
                "Rescaled region of interest"
            );
            self.reference = Some((preview_width, preview_height));
        }
        self.rect
    }
}
