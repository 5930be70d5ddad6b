// SPDX-License-Identifier: GPL-3.0-only

//! QR decoding via the rqrr crate

use super::{Decoder, LuminanceView};
use tracing::{debug, trace};

/// QR decoder backed by [`rqrr`].
///
/// Detects at most one grid per attempt; the pipeline scans a single
/// symbology, and multiple codes in view resolve to the first decodable one.
#[derive(Debug, Default)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for RqrrDecoder {
    fn decode(&mut self, luma: &LuminanceView<'_>) -> Option<String> {
        if luma.width() == 0 || luma.height() == 0 {
            return None;
        }
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            luma.width() as usize,
            luma.height() as usize,
            |x, y| luma.sample(x, y),
        );
        let grids = prepared.detect_grids();
        trace!(count = grids.len(), "Detected candidate grids");
        for grid in grids {
            match grid.decode() {
                Ok((_meta, content)) => return Some(content),
                Err(e) => {
                    // A grid that fails to decode is treated as no match
                    debug!(error = %e, "Grid decode failed");
                }
            }
        }
        None
    }

    fn reset(&mut self) {
        // rqrr keeps no state across prepare() calls; nothing to clear
    }
}
