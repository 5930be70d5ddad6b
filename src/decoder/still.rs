// SPDX-License-Identifier: GPL-3.0-only

//! Still-image decoding
//!
//! Decodes a QR code from an image file, off the live pipeline. Large
//! images are downscaled before detection; codes are typically large enough
//! to survive this and detection gets much faster.

use super::{DecodeOutcome, Decoder, LuminanceView, RqrrDecoder};
use crate::constants::STILL_DECODE_MAX_DIMENSION;
use crate::errors::PipelineResult;
use crate::source::Frame;
use std::path::Path;
use tracing::debug;

/// Decode a QR code from an image file.
///
/// Any decode failure folds into [`DecodeOutcome::NoMatch`]; only file
/// loading errors are surfaced.
pub fn decode_image_file(path: &Path) -> PipelineResult<DecodeOutcome> {
    let img = image::open(path)?;
    Ok(decode_image(&img))
}

/// Decode a QR code from an already-loaded image
pub fn decode_image(img: &image::DynamicImage) -> DecodeOutcome {
    let (width, height) = (img.width(), img.height());
    let luma = if width.max(height) > STILL_DECODE_MAX_DIMENSION {
        let resized = img.resize(
            STILL_DECODE_MAX_DIMENSION,
            STILL_DECODE_MAX_DIMENSION,
            image::imageops::FilterType::Triangle,
        );
        debug!(
            width,
            height,
            new_width = resized.width(),
            new_height = resized.height(),
            "Downscaled image before detection"
        );
        resized.to_luma8()
    } else {
        img.to_luma8()
    };

    let (w, h) = luma.dimensions();
    let frame = Frame::new(luma.into_raw(), w, h);
    let view = LuminanceView::full(&frame);

    let mut decoder = RqrrDecoder::new();
    let result = decoder.decode(&view);
    decoder.reset();
    match result {
        Some(text) => DecodeOutcome::Success(text),
        None => DecodeOutcome::NoMatch,
    }
}
