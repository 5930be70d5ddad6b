// SPDX-License-Identifier: GPL-3.0-only

//! Timing constants for the scanning pipeline

/// Interval between autofocus attempts in milliseconds.
///
/// Each completed (or rejected) focus attempt re-arms a one-shot timer of
/// this length before the next attempt, so focus never busy-loops.
pub const AUTO_FOCUS_INTERVAL_MS: u64 = 1200;

/// Delay in milliseconds between streaming start and the first frame request.
///
/// Gives the device a moment to stabilise exposure before decoding begins.
pub const DECODE_START_DELAY_MS: u64 = 100;

/// Maximum long-edge dimension for still-image decoding.
///
/// Larger images are downscaled before detection; QR codes are typically
/// large enough to survive this and detection gets much faster.
pub const STILL_DECODE_MAX_DIMENSION: u32 = 640;

/// Name of the dedicated decode worker thread
pub const DECODE_THREAD_NAME: &str = "qrscan-decode";
