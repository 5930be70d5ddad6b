// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{AUTO_FOCUS_INTERVAL_MS, DECODE_START_DELAY_MS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scanning pipeline configuration
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Delay between streaming start and the first frame request (milliseconds)
    pub decode_start_delay_ms: u64,
    /// Interval between autofocus attempts (milliseconds)
    pub focus_interval_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            decode_start_delay_ms: DECODE_START_DELAY_MS, // Let streaming stabilise first
            focus_interval_ms: AUTO_FOCUS_INTERVAL_MS,    // Paces the focus cycle
        }
    }
}

impl ScanConfig {
    /// Delay before the first frame request as a [`Duration`]
    pub fn decode_start_delay(&self) -> Duration {
        Duration::from_millis(self.decode_start_delay_ms)
    }

    /// Focus re-arm interval as a [`Duration`]
    pub fn focus_interval(&self) -> Duration {
        Duration::from_millis(self.focus_interval_ms)
    }
}
