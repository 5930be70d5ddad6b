// SPDX-License-Identifier: GPL-3.0-only

//! Autofocus cycle
//!
//! Keeps the lens focused without overlapping focus operations or
//! busy-looping: one attempt at a time, re-armed on a fixed timer after each
//! completion. The focus mode is negotiated once from the device's reported
//! capabilities and only ever steps down within a session.

use crate::source::{FocusDone, FocusMode, FrameSource};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Negotiated focus capability level.
///
/// Downgrades monotonically `ContinuousPicture → SingleShotAutoOrMacro →
/// Unsupported` and never upgrades within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusState {
    /// No usable focus mode; the controller performs no further action
    Unsupported,
    /// Single-shot auto or macro focus
    SingleShotAutoOrMacro,
    /// Continuous picture-taking focus
    ContinuousPicture,
}

struct FocusShared {
    source: Arc<dyn FrameSource>,
    state: Mutex<FocusState>,
    /// True while a focus attempt is in flight; checked-and-set before each
    /// trigger so two attempts can never overlap.
    in_flight: AtomicBool,
    stopped: AtomicBool,
    stop_notify: Notify,
    /// Whether the capability list offers a single-shot fallback
    supports_single_shot: bool,
    interval: Duration,
}

/// Runs the independent, self-rescheduling focus cycle against the device.
pub struct FocusController {
    shared: Arc<FocusShared>,
    task: Option<JoinHandle<()>>,
}

impl FocusController {
    /// Negotiate a focus mode and start the cycle.
    ///
    /// Mode priority: continuous picture, then auto/macro as single-shot,
    /// else unsupported (no task is spawned). The first focus attempt runs
    /// immediately.
    pub fn start(source: Arc<dyn FrameSource>, interval: Duration) -> Self {
        let modes = source.supported_focus_modes();
        let supports_single_shot =
            modes.contains(&FocusMode::Auto) || modes.contains(&FocusMode::Macro);

        let initial = if modes.contains(&FocusMode::ContinuousPicture) {
            if let Err(e) = source.set_focus_mode(FocusMode::ContinuousPicture) {
                warn!(error = %e, "Failed to select continuous picture focus");
            }
            FocusState::ContinuousPicture
        } else if supports_single_shot {
            if let Err(e) = source.set_focus_mode(FocusMode::Auto) {
                warn!(error = %e, "Failed to select single-shot focus");
            }
            FocusState::SingleShotAutoOrMacro
        } else {
            FocusState::Unsupported
        };
        debug!(state = ?initial, "Negotiated focus mode");

        let shared = Arc::new(FocusShared {
            source,
            state: Mutex::new(initial),
            in_flight: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            stop_notify: Notify::new(),
            supports_single_shot,
            interval,
        });

        let task = if initial == FocusState::Unsupported {
            None
        } else {
            Some(tokio::spawn(run_focus_cycle(Arc::clone(&shared))))
        };

        Self {
            shared,
            task,
        }
    }

    /// Current negotiated focus level
    pub fn state(&self) -> FocusState {
        *self.shared.state.lock().unwrap()
    }

    /// Stop the cycle: cancel pending timers, issue a best-effort focus
    /// cancel, and wait for the task to exit.
    pub async fn stop(mut self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        self.shared.stop_notify.notify_waiters();
        if *self.shared.state.lock().unwrap() != FocusState::Unsupported {
            // Cancellation is advisory; driver errors here are swallowed
            if let Err(e) = self.shared.source.cancel_focus() {
                debug!(error = %e, "Ignoring focus cancel failure during stop");
            }
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        debug!("Focus controller stopped");
    }
}

async fn run_focus_cycle(shared: Arc<FocusShared>) {
    debug!("Focus cycle started");
    loop {
        if shared.stopped.load(Ordering::SeqCst) {
            break;
        }
        if *shared.state.lock().unwrap() == FocusState::Unsupported {
            break;
        }

        attempt_focus(&shared).await;

        if shared.stopped.load(Ordering::SeqCst)
            || *shared.state.lock().unwrap() == FocusState::Unsupported
        {
            break;
        }

        // One-shot retry timer, cancelled by stop()
        tokio::select! {
            _ = tokio::time::sleep(shared.interval) => {}
            _ = shared.stop_notify.notified() => break,
        }
    }
    debug!("Focus cycle exiting");
}

/// Run one focus attempt to completion.
///
/// No-op when stopped or when an attempt is already in flight. A synchronous
/// driver rejection steps the mode ladder down instead of propagating.
async fn attempt_focus(shared: &Arc<FocusShared>) {
    if shared.stopped.load(Ordering::SeqCst) {
        return;
    }
    if shared
        .in_flight
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return;
    }

    let (tx, rx) = oneshot::channel();
    match shared.source.trigger_focus(FocusDone::new(tx)) {
        Ok(()) => {
            // A dropped token counts as a failed attempt; either way the
            // cycle re-arms.
            tokio::select! {
                result = rx => {
                    let success = result.unwrap_or(false);
                    debug!(success, "Focus attempt completed");
                }
                _ = shared.stop_notify.notified() => {}
            }
            shared.in_flight.store(false, Ordering::SeqCst);
        }
        Err(e) => {
            shared.in_flight.store(false, Ordering::SeqCst);
            warn!(error = %e, "Focus trigger rejected by driver");
            downgrade(shared);
        }
    }
}

fn downgrade(shared: &FocusShared) {
    let mut state = shared.state.lock().unwrap();
    if *state == FocusState::ContinuousPicture {
        if shared.supports_single_shot {
            *state = FocusState::SingleShotAutoOrMacro;
            if let Err(e) = shared.source.set_focus_mode(FocusMode::Auto) {
                warn!(error = %e, "Failed to select single-shot focus after downgrade");
            }
            debug!("Focus downgraded to single-shot");
        } else {
            *state = FocusState::Unsupported;
            debug!("Focus downgraded to unsupported");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{SourceError, SourceResult};
    use crate::source::{FocusDone, FrameSink};

    #[derive(Default)]
    struct FakeFocusDevice {
        modes: Vec<FocusMode>,
        reject_trigger: bool,
        trigger_calls: Mutex<u32>,
        cancel_calls: Mutex<u32>,
        set_modes: Mutex<Vec<FocusMode>>,
        pending: Mutex<Option<FocusDone>>,
    }

    impl FakeFocusDevice {
        fn with_modes(modes: Vec<FocusMode>) -> Self {
            Self {
                modes,
                ..Default::default()
            }
        }

        fn trigger_calls(&self) -> u32 {
            *self.trigger_calls.lock().unwrap()
        }

        fn complete_pending(&self, success: bool) -> bool {
            match self.pending.lock().unwrap().take() {
                Some(done) => {
                    done.complete(success);
                    true
                }
                None => false,
            }
        }
    }

    impl FrameSource for FakeFocusDevice {
        fn open(&self) -> SourceResult<()> {
            Ok(())
        }
        fn close(&self) {}
        fn start_streaming(&self) -> SourceResult<()> {
            Ok(())
        }
        fn stop_streaming(&self) {}
        fn request_next_frame(&self, _sink: Option<FrameSink>) {}
        fn preview_dimensions(&self) -> (u32, u32) {
            (640, 480)
        }
        fn set_torch(&self, _on: bool) {}
        fn supported_focus_modes(&self) -> Vec<FocusMode> {
            self.modes.clone()
        }
        fn set_focus_mode(&self, mode: FocusMode) -> SourceResult<()> {
            self.set_modes.lock().unwrap().push(mode);
            Ok(())
        }
        fn trigger_focus(&self, done: FocusDone) -> SourceResult<()> {
            *self.trigger_calls.lock().unwrap() += 1;
            if self.reject_trigger {
                return Err(SourceError::Rejected("busy".to_string()));
            }
            *self.pending.lock().unwrap() = Some(done);
            Ok(())
        }
        fn cancel_focus(&self) -> SourceResult<()> {
            *self.cancel_calls.lock().unwrap() += 1;
            Ok(())
        }
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..400 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_no_second_trigger_while_in_flight() {
        let device = Arc::new(FakeFocusDevice::with_modes(vec![FocusMode::Auto]));
        let controller =
            FocusController::start(device.clone() as Arc<dyn FrameSource>, Duration::from_millis(20));

        wait_until(|| device.trigger_calls() == 1).await;
        // Completion withheld: no retry may fire no matter how long we wait
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(device.trigger_calls(), 1);

        assert!(device.complete_pending(true));
        wait_until(|| device.trigger_calls() == 2).await;

        controller.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sync_rejection_downgrades_continuous_to_single_shot() {
        let device = Arc::new(FakeFocusDevice {
            modes: vec![FocusMode::ContinuousPicture, FocusMode::Auto],
            reject_trigger: true,
            ..Default::default()
        });
        let controller =
            FocusController::start(device.clone() as Arc<dyn FrameSource>, Duration::from_millis(10));
        assert_eq!(controller.state(), FocusState::ContinuousPicture);

        wait_until(|| controller.state() == FocusState::SingleShotAutoOrMacro).await;
        assert!(device.set_modes.lock().unwrap().contains(&FocusMode::Auto));

        controller.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rejection_without_fallback_goes_unsupported_and_stops() {
        let device = Arc::new(FakeFocusDevice {
            modes: vec![FocusMode::ContinuousPicture],
            reject_trigger: true,
            ..Default::default()
        });
        let controller =
            FocusController::start(device.clone() as Arc<dyn FrameSource>, Duration::from_millis(5));

        wait_until(|| controller.state() == FocusState::Unsupported).await;
        let calls = device.trigger_calls();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(device.trigger_calls(), calls, "cycle must stop once unsupported");

        controller.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_no_modes_means_unsupported_and_no_triggers() {
        let device = Arc::new(FakeFocusDevice::with_modes(vec![]));
        let controller =
            FocusController::start(device.clone() as Arc<dyn FrameSource>, Duration::from_millis(5));
        assert_eq!(controller.state(), FocusState::Unsupported);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(device.trigger_calls(), 0);

        controller.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_issues_best_effort_cancel() {
        let device = Arc::new(FakeFocusDevice::with_modes(vec![FocusMode::Auto]));
        let controller =
            FocusController::start(device.clone() as Arc<dyn FrameSource>, Duration::from_millis(1000));
        wait_until(|| device.trigger_calls() == 1).await;

        controller.stop().await;
        assert_eq!(*device.cancel_calls.lock().unwrap(), 1);
    }
}
