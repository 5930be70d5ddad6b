// SPDX-License-Identifier: GPL-3.0-only

//! Dedicated decode worker
//!
//! Runs the opaque decode call on its own thread so decode latency never
//! stalls the control task or frame re-arming. The pull model guarantees at
//! most one pending request, so the channel never queues deeper than one.

use super::controller::PipelineEvent;
use super::region::Rect;
use crate::constants::DECODE_THREAD_NAME;
use crate::decoder::{DecodeOutcome, Decoder, LuminanceView};
use crate::source::Frame;
use std::sync::mpsc;
use std::thread;
use tracing::{debug, trace, warn};

/// One unit of decode work, tagged with the session that produced it
pub(crate) struct DecodeRequest {
    pub session: u64,
    pub frame: Frame,
    pub region: Option<Rect>,
}

/// Handle to the decode worker thread.
///
/// Teardown is dropping the handle: the request channel closes, the thread
/// finishes any in-flight decode and exits. A late outcome is discarded by
/// the controller's session check (or dropped outright once the event
/// receiver is gone).
pub(crate) struct DecodeWorker {
    requests: mpsc::Sender<DecodeRequest>,
}

impl DecodeWorker {
    /// Spawn the worker thread with a fresh decoder instance
    pub fn spawn(
        mut decoder: Box<dyn Decoder>,
        outcomes: tokio::sync::mpsc::UnboundedSender<(u64, PipelineEvent)>,
    ) -> Self {
        let (requests, rx) = mpsc::channel::<DecodeRequest>();

        let builder = thread::Builder::new().name(DECODE_THREAD_NAME.to_string());
        let spawned = builder.spawn(move || {
            debug!("Decode worker started");
            while let Ok(request) = rx.recv() {
                let outcome = decode_one(decoder.as_mut(), &request);
                if outcomes
                    .send((request.session, PipelineEvent::Outcome(outcome)))
                    .is_err()
                {
                    // Controller gone; outcome dropped, nothing left to do
                    break;
                }
            }
            debug!("Decode worker exiting");
        });
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to spawn decode worker thread");
        }

        Self { requests }
    }

    /// Post one frame for decoding
    pub fn submit(&self, request: DecodeRequest) {
        if self.requests.send(request).is_err() {
            warn!("Decode request dropped; worker thread is gone");
        }
    }
}

/// Run one decode attempt: crop to the region, decode, always reset.
fn decode_one(decoder: &mut dyn Decoder, request: &DecodeRequest) -> DecodeOutcome {
    let view = match request.region {
        Some(rect) => LuminanceView::cropped(&request.frame, rect),
        None => LuminanceView::full(&request.frame),
    };
    trace!(
        width = view.width(),
        height = view.height(),
        cropped = request.region.is_some(),
        "Decoding frame"
    );

    let result = decoder.decode(&view);
    // Stale state from one frame must never influence the next
    decoder.reset();

    match result {
        Some(text) => DecodeOutcome::Success(text),
        None => DecodeOutcome::NoMatch,
    }
}
