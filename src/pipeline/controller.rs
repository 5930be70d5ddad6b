// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline controller
//!
//! The control task owns the lifecycle state machine, re-arms single-shot
//! frame requests, marshals decode outcomes, and reports results to the
//! caller. It never runs the decode call itself — frames are posted to the
//! decode worker and the outcome comes back as a message, so the capture
//! path is never stalled by decode latency.
//!
//! Backpressure is the pull model: frame N+1 is never requested before frame
//! N's outcome has been consumed, enforced by the single outstanding request
//! token plus the decode-in-flight flag.

use super::decode_worker::{DecodeRequest, DecodeWorker};
use super::focus::FocusController;
use super::region::RegionOfInterest;
use crate::config::ScanConfig;
use crate::decoder::{DecodeOutcome, DecoderFactory};
use crate::errors::{PipelineError, PipelineResult};
use crate::source::{Frame, FrameSink, FrameSource};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Lifecycle state of the scanning pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No capture session
    Idle,
    /// Streaming and armed to decode (or idle-between-decodes after a hit)
    Previewing,
    /// Streaming continues but frames are no longer requested
    Paused,
    /// Teardown in progress
    ShuttingDown,
    /// Terminal; only a full re-construction revives scanning
    Shutdown,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::Previewing => write!(f, "previewing"),
            PipelineState::Paused => write!(f, "paused"),
            PipelineState::ShuttingDown => write!(f, "shutting-down"),
            PipelineState::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Status callbacks exposed to the caller/UI layer.
///
/// Invoked from the control task; implementations must not block.
pub trait StatusListener: Send + Sync {
    /// The device failed to open. The pipeline stays idle; the caller
    /// decides whether to retry `resume`.
    fn on_device_open_failed(&self);

    /// A symbol was decoded. Scanning does not resume automatically; the
    /// caller invokes `restart_decode` to keep going.
    fn on_decode_success(&self, text: &str);
}

/// Events posted back to the control task, tagged with their session
#[derive(Debug)]
pub(crate) enum PipelineEvent {
    /// Decode worker finished one attempt
    Outcome(DecodeOutcome),
    /// The post-streaming-start delay elapsed; arm the first request
    StartDelayElapsed,
}

enum Command {
    Resume { should_decode_immediately: bool },
    Pause,
    RestartDecode,
    PauseDecode,
    SetRegion(Option<RegionOfInterest>),
    SetTorch(bool),
    QueryState { reply: oneshot::Sender<PipelineState> },
    Shutdown { done: oneshot::Sender<()> },
}

/// Caller-facing handle to the scanning pipeline.
///
/// Commands are marshalled to the control task; every method fails with
/// [`PipelineError::AlreadyStopped`] once the pipeline has shut down.
pub struct ScanPipeline {
    commands: mpsc::UnboundedSender<Command>,
}

impl ScanPipeline {
    /// Create the pipeline and spawn its control task.
    ///
    /// Must be called within a tokio runtime. The pipeline starts idle; call
    /// [`resume`](Self::resume) to open the device and begin a session.
    pub fn new(
        source: Arc<dyn FrameSource>,
        decoder_factory: DecoderFactory,
        listener: Arc<dyn StatusListener>,
        config: ScanConfig,
    ) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let controller = Controller {
            source,
            decoder_factory,
            listener,
            config,
            state: PipelineState::Idle,
            session: 0,
            region: None,
            worker: None,
            focus: None,
            request_outstanding: false,
            decode_in_flight: false,
            frames_tx,
            events_tx,
        };
        tokio::spawn(controller.run(commands_rx, frames_rx, events_rx));

        Self { commands }
    }

    fn send(&self, command: Command) -> PipelineResult<()> {
        self.commands
            .send(command)
            .map_err(|_| PipelineError::AlreadyStopped)
    }

    /// Open the device and start a capture session.
    ///
    /// With `should_decode_immediately`, the first frame request is armed
    /// shortly after streaming starts; otherwise the session sits previewing
    /// until [`restart_decode`](Self::restart_decode).
    pub fn resume(&self, should_decode_immediately: bool) -> PipelineResult<()> {
        self.send(Command::Resume {
            should_decode_immediately,
        })
    }

    /// Tear the session down (close the device) and return to idle.
    /// A later [`resume`](Self::resume) starts a fresh session.
    pub fn pause(&self) -> PipelineResult<()> {
        self.send(Command::Pause)
    }

    /// Arm exactly one frame request if none is outstanding. Idempotent.
    pub fn restart_decode(&self) -> PipelineResult<()> {
        self.send(Command::RestartDecode)
    }

    /// Deregister interest in further frames; streaming, torch and focus
    /// keep working.
    pub fn pause_decode(&self) -> PipelineResult<()> {
        self.send(Command::PauseDecode)
    }

    /// Set (or clear) the decode region of interest
    pub fn set_region_of_interest(&self, region: Option<RegionOfInterest>) -> PipelineResult<()> {
        self.send(Command::SetRegion(region))
    }

    /// Forward a torch toggle to the device of the active session
    pub fn set_torch(&self, on: bool) -> PipelineResult<()> {
        self.send(Command::SetTorch(on))
    }

    /// Current lifecycle state (introspection, mainly for tests and tooling)
    pub async fn current_state(&self) -> PipelineResult<PipelineState> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::QueryState { reply })?;
        rx.await.map_err(|_| PipelineError::AlreadyStopped)
    }

    /// Shut the pipeline down and wait for teardown to complete.
    ///
    /// Safe to call while a decode is outstanding; a late outcome is
    /// discarded, never delivered. Terminal: afterwards every operation
    /// fails with [`PipelineError::AlreadyStopped`].
    pub async fn shutdown(&self) -> PipelineResult<()> {
        let (done, rx) = oneshot::channel();
        self.send(Command::Shutdown { done })?;
        let _ = rx.await;
        Ok(())
    }
}

struct Controller {
    source: Arc<dyn FrameSource>,
    decoder_factory: DecoderFactory,
    listener: Arc<dyn StatusListener>,
    config: ScanConfig,
    state: PipelineState,
    /// Bumped on every session start and teardown so stale frames, outcomes
    /// and delayed-start events are recognised and dropped.
    session: u64,
    region: Option<RegionOfInterest>,
    worker: Option<DecodeWorker>,
    focus: Option<FocusController>,
    /// True while a single-shot frame request is outstanding at the device
    request_outstanding: bool,
    /// True while a frame sits with the decode worker
    decode_in_flight: bool,
    frames_tx: mpsc::UnboundedSender<(u64, Frame)>,
    events_tx: mpsc::UnboundedSender<(u64, PipelineEvent)>,
}

impl Controller {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut frames: mpsc::UnboundedReceiver<(u64, Frame)>,
        mut events: mpsc::UnboundedReceiver<(u64, PipelineEvent)>,
    ) {
        debug!("Pipeline control task started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown { done }) => {
                        self.do_shutdown().await;
                        // Close before acknowledging so commands sent after
                        // shutdown() returns are guaranteed to fail
                        commands.close();
                        let _ = done.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        // All handles dropped; tear down as if shut down
                        debug!("All pipeline handles dropped, shutting down");
                        self.do_shutdown().await;
                        break;
                    }
                },
                Some((session, frame)) = frames.recv() => {
                    self.handle_frame(session, frame);
                }
                Some((session, event)) = events.recv() => {
                    self.handle_event(session, event);
                }
            }
        }
        debug!("Pipeline control task exiting");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Resume {
                should_decode_immediately,
            } => self.resume(should_decode_immediately),
            Command::Pause => self.pause().await,
            Command::RestartDecode => self.restart_decode(),
            Command::PauseDecode => self.pause_decode(),
            Command::SetRegion(region) => self.region = region,
            Command::SetTorch(on) => self.set_torch(on),
            Command::QueryState { reply } => {
                let _ = reply.send(self.state);
            }
            // Handled directly in the select loop
            Command::Shutdown { .. } => unreachable!(),
        }
    }

    fn resume(&mut self, should_decode_immediately: bool) {
        if self.state != PipelineState::Idle {
            warn!(state = %self.state, "Resume ignored; session already active");
            return;
        }

        self.session += 1;
        if let Err(e) = self.source.open() {
            warn!(error = %e, "Device open failed");
            self.listener.on_device_open_failed();
            return;
        }
        if let Err(e) = self.source.start_streaming() {
            warn!(error = %e, "Streaming start failed");
            self.source.close();
            self.listener.on_device_open_failed();
            return;
        }

        let decoder = (self.decoder_factory)();
        self.worker = Some(DecodeWorker::spawn(decoder, self.events_tx.clone()));
        self.focus = Some(FocusController::start(
            Arc::clone(&self.source),
            self.config.focus_interval(),
        ));
        self.state = PipelineState::Previewing;
        self.request_outstanding = false;
        self.decode_in_flight = false;
        info!(session = self.session, "Scan session started");

        if should_decode_immediately {
            let events_tx = self.events_tx.clone();
            let session = self.session;
            let delay = self.config.decode_start_delay();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = events_tx.send((session, PipelineEvent::StartDelayElapsed));
            });
        }
    }

    async fn pause(&mut self) {
        if !matches!(
            self.state,
            PipelineState::Previewing | PipelineState::Paused
        ) {
            debug!(state = %self.state, "Pause ignored; no active session");
            return;
        }
        self.teardown_session().await;
        self.state = PipelineState::Idle;
        info!("Scan session paused; device closed");
    }

    /// Issue exactly one frame request if none is outstanding. Idempotent.
    fn restart_decode(&mut self) {
        if !matches!(
            self.state,
            PipelineState::Previewing | PipelineState::Paused
        ) {
            warn!(state = %self.state, "Restart ignored; no active session");
            return;
        }
        self.state = PipelineState::Previewing;
        self.arm_frame_request();
    }

    fn arm_frame_request(&mut self) {
        if self.request_outstanding || self.decode_in_flight {
            return;
        }
        let sink = FrameSink::new(self.session, self.frames_tx.clone());
        self.source.request_next_frame(Some(sink));
        self.request_outstanding = true;
    }

    fn pause_decode(&mut self) {
        if self.state != PipelineState::Previewing {
            debug!(state = %self.state, "Pause-decode ignored");
            return;
        }
        self.source.request_next_frame(None);
        self.request_outstanding = false;
        self.state = PipelineState::Paused;
        debug!("Decoding paused; streaming continues");
    }

    fn set_torch(&mut self, on: bool) {
        if self.worker.is_some() {
            self.source.set_torch(on);
        } else {
            debug!("Torch toggle ignored; no active session");
        }
    }

    fn handle_frame(&mut self, session: u64, frame: Frame) {
        if session != self.session || self.state != PipelineState::Previewing {
            debug!(session, state = %self.state, "Dropping frame");
            return;
        }
        if self.decode_in_flight {
            warn!("Frame arrived while a decode is in flight; dropping");
            return;
        }
        self.request_outstanding = false;

        // The region is rescaled against the dimensions of the very frame it
        // will crop, so it can never be applied to mismatched data.
        let region = self
            .region
            .as_mut()
            .map(|roi| roi.current_region(frame.width, frame.height));

        if let Some(worker) = &self.worker {
            worker.submit(DecodeRequest {
                session,
                frame,
                region,
            });
            self.decode_in_flight = true;
        }
    }

    fn handle_event(&mut self, session: u64, event: PipelineEvent) {
        if session != self.session {
            debug!(session, ?event, "Dropping stale event");
            return;
        }
        match event {
            PipelineEvent::StartDelayElapsed => {
                if self.state == PipelineState::Previewing {
                    self.arm_frame_request();
                }
            }
            PipelineEvent::Outcome(outcome) => self.handle_outcome(outcome),
        }
    }

    fn handle_outcome(&mut self, outcome: DecodeOutcome) {
        self.decode_in_flight = false;
        match outcome {
            DecodeOutcome::Success(text) => {
                // Deliberately no re-arm: the caller decides whether to keep
                // scanning after a hit, via restart_decode().
                info!("Decode succeeded");
                self.listener.on_decode_success(&text);
            }
            DecodeOutcome::NoMatch => {
                if self.state == PipelineState::Previewing {
                    self.arm_frame_request();
                }
            }
        }
    }

    async fn do_shutdown(&mut self) {
        self.state = PipelineState::ShuttingDown;
        self.teardown_session().await;
        self.state = PipelineState::Shutdown;
        info!("Pipeline shut down");
    }

    async fn teardown_session(&mut self) {
        // Invalidate in-flight frames/outcomes/timers of this session
        self.session += 1;
        self.request_outstanding = false;
        self.decode_in_flight = false;

        if let Some(worker) = self.worker.take() {
            self.source.request_next_frame(None);
            self.source.stop_streaming();
            // Dropping the handle closes the request channel; the thread
            // drains and exits on its own.
            drop(worker);
            if let Some(focus) = self.focus.take() {
                focus.stop().await;
            }
            self.source.close();
        }
    }
}
