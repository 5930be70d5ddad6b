// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end pipeline state-machine tests
//!
//! Drives the pipeline with a scripted frame source and decoder, verifying
//! the backpressure, lifecycle and failure-recovery properties.

use qrscan::config::ScanConfig;
use qrscan::decoder::{Decoder, LuminanceView};
use qrscan::errors::{PipelineError, SourceError, SourceResult};
use qrscan::pipeline::{PipelineState, Rect, RegionOfInterest, ScanPipeline, StatusListener};
use qrscan::source::{FileFrameSource, FocusDone, FocusMode, Frame, FrameSink, FrameSource};
use qrscan::RqrrDecoder;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

fn test_config() -> ScanConfig {
    ScanConfig {
        decode_start_delay_ms: 20,
        focus_interval_ms: 50,
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

// ===== Scripted frame source =====

#[derive(Default)]
struct SourceInner {
    fail_open: bool,
    open: bool,
    streaming: bool,
    close_calls: u32,
    stop_streaming_calls: u32,
    sink: Option<FrameSink>,
    request_some: u32,
    request_none: u32,
    /// Set if a second request arrived while one was still outstanding
    double_request: bool,
    torch: Option<bool>,
}

struct FakeSource {
    inner: Mutex<SourceInner>,
    width: u32,
    height: u32,
}

impl FakeSource {
    fn new(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(SourceInner::default()),
            width,
            height,
        })
    }

    fn set_fail_open(&self, fail: bool) {
        self.inner.lock().unwrap().fail_open = fail;
    }

    fn has_sink(&self) -> bool {
        self.inner.lock().unwrap().sink.is_some()
    }

    fn take_sink(&self) -> Option<FrameSink> {
        self.inner.lock().unwrap().sink.take()
    }

    fn deliver_frame(&self) {
        let sink = self.take_sink().expect("no outstanding frame request");
        let data = vec![0u8; (self.width * self.height) as usize];
        sink.deliver(Frame::new(data, self.width, self.height));
    }

    fn request_some(&self) -> u32 {
        self.inner.lock().unwrap().request_some
    }

    fn close_calls(&self) -> u32 {
        self.inner.lock().unwrap().close_calls
    }
}

impl FrameSource for FakeSource {
    fn open(&self) -> SourceResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_open {
            return Err(SourceError::OpenFailed("scripted failure".to_string()));
        }
        inner.open = true;
        Ok(())
    }

    fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.open = false;
        inner.close_calls += 1;
    }

    fn start_streaming(&self) -> SourceResult<()> {
        self.inner.lock().unwrap().streaming = true;
        Ok(())
    }

    fn stop_streaming(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.streaming = false;
        inner.stop_streaming_calls += 1;
    }

    fn request_next_frame(&self, sink: Option<FrameSink>) {
        let mut inner = self.inner.lock().unwrap();
        match sink {
            Some(sink) => {
                if inner.sink.is_some() {
                    inner.double_request = true;
                }
                inner.sink = Some(sink);
                inner.request_some += 1;
            }
            None => {
                inner.sink = None;
                inner.request_none += 1;
            }
        }
    }

    fn preview_dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_torch(&self, on: bool) {
        self.inner.lock().unwrap().torch = Some(on);
    }

    fn supported_focus_modes(&self) -> Vec<FocusMode> {
        Vec::new()
    }

    fn set_focus_mode(&self, _mode: FocusMode) -> SourceResult<()> {
        Ok(())
    }

    fn trigger_focus(&self, _done: FocusDone) -> SourceResult<()> {
        Err(SourceError::Rejected("no focus".to_string()))
    }

    fn cancel_focus(&self) -> SourceResult<()> {
        Ok(())
    }
}

// ===== Scripted decoder =====

#[derive(Clone, Default)]
struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    fn open(&self) {
        *self.0.0.lock().unwrap() = true;
        self.0.1.notify_all();
    }

    fn wait(&self) {
        let mut opened = self.0.0.lock().unwrap();
        while !*opened {
            opened = self.0.1.wait(opened).unwrap();
        }
    }
}

#[derive(Clone, Default)]
struct DecoderProbe {
    script: Arc<Mutex<VecDeque<Option<String>>>>,
    calls: Arc<Mutex<u32>>,
    views: Arc<Mutex<Vec<(u32, u32)>>>,
    gate: Option<Gate>,
}

impl DecoderProbe {
    fn scripted(outcomes: Vec<Option<String>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(outcomes.into())),
            ..Default::default()
        }
    }

    fn gated(outcomes: Vec<Option<String>>) -> (Self, Gate) {
        let gate = Gate::default();
        let mut probe = Self::scripted(outcomes);
        probe.gate = Some(gate.clone());
        (probe, gate)
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }

    fn factory(&self) -> qrscan::DecoderFactory {
        let probe = self.clone();
        Box::new(move || Box::new(probe.clone()))
    }
}

impl Decoder for DecoderProbe {
    fn decode(&mut self, luma: &LuminanceView<'_>) -> Option<String> {
        *self.calls.lock().unwrap() += 1;
        self.views.lock().unwrap().push((luma.width(), luma.height()));
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        self.script.lock().unwrap().pop_front().flatten()
    }
}

// ===== Recording listener =====

#[derive(Default)]
struct RecordingListener {
    open_failures: Mutex<u32>,
    successes: Mutex<Vec<String>>,
}

impl RecordingListener {
    fn open_failures(&self) -> u32 {
        *self.open_failures.lock().unwrap()
    }

    fn successes(&self) -> Vec<String> {
        self.successes.lock().unwrap().clone()
    }
}

impl StatusListener for RecordingListener {
    fn on_device_open_failed(&self) {
        *self.open_failures.lock().unwrap() += 1;
    }

    fn on_decode_success(&self, text: &str) {
        self.successes.lock().unwrap().push(text.to_string());
    }
}

fn build(
    source: &Arc<FakeSource>,
    probe: &DecoderProbe,
) -> (ScanPipeline, Arc<RecordingListener>) {
    let listener = Arc::new(RecordingListener::default());
    let pipeline = ScanPipeline::new(
        Arc::clone(source) as Arc<dyn FrameSource>,
        probe.factory(),
        listener.clone(),
        test_config(),
    );
    (pipeline, listener)
}

// ===== Tests =====

#[tokio::test(flavor = "multi_thread")]
async fn test_open_failure_is_fatal_but_resume_can_be_retried() {
    let source = FakeSource::new(64, 64);
    source.set_fail_open(true);
    let probe = DecoderProbe::default();
    let (pipeline, listener) = build(&source, &probe);

    pipeline.resume(true).unwrap();
    wait_until(|| listener.open_failures() == 1).await;
    assert_eq!(pipeline.current_state().await.unwrap(), PipelineState::Idle);
    assert_eq!(source.request_some(), 0);

    // The caller decides to retry; this time the device opens
    source.set_fail_open(false);
    pipeline.resume(true).unwrap();
    wait_until(|| source.request_some() == 1).await;
    assert_eq!(
        pipeline.current_state().await.unwrap(),
        PipelineState::Previewing
    );

    pipeline.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_no_match_rearms_exactly_once_with_no_success_callback() {
    let source = FakeSource::new(64, 64);
    let probe = DecoderProbe::scripted(vec![None]);
    let (pipeline, listener) = build(&source, &probe);

    pipeline.resume(true).unwrap();
    // First request arrives only after the start delay
    assert_eq!(source.request_some(), 0);
    wait_until(|| source.has_sink()).await;
    assert_eq!(source.request_some(), 1);

    source.deliver_frame();
    wait_until(|| source.request_some() == 2).await;

    assert!(listener.successes().is_empty());
    assert!(!source.inner.lock().unwrap().double_request);

    pipeline.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_success_fires_once_and_scanning_waits_for_restart() {
    let source = FakeSource::new(64, 64);
    let probe = DecoderProbe::scripted(vec![Some("HELLO".to_string())]);
    let (pipeline, listener) = build(&source, &probe);

    pipeline.resume(true).unwrap();
    wait_until(|| source.has_sink()).await;
    source.deliver_frame();

    wait_until(|| listener.successes() == vec!["HELLO".to_string()]).await;

    // No automatic re-arm after a hit
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(source.request_some(), 1);
    assert_eq!(listener.successes().len(), 1);

    pipeline.restart_decode().unwrap();
    wait_until(|| source.request_some() == 2).await;

    pipeline.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_restart_decode_is_idempotent() {
    let source = FakeSource::new(64, 64);
    let probe = DecoderProbe::default();
    let (pipeline, _listener) = build(&source, &probe);

    // Previewing-but-idle: no outstanding request until restart is called
    pipeline.resume(false).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(source.request_some(), 0);

    pipeline.restart_decode().unwrap();
    pipeline.restart_decode().unwrap();
    wait_until(|| source.request_some() == 1).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(source.request_some(), 1, "second restart must be a no-op");
    assert!(!source.inner.lock().unwrap().double_request);

    pipeline.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_frame_arriving_after_pause_decode_is_not_decoded() {
    let source = FakeSource::new(64, 64);
    let probe = DecoderProbe::default();
    let (pipeline, listener) = build(&source, &probe);

    pipeline.resume(true).unwrap();
    wait_until(|| source.has_sink()).await;

    // The device already captured a frame for this request...
    let sink = source.take_sink().unwrap();
    // ...but the caller deregisters before it lands
    pipeline.pause_decode().unwrap();
    wait_until(|| source.inner.lock().unwrap().request_none >= 1).await;
    assert_eq!(
        pipeline.current_state().await.unwrap(),
        PipelineState::Paused
    );

    sink.deliver(Frame::new(vec![0; 64 * 64], 64, 64));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(probe.calls(), 0);
    assert!(listener.successes().is_empty());

    pipeline.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_no_match_while_paused_does_not_rearm() {
    let source = FakeSource::new(64, 64);
    let (probe, gate) = DecoderProbe::gated(vec![None]);
    let (pipeline, _listener) = build(&source, &probe);

    pipeline.resume(true).unwrap();
    wait_until(|| source.has_sink()).await;
    source.deliver_frame();
    wait_until(|| probe.calls() == 1).await;

    // Pause while the decode is still running, then let it finish
    pipeline.pause_decode().unwrap();
    wait_until(|| source.inner.lock().unwrap().request_none >= 1).await;
    gate.open();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(source.request_some(), 1, "NoMatch while paused must not re-arm");

    pipeline.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_mid_decode_discards_outcome_and_closes_device() {
    let source = FakeSource::new(64, 64);
    let (probe, gate) = DecoderProbe::gated(vec![Some("LATE".to_string())]);
    let (pipeline, listener) = build(&source, &probe);

    pipeline.resume(true).unwrap();
    wait_until(|| source.has_sink()).await;
    source.deliver_frame();
    wait_until(|| probe.calls() == 1).await;

    pipeline.shutdown().await.unwrap();
    {
        let inner = source.inner.lock().unwrap();
        assert_eq!(inner.close_calls, 1);
        assert!(inner.stop_streaming_calls >= 1);
        assert!(!inner.streaming);
        assert!(!inner.open);
    }

    // The worker finishes after teardown; its outcome must go nowhere
    gate.open();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(listener.successes().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_operations_after_shutdown_fail() {
    let source = FakeSource::new(64, 64);
    let probe = DecoderProbe::default();
    let (pipeline, _listener) = build(&source, &probe);

    pipeline.shutdown().await.unwrap();

    assert!(matches!(
        pipeline.resume(true),
        Err(PipelineError::AlreadyStopped)
    ));
    assert!(matches!(
        pipeline.restart_decode(),
        Err(PipelineError::AlreadyStopped)
    ));
    assert!(matches!(
        pipeline.shutdown().await,
        Err(PipelineError::AlreadyStopped)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pause_closes_device_and_resume_starts_fresh_session() {
    let source = FakeSource::new(64, 64);
    let probe = DecoderProbe::default();
    let (pipeline, _listener) = build(&source, &probe);

    pipeline.resume(true).unwrap();
    wait_until(|| source.has_sink()).await;

    pipeline.pause().unwrap();
    wait_until(|| source.close_calls() == 1).await;
    assert_eq!(pipeline.current_state().await.unwrap(), PipelineState::Idle);

    pipeline.resume(true).unwrap();
    wait_until(|| source.has_sink()).await;

    pipeline.shutdown().await.unwrap();
    assert_eq!(source.close_calls(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_region_of_interest_is_rescaled_for_the_decoded_frame() {
    // Region computed against a 300x300 preview; device serves 600x300
    let source = FakeSource::new(600, 300);
    let probe = DecoderProbe::default();
    let (pipeline, _listener) = build(&source, &probe);

    pipeline
        .set_region_of_interest(Some(RegionOfInterest::with_reference(
            Rect::new(10, 10, 100, 100),
            300,
            300,
        )))
        .unwrap();

    pipeline.resume(true).unwrap();
    wait_until(|| source.has_sink()).await;
    source.deliver_frame();
    wait_until(|| probe.calls() == 1).await;

    // Width axis doubled, height unchanged
    assert_eq!(probe.views.lock().unwrap().clone(), vec![(200, 100)]);

    pipeline.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_torch_is_forwarded_only_with_an_active_session() {
    let source = FakeSource::new(64, 64);
    let probe = DecoderProbe::default();
    let (pipeline, _listener) = build(&source, &probe);

    pipeline.set_torch(true).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.inner.lock().unwrap().torch, None);

    pipeline.resume(false).unwrap();
    pipeline.set_torch(true).unwrap();
    wait_until(|| source.inner.lock().unwrap().torch == Some(true)).await;

    pipeline.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_file_source_end_to_end_scans_continuously() {
    // Blank image: the real decoder finds nothing and the pull model keeps
    // pacing requests at the frame interval until shutdown.
    let source = Arc::new(
        FileFrameSource::from_luma(vec![255; 64 * 64], 64, 64)
            .with_frame_interval(Duration::from_millis(5)),
    );
    let listener = Arc::new(RecordingListener::default());
    let pipeline = ScanPipeline::new(
        source,
        Box::new(|| Box::new(RqrrDecoder::new())),
        listener.clone(),
        test_config(),
    );

    pipeline.resume(true).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    pipeline.shutdown().await.unwrap();

    assert!(listener.successes().is_empty());
    assert_eq!(listener.open_failures(), 0);
}
