use crate::engine::{DecodeOutcome, DecodeRequest, Decoder};
use crate::events::{EventBus, ScanEvent};
use crate::format::BarcodeFormat;
use crate::luminance::LuminanceExtractor;
use crate::postprocess::{DisplayTarget, PresentationModel, ResultPostProcessor};
use crate::slot::FrameSlot;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Decode parameters fixed for the lifetime of one worker.
#[derive(Debug, Clone)]
pub struct DecodeSettings {
    /// Empty set means all formats.
    pub formats: HashSet<BarcodeFormat>,
    pub try_harder: bool,
    pub also_inverted: bool,
    pub character_set: Option<String>,
    pub max_extra_attempts: u32,
}

impl Default for DecodeSettings {
    fn default() -> Self {
        Self {
            formats: HashSet::new(),
            try_harder: false,
            also_inverted: false,
            character_set: None,
            max_extra_attempts: 2,
        }
    }
}

/// Observable phase of the worker loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    AwaitingFrame,
    Decoding,
    /// A result was published; frames are ignored until a preview restart.
    ReportingSuccess,
    Stopped,
}

/// Commands the foreground sends into the running worker.
#[derive(Debug)]
pub enum WorkerCommand {
    /// Leave the success pause and resume taking frames after `delay`.
    RestartPreview { delay: Duration },
}

/// The single decode loop of the pipeline.
///
/// Exactly one worker runs per session, and it decodes inline: a new frame
/// can only be taken once the previous attempt has fully completed, so decode
/// attempts never overlap by construction.
pub struct DecodeWorker {
    slot: Arc<FrameSlot>,
    extractor: LuminanceExtractor,
    decoder: Box<dyn Decoder + Send>,
    settings: DecodeSettings,
    bus: EventBus,
    last_result: Arc<Mutex<Option<PresentationModel>>>,
    display: Option<DisplayTarget>,
    scale_factor: f32,
}

impl DecodeWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        slot: Arc<FrameSlot>,
        extractor: LuminanceExtractor,
        decoder: Box<dyn Decoder + Send>,
        settings: DecodeSettings,
        bus: EventBus,
        last_result: Arc<Mutex<Option<PresentationModel>>>,
        display: Option<DisplayTarget>,
        scale_factor: f32,
    ) -> Self {
        Self {
            slot,
            extractor,
            decoder,
            settings,
            bus,
            last_result,
            display,
            scale_factor,
        }
    }

    /// Spawn the worker loop and return its handle.
    pub fn spawn(self) -> WorkerHandle {
        let (command_tx, command_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let state = Arc::new(Mutex::new(WorkerState::AwaitingFrame));

        let task = tokio::spawn(run_loop(
            self,
            command_rx,
            cancel.clone(),
            Arc::clone(&state),
        ));

        WorkerHandle {
            commands: command_tx,
            cancel,
            task: Some(task),
            state,
        }
    }

    fn request_for(&self, source: crate::luminance::LuminanceSource) -> DecodeRequest {
        DecodeRequest {
            luminance: source,
            formats: self.settings.formats.clone(),
            try_harder: self.settings.try_harder,
            also_inverted: self.settings.also_inverted,
            character_set: self.settings.character_set.clone(),
            max_extra_attempts: self.settings.max_extra_attempts,
        }
    }
}

async fn run_loop(
    mut worker: DecodeWorker,
    mut commands: mpsc::Receiver<WorkerCommand>,
    cancel: CancellationToken,
    state: Arc<Mutex<WorkerState>>,
) {
    debug!("Decode worker started");
    loop {
        *state.lock() = WorkerState::AwaitingFrame;
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = worker.slot.take() => frame,
        };

        *state.lock() = WorkerState::Decoding;
        let frame_id = frame.id;
        let source = match worker.extractor.extract(&frame) {
            Ok(source) => source,
            Err(err) => {
                // Frame-level failures are expected with real devices; skip
                // the frame and keep scanning.
                worker.bus.publish(ScanEvent::FrameRejected {
                    frame_id,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let request = worker.request_for(source);
        match worker.decoder.decode(&request) {
            Ok(DecodeOutcome::NotFound) => {
                worker.bus.publish(ScanEvent::FrameProcessed {
                    frame_id,
                    timestamp: SystemTime::now(),
                });
            }
            Ok(DecodeOutcome::Found(decoded)) => {
                info!(
                    "Frame {} decoded as {} symbol",
                    frame_id, decoded.format
                );
                let model =
                    ResultPostProcessor::process(&decoded, worker.display, worker.scale_factor);
                *worker.last_result.lock() = Some(model.clone());
                worker.bus.publish(ScanEvent::DecodeSucceeded {
                    model,
                    timestamp: SystemTime::now(),
                });

                // Hold here until the foreground restarts the preview so a
                // symbol left in front of the camera is not reported twice.
                // Restarts sent before this success are stale and must not
                // cut the pause short.
                while commands.try_recv().is_ok() {}
                *state.lock() = WorkerState::ReportingSuccess;
                let restarted = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => false,
                    command = commands.recv() => match command {
                        Some(WorkerCommand::RestartPreview { delay }) => {
                            tokio::select! {
                                biased;
                                _ = cancel.cancelled() => false,
                                _ = tokio::time::sleep(delay) => true,
                            }
                        }
                        None => false,
                    },
                };
                if !restarted {
                    break;
                }
                // Frames captured during the pause show the old symbol.
                worker.slot.clear();
                debug!("Preview restarted, resuming scan loop");
            }
            Err(err) if err.is_frame_level() => {
                worker.bus.publish(ScanEvent::FrameRejected {
                    frame_id,
                    reason: err.to_string(),
                });
            }
            Err(err) => {
                worker.bus.publish(ScanEvent::SessionError {
                    component: "decode-worker".to_string(),
                    error: err.to_string(),
                });
            }
        }
    }
    *state.lock() = WorkerState::Stopped;
    debug!("Decode worker stopped");
}

/// Handle to a running worker. Dropping the handle does not stop the worker;
/// call [`WorkerHandle::stop`].
pub struct WorkerHandle {
    commands: mpsc::Sender<WorkerCommand>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    state: Arc<Mutex<WorkerState>>,
}

impl WorkerHandle {
    /// Ask the worker to resume scanning after a success pause.
    pub fn restart_preview(&self, delay: Duration) {
        if self
            .commands
            .try_send(WorkerCommand::RestartPreview { delay })
            .is_err()
        {
            warn!("Worker command channel full or closed; restart dropped");
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Stop the worker and wait for the loop to exit. An in-flight decode
    /// attempt runs to completion first; when this returns, no decode code is
    /// executing.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if task.await.is_err() {
                warn!("Decode worker task panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Decoded, Metadata};
    use crate::error::Result;
    use crate::events::{EventFilter, EventReceiver};
    use crate::frame::{Frame, FrameFormat};
    use crate::geometry::Point;
    use crate::viewfinder::ViewfinderState;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    fn valid_frame(id: u64) -> Frame {
        Frame::new(
            id,
            SystemTime::now(),
            vec![128u8; 320 * 240],
            320,
            240,
            FrameFormat::Gray8,
        )
    }

    fn invalid_frame(id: u64) -> Frame {
        Frame::new(id, SystemTime::now(), vec![0u8; 4], 320, 240, FrameFormat::Gray8)
    }

    fn found_result() -> Decoded {
        Decoded {
            text: "HELLO".to_string(),
            raw_bytes: None,
            format: BarcodeFormat::QrCode,
            points: vec![Point::new(1.0, 1.0), Point::new(2.0, 2.0)],
            metadata: Metadata::new(),
            timestamp: SystemTime::now(),
        }
    }

    /// Decoder instrumented to detect overlapping invocations.
    struct OverlapDetector {
        active: Arc<AtomicU32>,
        overlapped: Arc<AtomicBool>,
        calls: Arc<AtomicU32>,
    }

    impl Decoder for OverlapDetector {
        fn decode(&mut self, _request: &DecodeRequest) -> Result<DecodeOutcome> {
            if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(DecodeOutcome::NotFound)
        }
    }

    struct FixedDecoder {
        outcome: fn() -> Result<DecodeOutcome>,
    }

    impl Decoder for FixedDecoder {
        fn decode(&mut self, _request: &DecodeRequest) -> Result<DecodeOutcome> {
            (self.outcome)()
        }
    }

    fn spawn_worker(decoder: Box<dyn Decoder + Send>, bus: EventBus) -> (Arc<FrameSlot>, WorkerHandle) {
        let slot = Arc::new(FrameSlot::new());
        let worker = DecodeWorker::new(
            Arc::clone(&slot),
            LuminanceExtractor::new(ViewfinderState::new(640, 480)),
            decoder,
            DecodeSettings::default(),
            bus,
            Arc::new(Mutex::new(None)),
            Some(DisplayTarget {
                width: 640,
                height: 480,
            }),
            1.0,
        );
        (slot, worker.spawn())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_decode_attempts_never_overlap() {
        let overlapped = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicU32::new(0));
        let decoder = OverlapDetector {
            active: Arc::new(AtomicU32::new(0)),
            overlapped: Arc::clone(&overlapped),
            calls: Arc::clone(&calls),
        };
        let (slot, mut handle) = spawn_worker(Box::new(decoder), EventBus::new(64));

        // Offer frames far faster than the decoder can process them.
        for id in 0..20 {
            slot.offer(valid_frame(id));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop().await;

        assert!(!overlapped.load(Ordering::SeqCst));
        // Some frames must have been coalesced by the slot.
        let processed = calls.load(Ordering::SeqCst) as u64;
        assert!(processed < 20);
        assert!(slot.stats().dropped > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_waits_for_inflight_decode() {
        let done = Arc::new(AtomicBool::new(false));
        struct SlowDecoder {
            done: Arc<AtomicBool>,
        }
        impl Decoder for SlowDecoder {
            fn decode(&mut self, _request: &DecodeRequest) -> Result<DecodeOutcome> {
                std::thread::sleep(Duration::from_millis(100));
                self.done.store(true, Ordering::SeqCst);
                Ok(DecodeOutcome::NotFound)
            }
        }
        let (slot, mut handle) = spawn_worker(
            Box::new(SlowDecoder {
                done: Arc::clone(&done),
            }),
            EventBus::new(16),
        );

        slot.offer(valid_frame(1));
        // Give the worker time to enter the decode.
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.stop().await;

        // stop() may only return once the in-flight attempt has finished.
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(handle.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_invalid_frame_is_rejected_and_loop_continues() {
        let bus = EventBus::new(16);
        let mut events = EventReceiver::new(
            bus.subscribe(),
            EventFilter::EventTypes(vec!["frame_rejected", "frame_processed"]),
            "test".to_string(),
        );
        let (slot, mut handle) = spawn_worker(
            Box::new(FixedDecoder {
                outcome: || Ok(DecodeOutcome::NotFound),
            }),
            bus,
        );

        slot.offer(invalid_frame(1));
        match tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap()
        {
            ScanEvent::FrameRejected { frame_id, .. } => assert_eq!(frame_id, 1),
            other => panic!("unexpected event: {:?}", other),
        }

        // The loop survived and processes the next frame.
        slot.offer(valid_frame(2));
        match tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap()
        {
            ScanEvent::FrameProcessed { frame_id, .. } => assert_eq!(frame_id, 2),
            other => panic!("unexpected event: {:?}", other),
        }
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_restart_sent_while_scanning_does_not_skip_pause() {
        let bus = EventBus::new(16);
        let mut events = EventReceiver::new(
            bus.subscribe(),
            EventFilter::EventTypes(vec!["decode_succeeded"]),
            "test".to_string(),
        );
        let (slot, mut handle) = spawn_worker(
            Box::new(FixedDecoder {
                outcome: || Ok(DecodeOutcome::Found(found_result())),
            }),
            bus,
        );

        // Issued before any success; must not pre-arm the pause exit.
        handle.restart_preview(Duration::from_millis(1));

        slot.offer(valid_frame(1));
        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, ScanEvent::DecodeSucceeded { .. }));

        // The stale restart was discarded, so the pause holds.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.state(), WorkerState::ReportingSuccess);

        // A restart issued during the pause still works.
        handle.restart_preview(Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.state(), WorkerState::AwaitingFrame);
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_success_pauses_until_restart() {
        let bus = EventBus::new(16);
        let mut events = EventReceiver::new(
            bus.subscribe(),
            EventFilter::EventTypes(vec!["decode_succeeded", "frame_processed"]),
            "test".to_string(),
        );
        let last_result = Arc::new(Mutex::new(None));
        let slot = Arc::new(FrameSlot::new());
        let worker = DecodeWorker::new(
            Arc::clone(&slot),
            LuminanceExtractor::new(ViewfinderState::new(640, 480)),
            Box::new(FixedDecoder {
                outcome: || Ok(DecodeOutcome::Found(found_result())),
            }),
            DecodeSettings::default(),
            bus,
            Arc::clone(&last_result),
            None,
            1.0,
        );
        let mut handle = worker.spawn();

        slot.offer(valid_frame(1));
        match tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap()
        {
            ScanEvent::DecodeSucceeded { model, .. } => assert_eq!(model.content, "HELLO"),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(last_result.lock().is_some());

        // Frames offered during the pause are not decoded.
        slot.offer(valid_frame(2));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.state(), WorkerState::ReportingSuccess);

        // After restart the loop decodes again. The pending pause-era frame
        // is discarded on restart, so wait before offering a fresh one.
        handle.restart_preview(Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(50)).await;
        slot.offer(valid_frame(3));
        match tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap()
        {
            ScanEvent::DecodeSucceeded { .. } => {}
            other => panic!("unexpected event: {:?}", other),
        }
        handle.stop().await;
    }
}
