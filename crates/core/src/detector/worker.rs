use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::capture::domain::frame_source::{CaptureError, FrameSource};
use crate::detector::frame_processor::FrameProcessor;
use crate::detector::snapshot::{SharedSnapshot, Snapshot};
use crate::detector::worker_logger::WorkerLogger;

/// Everything the worker thread takes ownership of.
pub struct WorkerParts {
    pub source: Box<dyn FrameSource>,
    pub processor: FrameProcessor,
    pub logger: Box<dyn WorkerLogger>,
    /// Back-off after a failed read.
    pub capture_retry: Duration,
    /// Lowered when the source cannot be opened.
    pub camera_available: Arc<AtomicBool>,
}

/// Handle to the running detector thread.
///
/// Dropping the handle raises the cancel flag without waiting.
pub struct DetectorWorker {
    cancelled: Arc<AtomicBool>,
    done_rx: Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl DetectorWorker {
    /// Spawns the worker. It opens the source itself, so a missing camera
    /// never blocks or fails the caller.
    pub fn spawn(parts: WorkerParts, snapshot: SharedSnapshot) -> std::io::Result<Self> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);

        let flag = cancelled.clone();
        let thread = std::thread::Builder::new()
            .name("gesture-detector".into())
            .spawn(move || run(parts, snapshot, flag, done_tx))?;

        Ok(Self {
            cancelled,
            done_rx,
            thread: Some(thread),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Raises the cancel flag and waits up to `timeout` for the loop to exit.
    ///
    /// Returns `false` if the worker is still stuck (typically in a blocking
    /// capture call); the thread is then detached and exits on its own once
    /// the call returns.
    pub fn stop(mut self, timeout: Duration) -> bool {
        self.cancelled.store(true, Ordering::Relaxed);
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(thread) = self.thread.take() {
                    if thread.join().is_err() {
                        log::warn!("Gesture detector worker panicked");
                    }
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("Gesture detector did not stop within {timeout:?}, detaching");
                self.thread.take();
                false
            }
        }
    }
}

impl Drop for DetectorWorker {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

fn run(
    parts: WorkerParts,
    snapshot: SharedSnapshot,
    cancelled: Arc<AtomicBool>,
    done_tx: Sender<()>,
) {
    let WorkerParts {
        mut source,
        mut processor,
        mut logger,
        capture_retry,
        camera_available,
    } = parts;

    if let Err(e) = source.open() {
        log::error!("Gesture detector disabled: {e}");
        camera_available.store(false, Ordering::Relaxed);
        snapshot.with(Snapshot::clear);
        let _ = done_tx.send(());
        return;
    }
    log::info!("Gesture detector running");

    let mut frames = 0usize;
    while !cancelled.load(Ordering::Relaxed) {
        let t0 = Instant::now();
        let frame = match source.read() {
            Ok(frame) => frame,
            Err(CaptureError::Exhausted) => {
                log::info!("Frame source exhausted");
                break;
            }
            Err(e) => {
                log::debug!("Capture failed, retrying: {e}");
                std::thread::sleep(capture_retry);
                continue;
            }
        };
        if cancelled.load(Ordering::Relaxed) {
            break;
        }
        logger.timing("capture", t0.elapsed().as_secs_f64() * 1000.0);

        match processor.process(&frame, &mut *logger) {
            Ok(outcome) => {
                // Checked under the lock: once `stop` has raised the flag no
                // reading can land after its clear.
                let published = snapshot.with(|s| {
                    if cancelled.load(Ordering::Relaxed) {
                        return false;
                    }
                    s.publish(&outcome.assigned, outcome.preview, outcome.debug_frame);
                    true
                });
                if !published {
                    break;
                }
                frames += 1;
                logger.frame(frames);
            }
            Err(e) => log::warn!("Frame {} skipped: {e}", frame.index()),
        }
    }

    snapshot.with(Snapshot::clear);
    source.close();
    logger.summary();
    let _ = done_tx.send(());
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::capture::domain::frame_source::CameraUnavailable;
    use crate::detection::domain::subject_locator::tests::FakeModel;
    use crate::detection::domain::subject_locator::SubjectLocator;
    use crate::detector::config::DetectorConfig;
    use crate::detector::frame_processor::tests::{two_mouth_frame, two_mouth_meshes};
    use crate::detector::overlay::OverlayRenderer;
    use crate::detector::worker_logger::NullWorkerLogger;
    use crate::gesture::domain::segmenter::GestureSegmenter;
    use crate::shared::frame::Frame;

    const STOP: Duration = Duration::from_secs(2);

    /// Plays `script`, then repeats `repeat` forever (or reports exhaustion).
    pub(crate) struct FakeSource {
        pub script: VecDeque<Result<Frame, CaptureError>>,
        pub repeat: Option<Frame>,
        pub open_fails: bool,
        pub read_delay: Duration,
        pub closed: Arc<AtomicBool>,
    }

    impl FakeSource {
        pub(crate) fn repeating(frame: Frame) -> Self {
            Self {
                script: VecDeque::new(),
                repeat: Some(frame),
                open_fails: false,
                read_delay: Duration::from_millis(2),
                closed: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl FrameSource for FakeSource {
        fn open(&mut self) -> Result<(), CameraUnavailable> {
            if self.open_fails {
                return Err(CameraUnavailable {
                    attempts: vec!["fake0".into()],
                    reason: "no device".into(),
                });
            }
            Ok(())
        }

        fn read(&mut self) -> Result<Frame, CaptureError> {
            std::thread::sleep(self.read_delay);
            if let Some(next) = self.script.pop_front() {
                return next;
            }
            self.repeat.clone().ok_or(CaptureError::Exhausted)
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::Relaxed);
        }
    }

    pub(crate) fn fake_processor(config: &DetectorConfig) -> FrameProcessor {
        let locator = SubjectLocator::new(
            Box::new(FakeModel {
                meshes: two_mouth_meshes(),
                fail: false,
            }),
            config.max_players,
            config.mouth_pad_px,
        );
        FrameProcessor::new(
            locator,
            GestureSegmenter::new(config.segmenter_config()),
            OverlayRenderer::new(config),
            config.max_players,
            config.show_debug_window,
        )
    }

    fn parts(source: FakeSource) -> WorkerParts {
        let config = DetectorConfig {
            preview_size: (80, 20),
            ..DetectorConfig::default()
        };
        WorkerParts {
            source: Box::new(source),
            processor: fake_processor(&config),
            logger: Box::new(NullWorkerLogger),
            capture_retry: Duration::from_millis(1),
            camera_available: Arc::new(AtomicBool::new(true)),
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_publishes_until_stopped_then_clears() {
        let source = FakeSource::repeating(two_mouth_frame([true, false]));
        let closed = source.closed.clone();
        let snapshot = SharedSnapshot::new(2);
        let worker = DetectorWorker::spawn(parts(source), snapshot.clone()).unwrap();

        assert!(wait_until(|| snapshot.with(|s| s.state(0))));
        assert!(!snapshot.with(|s| s.state(1)));
        assert!(snapshot.with(|s| s.preview()).is_some());

        assert!(worker.stop(STOP));
        assert!(!snapshot.with(|s| s.state(0)));
        assert!(snapshot.with(|s| s.preview()).is_none());
        assert!(closed.load(Ordering::Relaxed));
    }

    #[test]
    fn test_open_failure_leaves_snapshot_empty() {
        let mut source = FakeSource::repeating(two_mouth_frame([true, true]));
        source.open_fails = true;
        let snapshot = SharedSnapshot::new(2);
        let parts = parts(source);
        let available = parts.camera_available.clone();

        let worker = DetectorWorker::spawn(parts, snapshot.clone()).unwrap();

        assert!(wait_until(|| worker.is_finished()));
        assert!(!available.load(Ordering::Relaxed));
        assert!(!snapshot.with(|s| s.state(0)));
        assert!(snapshot.with(|s| s.preview()).is_none());
        assert!(worker.stop(STOP));
    }

    #[test]
    fn test_transient_capture_errors_are_retried() {
        let mut source = FakeSource::repeating(two_mouth_frame([false, true]));
        source.script = VecDeque::from(vec![
            Err(CaptureError::Device("busy".into())),
            Err(CaptureError::Device("busy".into())),
        ]);
        let snapshot = SharedSnapshot::new(2);
        let worker = DetectorWorker::spawn(parts(source), snapshot.clone()).unwrap();

        assert!(wait_until(|| snapshot.with(|s| s.state(1))));
        assert!(worker.stop(STOP));
    }

    #[test]
    fn test_end_of_stream_from_live_device_is_retried() {
        let mut source = FakeSource::repeating(two_mouth_frame([false, true]));
        source.script = VecDeque::from(vec![
            Ok(two_mouth_frame([true, false])),
            Err(CaptureError::Device("end of stream".into())),
        ]);
        let snapshot = SharedSnapshot::new(2);
        let parts = parts(source);
        let available = parts.camera_available.clone();
        let worker = DetectorWorker::spawn(parts, snapshot.clone()).unwrap();

        assert!(wait_until(|| snapshot.with(|s| s.state(1))));
        assert!(!worker.is_finished());
        assert!(available.load(Ordering::Relaxed));
        assert!(worker.stop(STOP));
    }

    #[test]
    fn test_exhausted_source_ends_worker() {
        let mut source = FakeSource::repeating(two_mouth_frame([true, true]));
        source.repeat = None;
        source.script = VecDeque::from(vec![Ok(two_mouth_frame([true, true]))]);
        let closed = source.closed.clone();
        let snapshot = SharedSnapshot::new(2);

        let worker = DetectorWorker::spawn(parts(source), snapshot.clone()).unwrap();

        assert!(wait_until(|| worker.is_finished()));
        assert!(closed.load(Ordering::Relaxed));
        assert!(!snapshot.with(|s| s.state(0)));
        assert!(worker.stop(STOP));
    }

    #[test]
    fn test_stop_gives_up_on_stuck_capture() {
        let mut source = FakeSource::repeating(two_mouth_frame([false, false]));
        source.read_delay = Duration::from_secs(3);
        let snapshot = SharedSnapshot::new(2);
        let worker = DetectorWorker::spawn(parts(source), snapshot).unwrap();

        let started = Instant::now();
        assert!(!worker.stop(Duration::from_millis(50)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_detached_worker_never_publishes_after_stop() {
        let mut source = FakeSource::repeating(two_mouth_frame([true, true]));
        source.read_delay = Duration::from_millis(300);
        let snapshot = SharedSnapshot::new(2);
        let worker = DetectorWorker::spawn(parts(source), snapshot.clone()).unwrap();
        assert!(wait_until(|| snapshot.with(|s| s.state(0))));

        // The worker is parked in its next read; stop detaches it.
        worker.stop(Duration::from_millis(20));
        snapshot.with(Snapshot::clear);

        let deadline = Instant::now() + Duration::from_millis(800);
        while Instant::now() < deadline {
            assert!(!snapshot.with(|s| s.state(0)));
            assert!(!snapshot.with(|s| s.consume_rising_edge(0, Instant::now(), Duration::ZERO)));
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}
