//! The pollable switch handed to the game loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use image::RgbImage;

use crate::capture::domain::frame_source::FrameSource;
use crate::capture::infrastructure::ffmpeg_camera::FfmpegCamera;
use crate::capture::infrastructure::mirrored_source::MirroredSource;
use crate::detection::domain::landmark_model::LandmarkModel;
use crate::detection::domain::subject_locator::SubjectLocator;
use crate::detection::infrastructure::onnx_face_mesh_model::OnnxFaceMeshModel;
use crate::detector::config::{ConfigError, DetectorConfig};
use crate::detector::frame_processor::FrameProcessor;
use crate::detector::overlay::OverlayRenderer;
use crate::detector::snapshot::{PreviewImage, SharedSnapshot, Snapshot};
use crate::detector::worker::{DetectorWorker, WorkerParts};
use crate::detector::worker_logger::LogWorkerLogger;
use crate::gesture::domain::direction::Direction;
use crate::gesture::domain::segmenter::GestureSegmenter;
use crate::shared::constants::{FACE_MODEL_NAME, FACE_MODEL_URL, MESH_MODEL_NAME};
use crate::shared::model_resolver::{self, ModelSource};

/// Consumer-facing gesture signal.
///
/// Every accessor is non-blocking apart from a momentary lock, never fails,
/// and returns owned copies. Slots outside `0..max_players()` read as empty.
pub trait GestureSignal: Send + Sync {
    /// Starts the background worker. Later calls do nothing.
    fn start(&self);

    /// Stops the worker, waiting a bounded time for it to exit. Idempotent.
    fn stop(&self);

    fn get_state(&self, slot: usize) -> bool;

    /// One-shot, debounced rising edge of [`get_state`](Self::get_state).
    fn consume_rising_edge(&self, slot: usize) -> bool;

    fn get_direction(&self, slot: usize) -> Option<Direction>;

    fn get_preview(&self) -> Option<PreviewImage>;

    /// Full-resolution annotated frame, only when `show_debug_window` is set.
    fn get_debug_frame(&self) -> Option<RgbImage>;

    fn is_enabled(&self) -> bool;

    fn max_players(&self) -> usize;
}

/// Builds the live detector on the configured camera, or the disabled
/// switch if the configuration or the landmark models are unusable.
pub fn create(config: DetectorConfig) -> Box<dyn GestureSignal> {
    let camera = Box::new(FfmpegCamera::new(config.camera.clone()));
    create_with_source(config, camera)
}

/// Like [`create`], reading frames from `source` instead of the camera.
pub fn create_with_source(
    config: DetectorConfig,
    source: Box<dyn FrameSource>,
) -> Box<dyn GestureSignal> {
    let max_players = config.max_players;
    if let Err(e) = config.validate() {
        log::warn!("Gesture detector disabled: {e}");
        return Box::new(DisabledGestureSwitch::new(max_players));
    }
    let model = match load_landmark_model(&config) {
        Ok(model) => model,
        Err(e) => {
            log::warn!("Gesture detector disabled, landmark model unavailable: {e}");
            return Box::new(DisabledGestureSwitch::new(max_players));
        }
    };
    match CameraGestureSwitch::new(config, source, Box::new(model)) {
        Ok(switch) => Box::new(switch),
        Err(e) => {
            log::warn!("Gesture detector disabled: {e}");
            Box::new(DisabledGestureSwitch::new(max_players))
        }
    }
}

fn load_landmark_model(
    config: &DetectorConfig,
) -> Result<OnnxFaceMeshModel, Box<dyn std::error::Error>> {
    let bundled = config.model_dir.as_deref();
    let face = model_resolver::resolve(
        ModelSource {
            name: FACE_MODEL_NAME,
            url: Some(FACE_MODEL_URL),
        },
        bundled,
        None,
    )?;
    let mesh = match &config.mesh_model {
        Some(path) => path.clone(),
        None => model_resolver::resolve(
            ModelSource {
                name: MESH_MODEL_NAME,
                url: None,
            },
            bundled,
            None,
        )?,
    };
    OnnxFaceMeshModel::new(&face, &mesh, config.detection_confidence)
}

/// Live detector: one worker thread publishing into a shared snapshot.
pub struct CameraGestureSwitch {
    config: DetectorConfig,
    snapshot: SharedSnapshot,
    /// Cleared by the worker if the camera cannot be opened.
    camera_available: Arc<AtomicBool>,
    /// Taken by the first `start`.
    pending: Mutex<Option<WorkerParts>>,
    worker: Mutex<Option<DetectorWorker>>,
}

impl CameraGestureSwitch {
    pub fn new(
        config: DetectorConfig,
        source: Box<dyn FrameSource>,
        model: Box<dyn LandmarkModel>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let source: Box<dyn FrameSource> = if config.mirror {
            Box::new(MirroredSource::new(source))
        } else {
            source
        };
        let processor = FrameProcessor::new(
            SubjectLocator::new(model, config.max_players, config.mouth_pad_px),
            GestureSegmenter::new(config.segmenter_config()),
            OverlayRenderer::new(&config),
            config.max_players,
            config.show_debug_window,
        );
        let camera_available = Arc::new(AtomicBool::new(true));
        let parts = WorkerParts {
            source,
            processor,
            logger: Box::new(LogWorkerLogger::default()),
            capture_retry: config.capture_retry(),
            camera_available: camera_available.clone(),
        };

        Ok(Self {
            snapshot: SharedSnapshot::new(config.max_players),
            camera_available,
            config,
            pending: Mutex::new(Some(parts)),
            worker: Mutex::new(None),
        })
    }
}

impl GestureSignal for CameraGestureSwitch {
    fn start(&self) {
        let Some(parts) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            log::debug!("Gesture detector already started");
            return;
        };
        match DetectorWorker::spawn(parts, self.snapshot.clone()) {
            Ok(worker) => {
                *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(worker);
            }
            Err(e) => log::error!("Failed to spawn gesture detector: {e}"),
        }
    }

    fn stop(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if !worker.stop(self.config.stop_timeout()) {
                self.snapshot.with(Snapshot::clear);
            }
        }
    }

    fn get_state(&self, slot: usize) -> bool {
        self.snapshot.with(|s| s.state(slot))
    }

    fn consume_rising_edge(&self, slot: usize) -> bool {
        let debounce = self.config.debounce();
        self.snapshot
            .with(|s| s.consume_rising_edge(slot, Instant::now(), debounce))
    }

    fn get_direction(&self, slot: usize) -> Option<Direction> {
        self.snapshot.with(|s| s.direction(slot))
    }

    fn get_preview(&self) -> Option<PreviewImage> {
        self.snapshot.with(|s| s.preview())
    }

    fn get_debug_frame(&self) -> Option<RgbImage> {
        self.snapshot.with(|s| s.debug_frame())
    }

    fn is_enabled(&self) -> bool {
        self.camera_available.load(Ordering::Relaxed)
    }

    fn max_players(&self) -> usize {
        self.config.max_players
    }
}

/// Stand-in when the detector cannot run: nobody is ever present.
pub struct DisabledGestureSwitch {
    max_players: usize,
}

impl DisabledGestureSwitch {
    pub fn new(max_players: usize) -> Self {
        Self { max_players }
    }
}

impl GestureSignal for DisabledGestureSwitch {
    fn start(&self) {}
    fn stop(&self) {}

    fn get_state(&self, _slot: usize) -> bool {
        false
    }

    fn consume_rising_edge(&self, _slot: usize) -> bool {
        false
    }

    fn get_direction(&self, _slot: usize) -> Option<Direction> {
        None
    }

    fn get_preview(&self) -> Option<PreviewImage> {
        None
    }

    fn get_debug_frame(&self) -> Option<RgbImage> {
        None
    }

    fn is_enabled(&self) -> bool {
        false
    }

    fn max_players(&self) -> usize {
        self.max_players
    }
}
