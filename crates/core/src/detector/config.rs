use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::domain::camera_candidate::{default_candidates, CameraCandidate};
use crate::gesture::domain::hsv::{HsvBand, HIGH_RED_BAND, LOW_RED_BAND};
use crate::gesture::domain::segmenter::SegmenterConfig;

/// Shortest allowed wait for the worker on `stop`.
pub const MIN_STOP_TIMEOUT_MS: u64 = 1000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Colour order of the published preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// Construction-time settings of the detector. Immutable once the detector
/// is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Also publish the full-resolution annotated frame.
    pub show_debug_window: bool,
    pub frac_threshold: f64,
    pub min_open_px: u32,
    pub debounce_s: f64,
    /// `(width, height)` of the published preview.
    pub preview_size: (u32, u32),
    pub dir_dead_frac: f64,
    pub mirror: bool,
    pub max_players: usize,
    /// Draw boxes, contours, arrows and the readout onto the preview.
    pub show_metrics: bool,
    pub overlay_font: Option<PathBuf>,
    pub preview_order: ChannelOrder,
    pub hsv_bands: [HsvBand; 2],
    /// Devices tried in order when the camera opens.
    pub camera: Vec<CameraCandidate>,
    pub mouth_pad_px: i32,
    pub stop_timeout_ms: u64,
    pub capture_retry_ms: u64,
    pub detection_confidence: f64,
    /// Explicit face-mesh model file; otherwise looked up in the model cache.
    pub mesh_model: Option<PathBuf>,
    /// Directory searched for models after the user cache.
    pub model_dir: Option<PathBuf>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            show_debug_window: false,
            frac_threshold: 0.06,
            min_open_px: 8,
            debounce_s: 0.12,
            preview_size: (900, 260),
            dir_dead_frac: 0.10,
            mirror: true,
            max_players: 2,
            show_metrics: true,
            overlay_font: None,
            preview_order: ChannelOrder::Rgb,
            hsv_bands: [LOW_RED_BAND, HIGH_RED_BAND],
            camera: default_candidates(),
            mouth_pad_px: 6,
            stop_timeout_ms: MIN_STOP_TIMEOUT_MS,
            capture_retry_ms: 10,
            detection_confidence: 0.5,
            mesh_model: None,
            model_dir: None,
        }
    }
}

impl DetectorConfig {
    /// `~/.config/TongueSwitch/detector.json` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("TongueSwitch").join("detector.json"))
    }

    /// Reads a JSON config. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        fs::write(path, json).map_err(write_error)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.max_players == 0 {
            return invalid("max_players must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.frac_threshold) {
            return invalid(format!("frac_threshold {} is outside [0, 1]", self.frac_threshold));
        }
        if self.dir_dead_frac.is_nan() || self.dir_dead_frac < 0.0 {
            return invalid(format!("dir_dead_frac {} is negative", self.dir_dead_frac));
        }
        if !self.debounce_s.is_finite() || self.debounce_s < 0.0 {
            return invalid(format!("debounce_s {} is not a duration", self.debounce_s));
        }
        if self.preview_size.0 == 0 || self.preview_size.1 == 0 {
            return invalid(format!("preview_size {:?} has no area", self.preview_size));
        }
        if self.stop_timeout_ms < MIN_STOP_TIMEOUT_MS {
            return invalid(format!(
                "stop_timeout_ms {} is below {MIN_STOP_TIMEOUT_MS}",
                self.stop_timeout_ms
            ));
        }
        if self.camera.is_empty() {
            return invalid("camera list is empty".into());
        }
        if let Some(band) = self.hsv_bands.iter().find(|b| !b.is_valid()) {
            return invalid(format!("hsv band {band:?} is inverted or out of range"));
        }
        if !(0.0..=1.0).contains(&self.detection_confidence) {
            return invalid(format!(
                "detection_confidence {} is outside [0, 1]",
                self.detection_confidence
            ));
        }
        Ok(())
    }

    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            frac_threshold: self.frac_threshold,
            min_open_px: self.min_open_px,
            dir_dead_frac: self.dir_dead_frac,
            bands: self.hsv_bands,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::try_from_secs_f64(self.debounce_s).unwrap_or(Duration::ZERO)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms.max(MIN_STOP_TIMEOUT_MS))
    }

    pub fn capture_retry(&self) -> Duration {
        Duration::from_millis(self.capture_retry_ms)
    }
}
