use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::capture::domain::frame_source::{CameraUnavailable, CaptureError, FrameSource};
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Replays a directory of still images as if they came from a camera.
///
/// Files are played in file-name order. With `looping` the sequence restarts
/// after the last file, otherwise `read` returns [`CaptureError::Exhausted`].
/// Reads are paced to `frame_interval` so debounce timing behaves as it would
/// on live capture.
pub struct ImageSequenceSource {
    dir: PathBuf,
    looping: bool,
    frame_interval: Duration,
    files: Vec<PathBuf>,
    position: usize,
    frame_index: usize,
    last_read: Option<Instant>,
}

impl ImageSequenceSource {
    pub fn new(dir: impl Into<PathBuf>, looping: bool) -> Self {
        Self {
            dir: dir.into(),
            looping,
            frame_interval: Duration::ZERO,
            files: Vec::new(),
            position: 0,
            frame_index: 0,
            last_read: None,
        }
    }

    pub fn with_frame_interval(mut self, frame_interval: Duration) -> Self {
        self.frame_interval = frame_interval;
        self
    }

    fn unavailable(&self, reason: String) -> CameraUnavailable {
        CameraUnavailable {
            attempts: vec![self.dir.display().to_string()],
            reason,
        }
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_read {
            let elapsed = last.elapsed();
            if elapsed < self.frame_interval {
                std::thread::sleep(self.frame_interval - elapsed);
            }
        }
        self.last_read = Some(Instant::now());
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<(), CameraUnavailable> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| self.unavailable(e.to_string()))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(self.unavailable("directory contains no images".to_string()));
        }

        log::info!("Replaying {} images from {}", files.len(), self.dir.display());
        self.files = files;
        self.position = 0;
        self.frame_index = 0;
        self.last_read = None;
        Ok(())
    }

    fn read(&mut self) -> Result<Frame, CaptureError> {
        if self.files.is_empty() {
            return Err(CaptureError::NotOpen);
        }
        if self.position >= self.files.len() {
            if !self.looping {
                return Err(CaptureError::Exhausted);
            }
            self.position = 0;
        }

        self.pace();
        let path = &self.files[self.position];
        self.position += 1;

        let image = image::open(path)
            .map_err(|e| CaptureError::Device(format!("{}: {e}", path.display())))?
            .to_rgb8();
        let frame = Frame::from_rgb_image(image, self.frame_index, Instant::now());
        self.frame_index += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        self.files.clear();
        self.position = 0;
    }
}
