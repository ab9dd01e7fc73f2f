use crate::capture::domain::frame_source::{CameraUnavailable, CaptureError, FrameSource};
use crate::shared::frame::Frame;

/// Decorator that flips every frame horizontally, giving a selfie view.
///
/// All downstream coordinates (mouth boxes, centroids, left-to-right slot
/// order) are in the mirrored space.
pub struct MirroredSource {
    inner: Box<dyn FrameSource>,
}

impl MirroredSource {
    pub fn new(inner: Box<dyn FrameSource>) -> Self {
        Self { inner }
    }
}

impl FrameSource for MirroredSource {
    fn open(&mut self) -> Result<(), CameraUnavailable> {
        self.inner.open()
    }

    fn read(&mut self) -> Result<Frame, CaptureError> {
        self.inner.read().map(|frame| frame.mirrored())
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
