use thiserror::Error;

use crate::shared::frame::Frame;

/// No capture device could be opened. Fatal to the detector worker.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("no camera could be opened (tried {}): {reason}", attempts.join(", "))]
pub struct CameraUnavailable {
    /// Human-readable description of each device tried, in order.
    pub attempts: Vec<String>,
    pub reason: String,
}

/// A single frame could not be read. Transient: back off briefly and retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("source is not open")]
    NotOpen,
    #[error("source exhausted")]
    Exhausted,
    #[error("capture failed: {0}")]
    Device(String),
}

/// Owns a capture device and yields colour frames on demand.
///
/// `read` may block on hardware I/O; callers run it on their own thread.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<(), CameraUnavailable>;

    fn read(&mut self) -> Result<Frame, CaptureError>;

    /// Releases the device. Safe to call repeatedly.
    fn close(&mut self);
}
