use serde::{Deserialize, Serialize};

/// Platform capture API, named after the libavdevice demuxer that drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackend {
    V4l2,
    AvFoundation,
    VfwCap,
}

impl CameraBackend {
    /// libavdevice input format name.
    pub fn format_name(&self) -> &'static str {
        match self {
            CameraBackend::V4l2 => "video4linux2",
            CameraBackend::AvFoundation => "avfoundation",
            CameraBackend::VfwCap => "vfwcap",
        }
    }
}

/// One `(backend, device index)` pair to try when opening the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraCandidate {
    pub backend: CameraBackend,
    pub index: u32,
}

impl CameraCandidate {
    pub fn new(backend: CameraBackend, index: u32) -> Self {
        Self { backend, index }
    }

    /// Device URL in the syntax the backend's demuxer expects.
    pub fn url(&self) -> String {
        match self.backend {
            CameraBackend::V4l2 => format!("/dev/video{}", self.index),
            // Video device only; ":none" skips audio capture.
            CameraBackend::AvFoundation => format!("{}:none", self.index),
            CameraBackend::VfwCap => self.index.to_string(),
        }
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.backend.format_name(), self.url())
    }
}

/// Devices tried in order when no explicit list is configured.
pub fn default_candidates() -> Vec<CameraCandidate> {
    let backend = if cfg!(target_os = "macos") {
        CameraBackend::AvFoundation
    } else if cfg!(target_os = "windows") {
        CameraBackend::VfwCap
    } else {
        CameraBackend::V4l2
    };
    vec![
        CameraCandidate::new(backend, 0),
        CameraCandidate::new(backend, 1),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::v4l2(CameraBackend::V4l2, 1, "/dev/video1")]
    #[case::avfoundation(CameraBackend::AvFoundation, 0, "0:none")]
    #[case::vfwcap(CameraBackend::VfwCap, 2, "2")]
    fn test_url(#[case] backend: CameraBackend, #[case] index: u32, #[case] expected: &str) {
        assert_eq!(CameraCandidate::new(backend, index).url(), expected);
    }

    #[test]
    fn test_default_candidates_try_first_two_devices() {
        let candidates = default_candidates();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].index, 0);
        assert_eq!(candidates[1].index, 1);
        assert_eq!(candidates[0].backend, candidates[1].backend);
    }

    #[test]
    fn test_serde_uses_lowercase_backend_names() {
        let json = serde_json::to_string(&CameraCandidate::new(CameraBackend::AvFoundation, 1)).unwrap();
        assert_eq!(json, r#"{"backend":"avfoundation","index":1}"#);
    }
}
