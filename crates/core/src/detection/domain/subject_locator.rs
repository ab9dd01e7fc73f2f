use crate::detection::domain::face_mesh::FaceMesh;
use crate::detection::domain::landmark_model::LandmarkModel;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::{INNER_LIPS, LOWER_INNER_LIP, UPPER_INNER_LIP};
use crate::shared::frame::Frame;

/// One face found in a single frame, reduced to what the segmenter needs.
#[derive(Clone, Debug, PartialEq)]
pub struct Subject {
    /// Inner-lip ring padded outward and clamped to the frame.
    pub mouth_box: BoundingBox,
    /// Inner-lip ring in frame pixels, polygon order.
    pub mouth_polygon: Vec<(i32, i32)>,
    /// Centre of `mouth_box`; the assigner orders subjects by its `x`.
    pub center: (i32, i32),
    /// Vertical gap between the upper and lower inner lip, in pixels.
    pub openness: u32,
}

/// Turns landmark meshes into mouth regions.
pub struct SubjectLocator {
    model: Box<dyn LandmarkModel>,
    max_subjects: usize,
    pad_px: i32,
}

impl SubjectLocator {
    pub fn new(model: Box<dyn LandmarkModel>, max_subjects: usize, pad_px: i32) -> Self {
        Self {
            model,
            max_subjects,
            pad_px,
        }
    }

    /// Locates at most `max_subjects` subjects, in model order.
    ///
    /// Meshes whose mouth box collapses to nothing after clamping are
    /// dropped and do not count toward the cap.
    pub fn locate(&mut self, frame: &Frame) -> Result<Vec<Subject>, Box<dyn std::error::Error>> {
        let meshes = self.model.detect(frame, self.max_subjects)?;
        let subjects = meshes
            .iter()
            .take(self.max_subjects)
            .filter_map(|mesh| {
                let subject = subject_from_mesh(mesh, frame.width(), frame.height(), self.pad_px);
                if subject.is_none() {
                    log::debug!("Discarded face with empty mouth box");
                }
                subject
            })
            .collect();
        Ok(subjects)
    }
}

/// Builds a [`Subject`] from one mesh, or `None` if the mesh lacks the lip
/// landmarks or its mouth box has no area.
pub fn subject_from_mesh(
    mesh: &FaceMesh,
    frame_w: u32,
    frame_h: u32,
    pad_px: i32,
) -> Option<Subject> {
    let mouth_polygon = mesh.points_px(&INNER_LIPS, frame_w, frame_h)?;
    let mouth_box = BoundingBox::around_points(&mouth_polygon, pad_px, frame_w, frame_h)?;

    let (_, upper_y) = mesh.point_px(UPPER_INNER_LIP, frame_w, frame_h)?;
    let (_, lower_y) = mesh.point_px(LOWER_INNER_LIP, frame_w, frame_h)?;

    Some(Subject {
        center: mouth_box.center(),
        mouth_box,
        mouth_polygon,
        openness: lower_y.abs_diff(upper_y),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::shared::constants::MESH_POINT_COUNT;

    /// A mesh whose inner-lip ring is an ellipse centred on `(cx, cy)`
    /// (normalised) with radii `rx`, `ry`. The ring starts at the left
    /// mouth corner and passes the upper mid-lip first.
    pub(crate) fn mouth_mesh(cx: f32, cy: f32, rx: f32, ry: f32) -> FaceMesh {
        let mut points = vec![(cx, cy); MESH_POINT_COUNT];
        let n = INNER_LIPS.len();
        for (k, &idx) in INNER_LIPS.iter().enumerate() {
            let angle = std::f32::consts::TAU * k as f32 / n as f32;
            points[idx] = (cx - rx * angle.cos(), cy - ry * angle.sin());
        }
        FaceMesh::new(points, 0.9)
    }

    pub(crate) struct FakeModel {
        pub meshes: Vec<FaceMesh>,
        pub fail: bool,
    }

    impl LandmarkModel for FakeModel {
        fn detect(
            &mut self,
            _frame: &Frame,
            _max_faces: usize,
        ) -> Result<Vec<FaceMesh>, Box<dyn std::error::Error>> {
            if self.fail {
                return Err("model failed".into());
            }
            Ok(self.meshes.clone())
        }
    }

    fn blank_frame() -> Frame {
        Frame::new(vec![0; 200 * 100 * 3], 200, 100, 0)
    }

    #[test]
    fn test_subject_from_mesh_box_and_openness() {
        let mesh = mouth_mesh(0.5, 0.5, 0.1, 0.05);

        let subject = subject_from_mesh(&mesh, 200, 100, 6).unwrap();

        // Lips span x 80..=120, y 45..=55 before padding.
        assert_eq!(subject.mouth_box, BoundingBox::new(74, 39, 127, 62));
        assert_eq!(subject.openness, 10);
        assert_eq!(subject.center, subject.mouth_box.center());
        assert_eq!(subject.mouth_polygon.len(), INNER_LIPS.len());
    }

    #[test]
    fn test_subject_from_mesh_outside_frame_is_discarded() {
        let mesh = mouth_mesh(1.5, 1.5, 0.01, 0.01);
        assert!(subject_from_mesh(&mesh, 200, 100, 6).is_none());
    }

    #[test]
    fn test_subject_from_short_mesh_is_discarded() {
        let mesh = FaceMesh::new(vec![(0.5, 0.5); 20], 0.9);
        assert!(subject_from_mesh(&mesh, 200, 100, 6).is_none());
    }

    #[test]
    fn test_locate_caps_and_skips_discarded() {
        let model = FakeModel {
            meshes: vec![
                mouth_mesh(2.0, 2.0, 0.01, 0.01),
                mouth_mesh(0.7, 0.5, 0.05, 0.05),
                mouth_mesh(0.3, 0.5, 0.05, 0.05),
            ],
            fail: false,
        };
        let mut locator = SubjectLocator::new(Box::new(model), 2, 6);

        let subjects = locator.locate(&blank_frame()).unwrap();

        // Capped before discarding, so only one of the first two survives.
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].center.0, 140);
    }

    #[test]
    fn test_locate_propagates_model_error() {
        let model = FakeModel {
            meshes: vec![],
            fail: true,
        };
        let mut locator = SubjectLocator::new(Box::new(model), 2, 6);
        assert!(locator.locate(&blank_frame()).is_err());
    }
}
