use crate::detection::domain::face_mesh::FaceMesh;
use crate::shared::frame::Frame;

/// Domain interface for the face-landmark capability.
///
/// Returns up to `max_faces` meshes in no particular order. Implementations
/// may keep inference state between frames, hence `&mut self`.
pub trait LandmarkModel: Send {
    fn detect(
        &mut self,
        frame: &Frame,
        max_faces: usize,
    ) -> Result<Vec<FaceMesh>, Box<dyn std::error::Error>>;
}
