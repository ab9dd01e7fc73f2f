//! Dense face landmarks in frame-normalised coordinates.

/// One detected face as a list of landmark points.
///
/// Points are normalised to the frame (`x / width`, `y / height`), so they
/// stay valid if the consumer rescales the frame. Indices follow the
/// 468-point face-mesh topology.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceMesh {
    points: Vec<(f32, f32)>,
    confidence: f32,
}

impl FaceMesh {
    pub fn new(points: Vec<(f32, f32)>, confidence: f32) -> Self {
        Self { points, confidence }
    }

    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Landmark `index` in pixel coordinates of a `width` × `height` frame.
    ///
    /// Truncates toward zero onto the pixel grid. `None` if the mesh has no
    /// such index.
    pub fn point_px(&self, index: usize, width: u32, height: u32) -> Option<(i32, i32)> {
        let &(x, y) = self.points.get(index)?;
        Some(((x * width as f32) as i32, (y * height as f32) as i32))
    }

    /// Pixel coordinates of several landmarks, in the order given.
    pub fn points_px(&self, indices: &[usize], width: u32, height: u32) -> Option<Vec<(i32, i32)>> {
        indices
            .iter()
            .map(|&i| self.point_px(i, width, height))
            .collect()
    }
}
