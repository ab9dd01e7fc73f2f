/// Axis-aligned integer box in frame pixels, half-open: `[x0, x1) × [y0, y1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl BoundingBox {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Tight box around `points`, grown by `pad` on every side and clamped
    /// to a `frame_w` × `frame_h` frame.
    ///
    /// Returns `None` for an empty point list or when the clamped box has
    /// no area (e.g. the points lie entirely outside the frame).
    pub fn around_points(
        points: &[(i32, i32)],
        pad: i32,
        frame_w: u32,
        frame_h: u32,
    ) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.0, first.1, first.0, first.1);
        for &(x, y) in &points[1..] {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        // Inclusive pixel extent, so the exclusive edge is max + 1.
        let bbox = Self {
            x0: (min_x - pad).max(0),
            y0: (min_y - pad).max(0),
            x1: (max_x + 1 + pad).min(frame_w as i32),
            y1: (max_y + 1 + pad).min(frame_h as i32),
        };
        (!bbox.is_empty()).then_some(bbox)
    }

    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn max_side(&self) -> i32 {
        self.width().max(self.height())
    }

    /// Integer midpoint, matching the pixel grid of the box edges.
    pub fn center(&self) -> (i32, i32) {
        ((self.x0 + self.x1) / 2, (self.y0 + self.y1) / 2)
    }

    /// Re-expresses frame points relative to the box origin.
    pub fn to_local(&self, points: &[(i32, i32)]) -> Vec<(i32, i32)> {
        points
            .iter()
            .map(|&(x, y)| (x - self.x0, y - self.y0))
            .collect()
    }
}
