use std::fmt;

/// Where the gesture points relative to the mouth centre.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Center,
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Center => "CENTER",
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifies an offset in image coordinates (`dy > 0` is down).
///
/// Both offsets strictly inside `dead_px`, or both zero, give `Center`.
/// Otherwise the larger-magnitude axis decides; equal magnitudes go to the
/// horizontal axis.
pub fn classify(dx: i32, dy: i32, dead_px: i32) -> Direction {
    if (dx == 0 && dy == 0) || (dx.abs() < dead_px && dy.abs() < dead_px) {
        Direction::Center
    } else if dx.abs() >= dy.abs() {
        if dx > 0 {
            Direction::Right
        } else {
            Direction::Left
        }
    } else if dy > 0 {
        Direction::Down
    } else {
        Direction::Up
    }
}

/// Dead-zone radius in pixels for a box whose longer side is `max_side`.
pub fn dead_zone_px(dead_frac: f64, max_side: i32) -> i32 {
    (dead_frac * max_side.max(1) as f64) as i32
}
