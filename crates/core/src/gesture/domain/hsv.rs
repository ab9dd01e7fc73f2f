//! 8-bit hue/saturation/value in the common machine-vision scale:
//! hue in `[0, 179]` (degrees halved), saturation and value in `[0, 255]`.

use serde::{Deserialize, Serialize};

pub const HUE_MAX: u8 = 179;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub fn from_rgb(rgb: [u8; 3]) -> Self {
        let [r, g, b] = rgb.map(f32::from);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let s = if max > 0.0 { delta * 255.0 / max } else { 0.0 };

        let degrees = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * (g - b) / delta
        } else if max == g {
            120.0 + 60.0 * (b - r) / delta
        } else {
            240.0 + 60.0 * (r - g) / delta
        };
        let degrees = if degrees < 0.0 { degrees + 360.0 } else { degrees };

        // 359.x degrees rounds up to 180, which wraps to red at 0.
        let h = (degrees / 2.0).round() as u16 % (HUE_MAX as u16 + 1);

        Self {
            h: h as u8,
            s: s.round() as u8,
            v: max as u8,
        }
    }
}

/// Inclusive box in HSV space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvBand {
    pub h_min: u8,
    pub h_max: u8,
    pub s_min: u8,
    pub s_max: u8,
    pub v_min: u8,
    pub v_max: u8,
}

impl HsvBand {
    pub const fn new(h: (u8, u8), s: (u8, u8), v: (u8, u8)) -> Self {
        Self {
            h_min: h.0,
            h_max: h.1,
            s_min: s.0,
            s_max: s.1,
            v_min: v.0,
            v_max: v.1,
        }
    }

    pub fn contains(&self, hsv: Hsv) -> bool {
        (self.h_min..=self.h_max).contains(&hsv.h)
            && (self.s_min..=self.s_max).contains(&hsv.s)
            && (self.v_min..=self.v_max).contains(&hsv.v)
    }

    /// Every range is non-empty and hue stays on the 0..=179 scale.
    pub fn is_valid(&self) -> bool {
        self.h_min <= self.h_max
            && self.h_max <= HUE_MAX
            && self.s_min <= self.s_max
            && self.v_min <= self.v_max
    }
}

/// Red just above 0°, with saturation/value floors that reject shadow.
pub const LOW_RED_BAND: HsvBand = HsvBand::new((0, 12), (60, 255), (70, 255));

/// Red/pink just below 360°.
pub const HIGH_RED_BAND: HsvBand = HsvBand::new((160, 179), (60, 255), (70, 255));
