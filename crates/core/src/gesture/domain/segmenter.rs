//! Colour segmentation of the gesture inside one mouth.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::point::Point;
use thiserror::Error;

use crate::detection::domain::subject_locator::Subject;
use crate::gesture::domain::direction::{classify, dead_zone_px, Direction};
use crate::gesture::domain::hsv::{Hsv, HsvBand, HIGH_RED_BAND, LOW_RED_BAND};
use crate::shared::constants::MIN_MOUTH_POLYGON_POINTS;
use crate::shared::frame::Frame;

/// Median filter radius (5×5 window).
const MEDIAN_RADIUS: u32 = 2;

/// Opening radius under the L∞ norm (3×3 square).
const OPEN_RADIUS: u8 = 1;

const ON: Luma<u8> = Luma([255]);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentationError {
    #[error("mouth polygon has {0} points, need at least {MIN_MOUTH_POLYGON_POINTS}")]
    TooFewPoints(usize),
    #[error("mouth polygon collapses to fewer than three distinct corners")]
    DegeneratePolygon,
    #[error("mouth region is empty")]
    EmptyRegion,
}

/// Thresholds and colour bands for one segmenter.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmenterConfig {
    pub frac_threshold: f64,
    pub min_open_px: u32,
    pub dir_dead_frac: f64,
    pub bands: [HsvBand; 2],
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            frac_threshold: 0.06,
            min_open_px: 8,
            dir_dead_frac: 0.10,
            bands: [LOW_RED_BAND, HIGH_RED_BAND],
        }
    }
}

/// What one subject shows in one frame.
///
/// `direction` is `Some` exactly when `present` is true.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureReading {
    pub present: bool,
    pub direction: Option<Direction>,
    pub openness: u32,
    pub fraction: f64,
}

impl GestureReading {
    pub fn absent() -> Self {
        Self {
            present: false,
            direction: None,
            openness: 0,
            fraction: 0.0,
        }
    }
}

/// Reading plus the intermediate images the overlay draws from.
#[derive(Clone, Debug)]
pub struct Segmentation {
    pub reading: GestureReading,
    /// Cleaned gesture mask in mouth-box coordinates.
    pub gesture_mask: GrayImage,
    /// Gesture centroid in frame coordinates, when any pixel survived.
    pub centroid: Option<(i32, i32)>,
}

pub struct GestureSegmenter {
    config: SegmenterConfig,
}

impl GestureSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    pub fn segment(&self, frame: &Frame, subject: &Subject) -> Result<Segmentation, SegmentationError> {
        let polygon = &subject.mouth_polygon;
        if polygon.len() < MIN_MOUTH_POLYGON_POINTS {
            return Err(SegmentationError::TooFewPoints(polygon.len()));
        }
        let mouth_box = subject.mouth_box;
        if mouth_box.is_empty() {
            return Err(SegmentationError::EmptyRegion);
        }

        let roi = frame.crop(
            mouth_box.x0.max(0) as u32,
            mouth_box.y0.max(0) as u32,
            mouth_box.x1.max(0) as u32,
            mouth_box.y1.max(0) as u32,
        );
        let (width, height) = roi.dimensions();
        if width == 0 || height == 0 {
            return Err(SegmentationError::EmptyRegion);
        }

        let mouth_mask = polygon_mask(&mouth_box.to_local(polygon), width, height)?;

        let mut raw = GrayImage::new(width, height);
        for (x, y, pixel) in roi.enumerate_pixels() {
            if mouth_mask.get_pixel(x, y)[0] == 0 {
                continue;
            }
            let hsv = Hsv::from_rgb(pixel.0);
            if self.config.bands.iter().any(|band| band.contains(hsv)) {
                raw.put_pixel(x, y, ON);
            }
        }

        let blurred = imageproc::filter::median_filter(&raw, MEDIAN_RADIUS, MEDIAN_RADIUS);
        let gesture_mask = imageproc::morphology::open(&blurred, Norm::LInf, OPEN_RADIUS);

        let gesture_px = count_on(&gesture_mask);
        let mouth_px = count_on(&mouth_mask);
        let fraction = gesture_px as f64 / mouth_px.max(1) as f64;
        let openness = subject.openness;
        let present = openness >= self.config.min_open_px && fraction >= self.config.frac_threshold;

        let centroid =
            local_centroid(&gesture_mask).map(|(cx, cy)| (mouth_box.x0 + cx, mouth_box.y0 + cy));

        let direction = if present {
            Some(match centroid {
                Some((tx, ty)) => {
                    let (mx, my) = mouth_box.center();
                    let dead = dead_zone_px(self.config.dir_dead_frac, mouth_box.max_side());
                    classify(tx - mx, ty - my, dead)
                }
                // Present with no surviving pixels only happens at a zero
                // threshold; there is no offset to classify.
                None => Direction::Center,
            })
        } else {
            None
        };

        Ok(Segmentation {
            reading: GestureReading {
                present,
                direction,
                openness,
                fraction,
            },
            gesture_mask,
            centroid,
        })
    }
}

/// Filled polygon mask. Repeated closing points are dropped.
fn polygon_mask(
    local: &[(i32, i32)],
    width: u32,
    height: u32,
) -> Result<GrayImage, SegmentationError> {
    let mut points: Vec<Point<i32>> = local.iter().map(|&(x, y)| Point::new(x, y)).collect();
    points.dedup();
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    if points.len() < 3 {
        return Err(SegmentationError::DegeneratePolygon);
    }

    let mut mask = GrayImage::new(width, height);
    imageproc::drawing::draw_polygon_mut(&mut mask, &points, ON);
    Ok(mask)
}

fn count_on(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] != 0).count()
}

/// Integer centroid of the set pixels, truncated onto the pixel grid.
fn local_centroid(mask: &GrayImage) -> Option<(i32, i32)> {
    let (mut sum_x, mut sum_y, mut n) = (0u64, 0u64, 0u64);
    for (x, y, p) in mask.enumerate_pixels() {
        if p[0] != 0 {
            sum_x += x as u64;
            sum_y += y as u64;
            n += 1;
        }
    }
    (n > 0).then(|| ((sum_x / n) as i32, (sum_y / n) as i32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::subject_locator::subject_from_mesh;
    use crate::detection::domain::subject_locator::tests::mouth_mesh;
    use crate::shared::bounding_box::BoundingBox;
    use image::{Rgb, RgbImage};
    use rstest::rstest;

    const DARK: Rgb<u8> = Rgb([30, 20, 20]);
    const TONGUE: Rgb<u8> = Rgb([220, 40, 60]);

    /// 200×100 frame with a 80×40 elliptical mouth centred on (100, 50).
    fn mouth_subject() -> Subject {
        subject_from_mesh(&mouth_mesh(0.5, 0.5, 0.2, 0.2), 200, 100, 6).unwrap()
    }

    fn frame_with(rects: &[(u32, u32, u32, u32)]) -> Frame {
        let mut img = RgbImage::from_pixel(200, 100, DARK);
        for &(x0, y0, x1, y1) in rects {
            for y in y0..y1 {
                for x in x0..x1 {
                    img.put_pixel(x, y, TONGUE);
                }
            }
        }
        Frame::from_rgb_image(img, 0, std::time::Instant::now())
    }

    fn segmenter() -> GestureSegmenter {
        GestureSegmenter::new(SegmenterConfig::default())
    }

    #[rstest]
    #[case::down((90, 56, 110, 68), Direction::Down)]
    #[case::up((90, 32, 110, 44), Direction::Up)]
    #[case::right((116, 43, 134, 57), Direction::Right)]
    #[case::left((66, 43, 84, 57), Direction::Left)]
    #[case::center((92, 42, 108, 58), Direction::Center)]
    fn test_direction_of_tongue(#[case] rect: (u32, u32, u32, u32), #[case] expected: Direction) {
        let seg = segmenter()
            .segment(&frame_with(&[rect]), &mouth_subject())
            .unwrap();

        assert!(seg.reading.present, "fraction {}", seg.reading.fraction);
        assert_eq!(seg.reading.direction, Some(expected));
        assert!(seg.centroid.is_some());
    }

    #[test]
    fn test_empty_mouth_is_absent() {
        let seg = segmenter().segment(&frame_with(&[]), &mouth_subject()).unwrap();

        assert!(!seg.reading.present);
        assert_eq!(seg.reading.direction, None);
        assert_eq!(seg.reading.fraction, 0.0);
        assert_eq!(seg.centroid, None);
        assert_eq!(seg.reading.openness, 40);
    }

    #[test]
    fn test_colour_outside_lips_is_ignored() {
        // Inside the padded box but outside the lip ellipse.
        let seg = segmenter()
            .segment(&frame_with(&[(55, 25, 70, 35)]), &mouth_subject())
            .unwrap();

        assert!(!seg.reading.present);
        assert_eq!(seg.reading.fraction, 0.0);
    }

    #[test]
    fn test_speckle_is_removed() {
        let seg = segmenter()
            .segment(&frame_with(&[(100, 50, 101, 51), (80, 45, 82, 46)]), &mouth_subject())
            .unwrap();

        assert_eq!(count_on(&seg.gesture_mask), 0);
        assert!(!seg.reading.present);
    }

    #[test]
    fn test_closed_mouth_is_absent_even_with_colour() {
        let config = SegmenterConfig {
            min_open_px: 41,
            ..SegmenterConfig::default()
        };
        let seg = GestureSegmenter::new(config)
            .segment(&frame_with(&[(90, 56, 110, 68)]), &mouth_subject())
            .unwrap();

        assert!(!seg.reading.present);
        assert_eq!(seg.reading.direction, None);
        assert!(seg.reading.fraction > 0.06);
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let baseline = segmenter()
            .segment(&frame_with(&[(90, 56, 110, 68)]), &mouth_subject())
            .unwrap();
        let config = SegmenterConfig {
            frac_threshold: baseline.reading.fraction,
            min_open_px: baseline.reading.openness,
            ..SegmenterConfig::default()
        };

        let seg = GestureSegmenter::new(config)
            .segment(&frame_with(&[(90, 56, 110, 68)]), &mouth_subject())
            .unwrap();

        assert!(seg.reading.present);
    }

    #[test]
    fn test_zero_threshold_without_pixels_reports_center() {
        let config = SegmenterConfig {
            frac_threshold: 0.0,
            ..SegmenterConfig::default()
        };
        let seg = GestureSegmenter::new(config)
            .segment(&frame_with(&[]), &mouth_subject())
            .unwrap();

        assert!(seg.reading.present);
        assert_eq!(seg.reading.direction, Some(Direction::Center));
    }

    #[test]
    fn test_fraction_is_bounded() {
        let seg = segmenter()
            .segment(&frame_with(&[(0, 0, 200, 100)]), &mouth_subject())
            .unwrap();

        assert!(seg.reading.fraction > 0.9);
        assert!(seg.reading.fraction <= 1.0);
    }

    #[test]
    fn test_too_few_points_is_error() {
        let subject = Subject {
            mouth_box: BoundingBox::new(10, 10, 40, 30),
            mouth_polygon: vec![(12, 12), (38, 12), (38, 28), (12, 28)],
            center: (25, 20),
            openness: 16,
        };
        let err = segmenter().segment(&frame_with(&[]), &subject).unwrap_err();
        assert_eq!(err, SegmentationError::TooFewPoints(4));
    }

    #[test]
    fn test_degenerate_polygon_is_error() {
        let subject = Subject {
            mouth_box: BoundingBox::new(10, 10, 40, 30),
            mouth_polygon: vec![(20, 20); 8],
            center: (25, 20),
            openness: 16,
        };
        let err = segmenter().segment(&frame_with(&[]), &subject).unwrap_err();
        assert_eq!(err, SegmentationError::DegeneratePolygon);
    }

    #[test]
    fn test_empty_box_is_error() {
        let mut subject = mouth_subject();
        subject.mouth_box = BoundingBox::new(50, 50, 50, 60);
        let err = segmenter().segment(&frame_with(&[]), &subject).unwrap_err();
        assert_eq!(err, SegmentationError::EmptyRegion);
    }

    #[test]
    fn test_local_centroid_truncates() {
        let mut mask = GrayImage::new(4, 4);
        mask.put_pixel(0, 0, ON);
        mask.put_pixel(3, 1, ON);
        assert_eq!(local_centroid(&mask), Some((1, 0)));
        assert_eq!(local_centroid(&GrayImage::new(2, 2)), None);
    }
}
