//! Debug annotations and the downscaled preview.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::imageops::FilterType;
use image::{GrayImage, Rgb, RgbImage};
use imageproc::contours::BorderType;
use imageproc::point::Point;
use imageproc::rect::Rect;

use crate::detection::domain::subject_locator::Subject;
use crate::detector::config::{ChannelOrder, DetectorConfig};
use crate::detector::snapshot::PreviewImage;
use crate::gesture::domain::segmenter::Segmentation;
use crate::shared::frame::Frame;

const MOUTH_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const CONTOUR_COLOR: Rgb<u8> = Rgb([255, 128, 0]);
const ARROW_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Contours smaller than this (in square pixels) are not boxed.
const MIN_CONTOUR_AREA: f64 = 12.0;

const TEXT_SCALE: f32 = 22.0;
const TEXT_MARGIN: i32 = 10;
const ARROW_HEAD_PX: f32 = 8.0;
const CENTER_DOT_RADIUS: i32 = 3;

pub struct OverlayRenderer {
    show_metrics: bool,
    font: Option<FontArc>,
    preview_size: (u32, u32),
    order: ChannelOrder,
}

impl OverlayRenderer {
    pub fn new(config: &DetectorConfig) -> Self {
        let font = config.overlay_font.as_deref().and_then(load_font);
        Self {
            show_metrics: config.show_metrics,
            font,
            preview_size: config.preview_size,
            order: config.preview_order,
        }
    }

    /// Full-resolution copy of `frame` with the per-slot annotations.
    pub fn annotate(&self, frame: &Frame, slots: &[Option<(Subject, Segmentation)>]) -> RgbImage {
        let mut img = frame.to_rgb_image();
        if !self.show_metrics {
            return img;
        }

        for (slot, entry) in slots.iter().enumerate() {
            let Some((subject, seg)) = entry else {
                continue;
            };
            draw_mouth(&mut img, subject, seg);

            let reading = &seg.reading;
            let dir = reading.direction.map_or("NONE", |d| d.label());
            let text = format!(
                "P{} open={}px frac={:.3} tongue={} dir={dir}",
                slot + 1,
                reading.openness,
                reading.fraction,
                reading.present
            );
            self.draw_readout(&mut img, slot, &text);
        }
        img
    }

    /// Scales to the preview size and packs in the configured channel order.
    pub fn preview(&self, annotated: &RgbImage) -> PreviewImage {
        let (w, h) = self.preview_size;
        let scaled = image::imageops::resize(annotated, w, h, FilterType::Triangle);
        PreviewImage::from_rgb(scaled, self.order)
    }

    fn draw_readout(&self, img: &mut RgbImage, line: usize, text: &str) {
        let Some(font) = &self.font else {
            log::trace!("{text}");
            return;
        };
        let scale = PxScale::from(TEXT_SCALE);
        let (text_w, text_h) = imageproc::drawing::text_size(scale, font, text);
        let x = (img.width() as i32 - text_w as i32 - TEXT_MARGIN).max(0);
        let y = TEXT_MARGIN + line as i32 * (text_h as i32 + TEXT_MARGIN / 2);
        imageproc::drawing::draw_text_mut(img, TEXT_COLOR, x, y, scale, font, text);
    }
}

fn load_font(path: &Path) -> Option<FontArc> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Overlay font {} unreadable: {e}", path.display());
            return None;
        }
    };
    match FontArc::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            log::warn!("Overlay font {} invalid: {e}", path.display());
            None
        }
    }
}

fn draw_mouth(img: &mut RgbImage, subject: &Subject, seg: &Segmentation) {
    let mouth = subject.mouth_box;
    if let Some(rect) = rect_of(mouth.x0, mouth.y0, mouth.x1, mouth.y1) {
        imageproc::drawing::draw_hollow_rect_mut(img, rect, MOUTH_COLOR);
    }

    for (x0, y0, x1, y1) in contour_boxes(&seg.gesture_mask) {
        if let Some(rect) = rect_of(mouth.x0 + x0, mouth.y0 + y0, mouth.x0 + x1, mouth.y0 + y1) {
            imageproc::drawing::draw_hollow_rect_mut(img, rect, CONTOUR_COLOR);
        }
    }

    if let Some(tip) = seg.centroid {
        draw_arrow(img, mouth.center(), tip);
        imageproc::drawing::draw_filled_circle_mut(img, tip, CENTER_DOT_RADIUS, ARROW_COLOR);
    }
}

fn draw_arrow(img: &mut RgbImage, from: (i32, i32), to: (i32, i32)) {
    let start = (from.0 as f32, from.1 as f32);
    let end = (to.0 as f32, to.1 as f32);
    imageproc::drawing::draw_line_segment_mut(img, start, end, ARROW_COLOR);

    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1.0 {
        return;
    }
    let (ux, uy) = (dx / len, dy / len);
    for side in [-1.0f32, 1.0] {
        // Barbs at 45 degrees back from the tip.
        let bx = end.0 - ARROW_HEAD_PX * (ux - side * uy) * std::f32::consts::FRAC_1_SQRT_2;
        let by = end.1 - ARROW_HEAD_PX * (uy + side * ux) * std::f32::consts::FRAC_1_SQRT_2;
        imageproc::drawing::draw_line_segment_mut(img, end, (bx, by), ARROW_COLOR);
    }
}

/// Half-open `[x0, x1) × [y0, y1)` as an imageproc rect, `None` if empty.
fn rect_of(x0: i32, y0: i32, x1: i32, y1: i32) -> Option<Rect> {
    (x1 > x0 && y1 > y0).then(|| Rect::at(x0, y0).of_size((x1 - x0) as u32, (y1 - y0) as u32))
}

/// Half-open bounding boxes of the outer contours whose area reaches
/// [`MIN_CONTOUR_AREA`].
fn contour_boxes(mask: &GrayImage) -> Vec<(i32, i32, i32, i32)> {
    imageproc::contours::find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter(|c| polygon_area(&c.points) >= MIN_CONTOUR_AREA)
        .filter_map(|c| {
            let xs = c.points.iter().map(|p| p.x);
            let ys = c.points.iter().map(|p| p.y);
            Some((xs.clone().min()?, ys.clone().min()?, xs.max()? + 1, ys.max()? + 1))
        })
        .collect()
}

/// Shoelace area of a closed polygon.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice.abs() as f64 / 2.0
}
