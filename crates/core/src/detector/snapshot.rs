use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use image::RgbImage;

use crate::detector::config::ChannelOrder;
use crate::gesture::domain::direction::Direction;
use crate::gesture::domain::segmenter::GestureReading;
use crate::presence::domain::slot_assigner::update_slots;
use crate::presence::domain::slot_state::SlotState;

/// Downscaled annotated frame, packed in `order`.
#[derive(Clone, Debug, PartialEq)]
pub struct PreviewImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
}

impl PreviewImage {
    pub fn from_rgb(image: RgbImage, order: ChannelOrder) -> Self {
        let (width, height) = image.dimensions();
        let mut pixels = image.into_raw();
        if order == ChannelOrder::Bgr {
            swap_red_blue(&mut pixels);
        }
        Self {
            pixels,
            width,
            height,
            order,
        }
    }

    /// RGB copy regardless of the stored order.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        let mut pixels = self.pixels.clone();
        if self.order == ChannelOrder::Bgr {
            swap_red_blue(&mut pixels);
        }
        RgbImage::from_raw(self.width, self.height, pixels)
    }
}

fn swap_red_blue(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
}

/// Everything the consumer can observe, written as one unit per frame.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    slots: Vec<SlotState>,
    preview: Option<PreviewImage>,
    debug_frame: Option<RgbImage>,
}

impl Snapshot {
    pub fn new(max_players: usize) -> Self {
        Self {
            slots: vec![SlotState::default(); max_players],
            preview: None,
            debug_frame: None,
        }
    }

    /// Replaces the per-frame fields. Edge bookkeeping owned by the
    /// consumer is left alone.
    pub fn publish(
        &mut self,
        assigned: &[Option<GestureReading>],
        preview: PreviewImage,
        debug_frame: Option<RgbImage>,
    ) {
        update_slots(&mut self.slots, assigned);
        self.preview = Some(preview);
        self.debug_frame = debug_frame;
    }

    /// Back to "nobody present": the worker has exited.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
        self.preview = None;
        self.debug_frame = None;
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn state(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(SlotState::current)
    }

    pub fn direction(&self, slot: usize) -> Option<Direction> {
        self.slots.get(slot).and_then(SlotState::direction)
    }

    pub fn consume_rising_edge(&mut self, slot: usize, now: Instant, debounce: Duration) -> bool {
        self.slots
            .get_mut(slot)
            .is_some_and(|s| s.consume_rising_edge(now, debounce))
    }

    pub fn preview(&self) -> Option<PreviewImage> {
        self.preview.clone()
    }

    pub fn debug_frame(&self) -> Option<RgbImage> {
        self.debug_frame.clone()
    }
}

/// The one lock shared by the worker and the consumer.
///
/// Accessors hold it only for the duration of the closure. A panic while
/// holding it does not make later accessors fail.
#[derive(Clone, Debug)]
pub struct SharedSnapshot(Arc<Mutex<Snapshot>>);

impl SharedSnapshot {
    pub fn new(max_players: usize) -> Self {
        Self(Arc::new(Mutex::new(Snapshot::new(max_players))))
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: Duration = Duration::from_millis(120);

    fn reading(direction: Direction) -> GestureReading {
        GestureReading {
            present: true,
            direction: Some(direction),
            openness: 20,
            fraction: 0.2,
        }
    }

    fn preview() -> PreviewImage {
        PreviewImage::from_rgb(RgbImage::new(4, 2), ChannelOrder::Rgb)
    }

    #[test]
    fn test_new_snapshot_is_empty() {
        let snapshot = Snapshot::new(2);
        assert_eq!(snapshot.slot_count(), 2);
        assert!(!snapshot.state(0));
        assert!(snapshot.preview().is_none());
        assert!(snapshot.debug_frame().is_none());
    }

    #[test]
    fn test_publish_updates_all_slots_at_once() {
        let mut snapshot = Snapshot::new(2);

        snapshot.publish(&[Some(reading(Direction::Up)), Some(reading(Direction::Left))], preview(), None);

        assert!(snapshot.state(0) && snapshot.state(1));
        assert_eq!(snapshot.direction(0), Some(Direction::Up));
        assert_eq!(snapshot.direction(1), Some(Direction::Left));
        assert!(snapshot.preview().is_some());
    }

    #[test]
    fn test_out_of_range_slot_is_inert() {
        let mut snapshot = Snapshot::new(1);
        snapshot.publish(&[Some(reading(Direction::Up))], preview(), None);

        assert!(!snapshot.state(5));
        assert_eq!(snapshot.direction(5), None);
        assert!(!snapshot.consume_rising_edge(5, Instant::now(), DEBOUNCE));
    }

    #[test]
    fn test_publish_keeps_edge_bookkeeping() {
        let mut snapshot = Snapshot::new(1);
        let now = Instant::now();
        snapshot.publish(&[Some(reading(Direction::Center))], preview(), None);
        assert!(snapshot.consume_rising_edge(0, now, DEBOUNCE));

        // Still on in the next frame: no second edge.
        snapshot.publish(&[Some(reading(Direction::Center))], preview(), None);
        assert!(!snapshot.consume_rising_edge(0, now + DEBOUNCE, DEBOUNCE));
    }

    #[test]
    fn test_clear_drops_presence_and_images() {
        let mut snapshot = Snapshot::new(2);
        snapshot.publish(&[Some(reading(Direction::Down)), None], preview(), Some(RgbImage::new(8, 8)));

        snapshot.clear();

        assert!(!snapshot.state(0));
        assert_eq!(snapshot.direction(0), None);
        assert!(snapshot.preview().is_none());
        assert!(snapshot.debug_frame().is_none());
    }

    #[test]
    fn test_preview_bgr_swaps_and_restores() {
        let mut img = RgbImage::new(1, 1);
        img.put_pixel(0, 0, image::Rgb([10, 20, 30]));

        let preview = PreviewImage::from_rgb(img.clone(), ChannelOrder::Bgr);

        assert_eq!(preview.pixels, vec![30, 20, 10]);
        assert_eq!(preview.to_rgb_image().unwrap(), img);
    }

    #[test]
    fn test_shared_snapshot_survives_poisoning() {
        let shared = SharedSnapshot::new(1);
        let clone = shared.clone();
        let _ = std::thread::spawn(move || {
            clone.with(|_| panic!("worker panicked while publishing"));
        })
        .join();

        assert!(!shared.with(|s| s.state(0)));
    }
}
