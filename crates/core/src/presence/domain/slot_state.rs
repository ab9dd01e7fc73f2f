use std::time::{Duration, Instant};

use crate::gesture::domain::direction::Direction;
use crate::gesture::domain::segmenter::GestureReading;

/// Presence of one player slot, with edge bookkeeping for the consumer.
///
/// `current` follows the latest reading with no smoothing. Rising edges are
/// consumed live: a caller that stops polling does not queue edges up.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SlotState {
    current: bool,
    previous_for_edge: bool,
    last_edge_time: Option<Instant>,
    direction: Option<Direction>,
}

impl SlotState {
    pub fn current(&self) -> bool {
        self.current
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn last_edge_time(&self) -> Option<Instant> {
        self.last_edge_time
    }

    /// Takes this frame's reading for the subject bound to the slot.
    pub fn observe(&mut self, reading: &GestureReading) {
        self.current = reading.present;
        self.direction = reading.direction;
    }

    /// No subject is bound to the slot this frame.
    pub fn clear(&mut self) {
        self.current = false;
        self.direction = None;
    }

    /// One-shot debounced rising edge.
    ///
    /// True iff the slot is on, was off at the previous poll, and at least
    /// `debounce` has passed since the last reported edge. Every poll records
    /// the observed value, so an edge suppressed by the debounce is dropped
    /// rather than reported later.
    pub fn consume_rising_edge(&mut self, now: Instant, debounce: Duration) -> bool {
        let rising = self.current && !self.previous_for_edge;
        let settled = self
            .last_edge_time
            .map_or(true, |last| now.saturating_duration_since(last) >= debounce);
        self.previous_for_edge = self.current;

        if rising && settled {
            self.last_edge_time = Some(now);
            true
        } else {
            false
        }
    }
}
