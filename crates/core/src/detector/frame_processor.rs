use std::time::Instant;

use image::RgbImage;

use crate::detection::domain::subject_locator::{Subject, SubjectLocator};
use crate::detector::overlay::OverlayRenderer;
use crate::detector::snapshot::PreviewImage;
use crate::detector::worker_logger::WorkerLogger;
use crate::gesture::domain::segmenter::{GestureReading, GestureSegmenter, Segmentation};
use crate::presence::domain::slot_assigner::assign_slots;
use crate::shared::frame::Frame;

/// Everything the worker publishes for one frame.
pub struct FrameOutcome {
    /// One entry per slot, left to right.
    pub assigned: Vec<Option<GestureReading>>,
    pub preview: PreviewImage,
    pub debug_frame: Option<RgbImage>,
}

/// One frame end to end: locate, segment, assign, render.
pub struct FrameProcessor {
    locator: SubjectLocator,
    segmenter: GestureSegmenter,
    overlay: OverlayRenderer,
    max_players: usize,
    keep_debug_frame: bool,
}

impl FrameProcessor {
    pub fn new(
        locator: SubjectLocator,
        segmenter: GestureSegmenter,
        overlay: OverlayRenderer,
        max_players: usize,
        keep_debug_frame: bool,
    ) -> Self {
        Self {
            locator,
            segmenter,
            overlay,
            max_players,
            keep_debug_frame,
        }
    }

    /// Fails only if the landmark model fails. A subject whose segmentation
    /// fails is skipped and takes no slot.
    pub fn process(
        &mut self,
        frame: &Frame,
        logger: &mut dyn WorkerLogger,
    ) -> Result<FrameOutcome, Box<dyn std::error::Error>> {
        let t0 = Instant::now();
        let subjects = self.locator.locate(frame)?;
        logger.timing("locate", t0.elapsed().as_secs_f64() * 1000.0);
        logger.subjects(subjects.len());

        let t1 = Instant::now();
        let mut segmented: Vec<(Subject, Segmentation)> = Vec::with_capacity(subjects.len());
        for subject in subjects {
            match self.segmenter.segment(frame, &subject) {
                Ok(seg) => segmented.push((subject, seg)),
                Err(e) => log::debug!("Frame {}: skipping subject: {e}", frame.index()),
            }
        }
        logger.timing("segment", t1.elapsed().as_secs_f64() * 1000.0);

        let slots = assign_slots(segmented, |(subject, _)| subject.center.0, self.max_players);
        let assigned = slots
            .iter()
            .map(|slot| slot.as_ref().map(|(_, seg)| seg.reading))
            .collect();

        let t2 = Instant::now();
        let annotated = self.overlay.annotate(frame, &slots);
        let preview = self.overlay.preview(&annotated);
        let debug_frame = self.keep_debug_frame.then_some(annotated);
        logger.timing("render", t2.elapsed().as_secs_f64() * 1000.0);

        Ok(FrameOutcome {
            assigned,
            preview,
            debug_frame,
        })
    }
}
