use std::collections::BTreeMap;
use std::time::Instant;

/// Where the detector worker reports its per-frame telemetry.
pub trait WorkerLogger: Send {
    /// Called after each published frame with the running total.
    fn frame(&mut self, count: usize);

    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Faces located in the current frame.
    fn subjects(&mut self, count: usize);

    /// Called once when the worker exits.
    fn summary(&self) {}
}

pub struct NullWorkerLogger;

impl WorkerLogger for NullWorkerLogger {
    fn frame(&mut self, _count: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn subjects(&mut self, _count: usize) {}
}

/// Running mean and peak of one stage. Constant size however long the
/// detector runs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StageStats {
    pub samples: usize,
    pub total_ms: f64,
    pub max_ms: f64,
}

impl StageStats {
    fn record(&mut self, ms: f64) {
        self.samples += 1;
        self.total_ms += ms;
        self.max_ms = self.max_ms.max(ms);
    }

    pub fn mean_ms(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.total_ms / self.samples as f64
        }
    }
}

/// Reports fps through `log` at debug level every `every_frames` frames,
/// and a stage breakdown at info level on exit.
pub struct LogWorkerLogger {
    every_frames: usize,
    stages: BTreeMap<String, StageStats>,
    subject_frames: usize,
    subject_total: usize,
    started: Instant,
    frames: usize,
}

impl LogWorkerLogger {
    pub fn new(every_frames: usize) -> Self {
        Self {
            every_frames: every_frames.max(1),
            stages: BTreeMap::new(),
            subject_frames: 0,
            subject_total: 0,
            started: Instant::now(),
            frames: 0,
        }
    }

    pub fn stage(&self, name: &str) -> Option<StageStats> {
        self.stages.get(name).copied()
    }

    /// Average faces per processed frame.
    pub fn mean_subjects(&self) -> Option<f64> {
        (self.subject_frames > 0).then(|| self.subject_total as f64 / self.subject_frames as f64)
    }

    fn fps(&self) -> Option<f64> {
        let secs = self.started.elapsed().as_secs_f64();
        (self.frames > 0 && secs > 0.0).then(|| self.frames as f64 / secs)
    }

    /// Exit report, or `None` before the first frame.
    pub fn report(&self) -> Option<String> {
        if self.stages.is_empty() {
            return None;
        }
        let mut out = format!("Gesture detector stopped after {} frames", self.frames);
        if let Some(fps) = self.fps() {
            out.push_str(&format!(" at {fps:.1} fps"));
        }
        for (name, stats) in &self.stages {
            out.push_str(&format!(
                "\n  {name}: {:.1} ms mean, {:.1} ms peak",
                stats.mean_ms(),
                stats.max_ms
            ));
        }
        if let Some(mean) = self.mean_subjects() {
            out.push_str(&format!("\n  faces per frame: {mean:.2}"));
        }
        Some(out)
    }
}

impl Default for LogWorkerLogger {
    fn default() -> Self {
        Self::new(300)
    }
}

impl WorkerLogger for LogWorkerLogger {
    fn frame(&mut self, count: usize) {
        self.frames = count;
        if count % self.every_frames == 0 {
            if let Some(fps) = self.fps() {
                log::debug!("Gesture detector at {fps:.1} fps ({count} frames)");
            }
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        match self.stages.get_mut(stage) {
            Some(stats) => stats.record(duration_ms),
            None => {
                let mut stats = StageStats::default();
                stats.record(duration_ms);
                self.stages.insert(stage.to_owned(), stats);
            }
        }
    }

    fn subjects(&mut self, count: usize) {
        self.subject_frames += 1;
        self.subject_total += count;
    }

    fn summary(&self) {
        if let Some(report) = self.report() {
            log::info!("{report}");
        }
    }
}
