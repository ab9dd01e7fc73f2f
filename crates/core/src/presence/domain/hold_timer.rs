use std::time::Duration;

/// Counts how long a condition has held without interruption.
///
/// Any frame where the condition is false resets the count. Completion is
/// reported once per hold; call [`HoldTimer::reset`] to arm it again.
#[derive(Clone, Debug, PartialEq)]
pub struct HoldTimer {
    target: Duration,
    held: Duration,
    fired: bool,
}

impl HoldTimer {
    pub fn new(target: Duration) -> Self {
        Self {
            target,
            held: Duration::ZERO,
            fired: false,
        }
    }

    /// Advances by `dt`. Returns true on the update that reaches the target.
    pub fn update(&mut self, active: bool, dt: Duration) -> bool {
        if !active {
            self.held = Duration::ZERO;
            self.fired = false;
            return false;
        }
        self.held = (self.held + dt).min(self.target);
        if self.held >= self.target && !self.fired {
            self.fired = true;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.held = Duration::ZERO;
        self.fired = false;
    }

    /// Fraction of the target held so far, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.target.is_zero() {
            return if self.fired { 1.0 } else { 0.0 };
        }
        self.held.as_secs_f64() / self.target.as_secs_f64()
    }

    pub fn remaining(&self) -> Duration {
        self.target.saturating_sub(self.held)
    }

    pub fn target(&self) -> Duration {
        self.target
    }
}
