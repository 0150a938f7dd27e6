//! Signal presence detection with hysteresis.
//!
//! Thresholds are on the frame's peak amplitude and were tuned on 16-bit
//! input, hence the `/ 32768` scaling to full-scale floats.

/// Peak level above which a signal is considered present.
pub const SIGNAL_THRESHOLD_ON: f32 = 100.0 / 32768.0;

/// Peak level below which a present signal is considered gone.
pub const SIGNAL_THRESHOLD_OFF: f32 = 20.0 / 32768.0;

#[derive(Debug, Default)]
pub struct SignalPresence {
    /// `None` until the first frame has been seen.
    present: Option<bool>,
}

impl SignalPresence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_present(&self) -> bool {
        self.present.unwrap_or(false)
    }

    /// Feeds one frame.
    ///
    /// # Returns
    /// * `Some(state)` when the state changed, and always for the first frame
    /// * `None` otherwise
    pub fn update(&mut self, frame: &[f32]) -> Option<bool> {
        let peak = frame.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        let next = match self.present {
            Some(true) => peak >= SIGNAL_THRESHOLD_OFF,
            _ => peak > SIGNAL_THRESHOLD_ON,
        };
        let changed = self.present != Some(next);
        self.present = Some(next);
        changed.then_some(next)
    }
}
