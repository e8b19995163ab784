//! `FadeEnvelope`: time-based gain ramp evaluated once per mixing block.
//!
//! The envelope is sampled against the mixer clock, so its resolution is one
//! block; the gain moves linearly from `start_gain` to `target_gain`.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FadeStep {
    /// Fade still running; apply this gain.
    Gain(f64),
    /// Fade finished; snap to the target gain and clear the fade.
    Done(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeEnvelope {
    pub start_gain: f64,
    pub target_gain: f64,
    /// Clock time (seconds) the fade was scheduled at.
    pub start_time: f64,
    /// Fade length in seconds.
    pub duration: f64,
}

impl FadeEnvelope {
    pub fn new(start_gain: f64, target_gain: f64, start_time: f64, duration: f64) -> Self {
        Self {
            start_gain,
            target_gain,
            start_time,
            duration,
        }
    }

    /// Rising fades are informational only; the gain math is symmetric.
    pub fn is_fade_in(&self) -> bool {
        self.target_gain > self.start_gain
    }

    pub fn gain_at(&self, now: f64) -> FadeStep {
        if self.duration.is_nan() || self.duration <= 0.0 {
            return FadeStep::Done(self.target_gain);
        }

        // Effective time mapped onto [-1, 1].
        let teff = 2.0 * (now - self.start_time) / self.duration - 1.0;
        if teff >= 1.0 {
            return FadeStep::Done(self.target_gain);
        }

        let teff = teff.max(-1.0);
        let gain = (self.start_gain - self.target_gain) * 0.5 * (1.0 - teff) + self.target_gain;
        FadeStep::Gain(gain)
    }
}
