use std::time::{Duration, Instant};

/// Timing function applied to a transition's linear progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
}

impl Easing {
    pub fn sample(self, t: f32) -> f32 {
        let clamped = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => clamped,
            Easing::EaseIn => clamped * clamped,
            Easing::EaseOut => 1.0 - (1.0 - clamped) * (1.0 - clamped),
        }
    }
}

pub(crate) struct FadeEnvelope {
    start: Instant,
    duration: Duration,
    easing: Easing,
}

impl FadeEnvelope {
    pub fn new(duration: Duration, easing: Easing, now: Instant) -> Self {
        Self {
            start: now,
            duration,
            easing,
        }
    }

    /// Eased progress in [0, 1] and whether the envelope has run out.
    pub fn progress(&self, now: Instant) -> (f32, bool) {
        let elapsed = now.saturating_duration_since(self.start);
        if elapsed >= self.duration {
            return (self.easing.sample(1.0), true);
        }
        let linear = elapsed.as_secs_f32() / self.duration.as_secs_f32().max(f32::EPSILON);
        (self.easing.sample(linear), false)
    }
}
