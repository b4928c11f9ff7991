use std::time::{Duration, Instant};

/// Display-rate ceiling for the border animation.
pub const FRAME_RATE_CAP: f64 = 32.0;

/// Admits at most one tick per target interval.
///
/// The interval is measured from the last admitted tick, so dropped ticks
/// never shift the cadence.
#[derive(Debug, Clone)]
pub struct FramePacer {
    target_interval: Duration,
    last_tick: Option<Instant>,
}

impl FramePacer {
    pub fn new(target_fps: f64) -> Self {
        let target_interval = if target_fps.is_finite() && target_fps > 0.0 {
            Duration::from_secs_f64(1.0 / target_fps)
        } else {
            Duration::ZERO
        };
        Self {
            target_interval,
            last_tick: None,
        }
    }

    pub fn target_interval(&self) -> Duration {
        self.target_interval
    }

    /// Records a draw that happened outside the paced loop.
    pub fn mark(&mut self, now: Instant) {
        self.last_tick = Some(now);
    }

    pub fn should_render(&mut self, now: Instant) -> bool {
        match self.last_tick {
            Some(last) if now.saturating_duration_since(last) < self.target_interval => false,
            _ => {
                self.last_tick = Some(now);
                true
            }
        }
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new(FRAME_RATE_CAP)
    }
}
