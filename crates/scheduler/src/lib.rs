use std::time::Instant;

use renderer::{Gpu, RenderError, RenderSurface, StyleConfig, ViewportState};

mod clock;
mod pacer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use pacer::{FramePacer, FRAME_RATE_CAP};

#[derive(Debug, thiserror::Error)]
pub enum AnimationError {
    #[error("animation has been disposed")]
    Disposed,
    #[error("invalid size: {0}")]
    InvalidSize(String),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Lifecycle of an [`AnimationController`]. `Disposed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationState {
    Created,
    Running,
    Paused,
    Disposed,
}

/// Frame registration handed to the host's display-refresh callback.
///
/// Only the most recently issued token is honoured; pausing or disposing
/// invalidates it immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(u64);

impl FrameToken {
    pub fn id(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// Tick admitted; a frame was drawn at `time` seconds.
    Drawn { time: f32 },
    /// Tick arrived before the pacing interval elapsed.
    Dropped,
    /// Token was cancelled or superseded.
    Stale,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub admitted: u64,
    pub dropped: u64,
}

/// Run/pause/dispose state machine plus the paced frame loop.
pub struct AnimationController<G: Gpu> {
    surface: RenderSurface<G>,
    style: StyleConfig,
    logical_size: (f64, f64),
    ratio: f64,
    state: AnimationState,
    pacer: FramePacer,
    started_at: Option<Instant>,
    registration: Option<FrameToken>,
    next_token: u64,
    stats: FrameStats,
}

impl<G: Gpu> AnimationController<G> {
    pub fn new(
        surface: RenderSurface<G>,
        style: StyleConfig,
        width: f64,
        height: f64,
        ratio: f64,
    ) -> Result<Self, AnimationError> {
        validate_size(width, height, Some(ratio))?;
        Ok(Self {
            surface,
            style,
            logical_size: (width, height),
            ratio,
            state: AnimationState::Created,
            pacer: FramePacer::default(),
            started_at: None,
            registration: None,
            next_token: 0,
            stats: FrameStats::default(),
        })
    }

    /// Configures the surface, draws at t = 0 and registers for frames.
    ///
    /// A no-op while running. Restarting after `pause` resets the time base.
    pub fn start(&mut self, now: Instant) -> Result<(), AnimationError> {
        match self.state {
            AnimationState::Disposed => return Err(AnimationError::Disposed),
            AnimationState::Running => return Ok(()),
            AnimationState::Created | AnimationState::Paused => {}
        }

        let previous = (self.state, self.started_at);
        self.state = AnimationState::Running;
        self.started_at = Some(now);

        if let Err(err) = self.configure_and_draw(0.0) {
            (self.state, self.started_at) = previous;
            self.registration = None;
            tracing::error!(error = %err, "failed to start border animation");
            return Err(err);
        }

        self.pacer.mark(now);
        self.register();
        tracing::info!(
            width = self.logical_size.0,
            height = self.logical_size.1,
            ratio = self.ratio,
            "border animation started"
        );
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), AnimationError> {
        if self.state == AnimationState::Disposed {
            return Err(AnimationError::Disposed);
        }
        self.registration = None;
        if self.state == AnimationState::Running {
            self.state = AnimationState::Paused;
            tracing::info!(stats = ?self.stats, "border animation paused");
        }
        Ok(())
    }

    /// Stores a new logical size (and optionally ratio).
    ///
    /// While running the surface is reconfigured and redrawn synchronously;
    /// otherwise no GPU work happens until the next `start`.
    pub fn resize(
        &mut self,
        width: f64,
        height: f64,
        ratio: Option<f64>,
        now: Instant,
    ) -> Result<(), AnimationError> {
        if self.state == AnimationState::Disposed {
            return Err(AnimationError::Disposed);
        }
        validate_size(width, height, ratio)?;

        self.logical_size = (width, height);
        if let Some(ratio) = ratio {
            self.ratio = ratio;
        }
        if self.state != AnimationState::Running {
            tracing::debug!(width, height, "stored size while not running");
            return Ok(());
        }

        let time = self.elapsed(now);
        self.configure_and_draw(time)?;
        self.pacer.mark(now);
        Ok(())
    }

    /// Host display-refresh callback for `token`.
    pub fn on_frame(
        &mut self,
        token: FrameToken,
        now: Instant,
    ) -> Result<FrameOutcome, AnimationError> {
        if self.state == AnimationState::Disposed {
            return Err(AnimationError::Disposed);
        }
        if self.registration != Some(token) {
            tracing::trace!(token = token.id(), "ignoring stale frame token");
            return Ok(FrameOutcome::Stale);
        }

        self.register();
        if !self.pacer.should_render(now) {
            self.stats.dropped += 1;
            return Ok(FrameOutcome::Dropped);
        }

        let time = self.elapsed(now);
        self.surface.draw_frame(time)?;
        self.stats.admitted += 1;
        Ok(FrameOutcome::Drawn { time })
    }

    /// Token the host should deliver with its next refresh, if registered.
    pub fn pending_frame(&self) -> Option<FrameToken> {
        self.registration
    }

    /// Draws one frame at an explicit time without touching the pacer.
    pub fn redraw_at(&mut self, time: f32) -> Result<(), AnimationError> {
        if self.state == AnimationState::Disposed {
            return Err(AnimationError::Disposed);
        }
        self.surface.draw_frame(time)?;
        Ok(())
    }

    pub fn dispose(&mut self) -> Result<(), AnimationError> {
        if self.state == AnimationState::Disposed {
            return Err(AnimationError::Disposed);
        }
        self.registration = None;
        self.state = AnimationState::Disposed;
        self.surface.dispose()?;
        tracing::info!(stats = ?self.stats, "border animation disposed");
        Ok(())
    }

    /// Seconds since the current run started, or 0 before the first start.
    pub fn elapsed(&self, now: Instant) -> f32 {
        self.started_at
            .map(|started| now.saturating_duration_since(started).as_secs_f32())
            .unwrap_or(0.0)
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn style(&self) -> &StyleConfig {
        &self.style
    }

    pub fn logical_size(&self) -> (f64, f64) {
        self.logical_size
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Viewport of the last successful configure.
    pub fn viewport(&self) -> Option<ViewportState> {
        self.surface.viewport()
    }

    pub fn surface(&self) -> &RenderSurface<G> {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut RenderSurface<G> {
        &mut self.surface
    }

    fn configure_and_draw(&mut self, time: f32) -> Result<(), AnimationError> {
        let (width, height) = self.logical_size;
        let viewport = ViewportState::from_logical(width, height, self.ratio)?;
        self.surface.configure(&viewport, &self.style)?;
        self.surface.draw_frame(time)?;
        Ok(())
    }

    fn register(&mut self) {
        self.next_token += 1;
        self.registration = Some(FrameToken(self.next_token));
    }
}

fn validate_size(width: f64, height: f64, ratio: Option<f64>) -> Result<(), AnimationError> {
    for (name, value) in [("width", width), ("height", height)] {
        if !value.is_finite() || value < 0.0 {
            return Err(AnimationError::InvalidSize(format!(
                "{name} must be finite and non-negative (got {value})"
            )));
        }
    }
    if let Some(ratio) = ratio {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(AnimationError::InvalidSize(format!(
                "device pixel ratio must be finite and positive (got {ratio})"
            )));
        }
    }
    Ok(())
}
