//! Animated glowing border overlay.
//!
//! [`Motion`] is the host-facing handle. It resolves [`MotionOptions`], owns a
//! [`RenderSurface`] through an [`AnimationController`], and keeps a
//! [`Canvas`] description in sync for the host to present:
//!
//! ```text
//!   host refresh ──▶ Motion::on_frame(token, now)
//!                      ├─▶ pending auto-resize ──▶ controller.resize()
//!                      ├─▶ fade transition ──▶ canvas opacity/scale
//!                      └─▶ controller.on_frame() ──▶ draw_frame(t) at ≤ 32 Hz
//! ```
//!
//! Everything runs on the caller's thread. Only [`ResizeNotifier`] and
//! [`FadeCompletion`] may cross threads.

use std::time::Instant;

pub use config::{ConfigError, ModeSetting, MotionOptions, ResolvedOptions, RgbColor};
pub use renderer::{ColorMode, Gpu, RecordingGpu, RenderError, WgpuGpu, WgpuOptions};
pub use scheduler::{
    AnimationController, AnimationError, AnimationState, Clock, FrameOutcome, FrameStats,
    FrameToken, ManualClock, SystemClock,
};

use renderer::{RenderSurface, ShaderSources};

mod canvas;
mod fade;
mod observer;
mod timeline;

pub use canvas::Canvas;
pub use fade::{FadeCanceled, FadeCompletion, FadeDirection, Keyframe, FADE_DURATION};
pub use observer::{resize_channel, ResizeNotifier, ResizeSubscription};
pub use timeline::Easing;

use fade::Transition;

#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    #[error("motion instance has been disposed")]
    Disposed,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Animation(AnimationError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl From<AnimationError> for MotionError {
    fn from(err: AnimationError) -> Self {
        match err {
            AnimationError::Disposed => MotionError::Disposed,
            AnimationError::Render(render) => MotionError::Render(render),
            other => MotionError::Animation(other),
        }
    }
}

/// A glowing border bound to one canvas.
pub struct Motion<G: Gpu = WgpuGpu, C: Clock = SystemClock> {
    controller: AnimationController<G>,
    canvas: Canvas,
    clock: C,
    transition: Option<Transition>,
    resize_subscription: Option<ResizeSubscription>,
    disposed: bool,
}

impl Motion {
    /// Creates a motion rendering through a headless `wgpu` device.
    pub fn new(options: &MotionOptions) -> Result<Self, MotionError> {
        let gpu = WgpuGpu::new(WgpuOptions::default())?;
        tracing::info!(adapter = gpu.adapter_name(), "using GPU adapter");
        Self::with_gpu(gpu, options, SystemClock, None)
    }
}

impl<G: Gpu, C: Clock> Motion<G, C> {
    /// Creates a motion on an existing backend and clock.
    ///
    /// `host_ratio` is the host's device pixel ratio, used when the options
    /// do not set one.
    pub fn with_gpu(
        gpu: G,
        options: &MotionOptions,
        clock: C,
        host_ratio: Option<f64>,
    ) -> Result<Self, MotionError> {
        let resolved = options.resolve(host_ratio)?;
        let surface = RenderSurface::new(gpu, &ShaderSources::bundled())?;
        let canvas = Canvas::new(resolved.class_names.clone(), &resolved.styles);
        let controller = AnimationController::new(
            surface,
            resolved.style.clone(),
            resolved.width,
            resolved.height,
            resolved.ratio,
        )?;

        tracing::debug!(
            width = resolved.width,
            height = resolved.height,
            ratio = resolved.ratio,
            mode = %resolved.style.mode(),
            "created motion"
        );
        Ok(Self {
            controller,
            canvas,
            clock,
            transition: None,
            resize_subscription: None,
            disposed: false,
        })
    }

    pub fn start(&mut self) -> Result<(), MotionError> {
        self.ensure_live()?;
        self.controller.start(self.clock.now())?;
        self.sync_canvas();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), MotionError> {
        self.ensure_live()?;
        self.controller.pause()?;
        Ok(())
    }

    /// Sets a new logical size, and optionally a new device pixel ratio.
    ///
    /// Takes effect immediately while running, otherwise at the next start.
    pub fn resize(
        &mut self,
        width: f64,
        height: f64,
        ratio: Option<f64>,
    ) -> Result<(), MotionError> {
        self.ensure_live()?;
        let now = self.clock.now();
        self.resize_at(width, height, ratio, now)
    }

    /// Follows host size changes delivered through `subscription`.
    ///
    /// Replaces any previous subscription.
    pub fn auto_resize(&mut self, subscription: ResizeSubscription) -> Result<(), MotionError> {
        self.ensure_live()?;
        if self.resize_subscription.replace(subscription).is_some() {
            tracing::debug!("replaced resize subscription");
        }
        Ok(())
    }

    pub fn fade_in(&mut self) -> Result<FadeCompletion, MotionError> {
        self.fade(FadeDirection::In)
    }

    pub fn fade_out(&mut self) -> Result<FadeCompletion, MotionError> {
        self.fade(FadeDirection::Out)
    }

    /// Rejects the running fade, if any, keeping the current presentation.
    pub fn cancel_fades(&mut self) -> Result<(), MotionError> {
        self.ensure_live()?;
        self.cancel_transition();
        Ok(())
    }

    fn cancel_transition(&mut self) {
        if let Some(transition) = self.transition.take() {
            tracing::debug!(direction = ?transition.direction(), "fade canceled");
            transition.cancel();
        }
    }

    /// Host display-refresh callback.
    pub fn on_frame(
        &mut self,
        token: FrameToken,
        now: Instant,
    ) -> Result<FrameOutcome, MotionError> {
        self.ensure_live()?;
        self.apply_pending_resize(now)?;
        self.advance_presentation(now);
        Ok(self.controller.on_frame(token, now)?)
    }

    /// Applies pending resizes and advances fades without drawing.
    ///
    /// For hosts that keep polling while the animation is paused.
    pub fn poll_host(&mut self) -> Result<(), MotionError> {
        self.ensure_live()?;
        let now = self.clock.now();
        self.apply_pending_resize(now)?;
        self.advance_presentation(now);
        Ok(())
    }

    pub fn dispose(&mut self) -> Result<(), MotionError> {
        self.ensure_live()?;
        self.cancel_transition();
        self.resize_subscription = None;
        self.disposed = true;
        self.canvas.detach();
        self.controller.dispose()?;
        Ok(())
    }

    /// Token the host should deliver with its next refresh.
    pub fn pending_frame(&self) -> Option<FrameToken> {
        self.controller.pending_frame()
    }

    pub fn state(&self) -> AnimationState {
        self.controller.state()
    }

    pub fn stats(&self) -> FrameStats {
        self.controller.stats()
    }

    /// Direction of the fade in progress.
    pub fn active_fade(&self) -> Option<FadeDirection> {
        self.transition.as_ref().map(Transition::direction)
    }

    pub fn element(&self) -> &Canvas {
        &self.canvas
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn controller(&self) -> &AnimationController<G> {
        &self.controller
    }

    /// Draws one frame at `time` seconds, for still exports.
    pub fn redraw_at(&mut self, time: f32) -> Result<(), MotionError> {
        self.ensure_live()?;
        self.controller.redraw_at(time)?;
        Ok(())
    }

    pub fn gpu(&self) -> &G {
        self.controller.surface().gpu()
    }

    pub fn gpu_mut(&mut self) -> &mut G {
        self.controller.surface_mut().gpu_mut()
    }

    fn fade(&mut self, direction: FadeDirection) -> Result<FadeCompletion, MotionError> {
        self.ensure_live()?;
        self.cancel_transition();
        let (transition, completion) = Transition::start(direction, self.clock.now());
        self.canvas.present(transition.initial());
        self.transition = Some(transition);
        tracing::debug!(?direction, "fade started");
        Ok(completion)
    }

    fn advance_presentation(&mut self, now: Instant) {
        let Some(transition) = self.transition.as_ref() else {
            return;
        };
        let (keyframe, finished) = transition.sample(now);
        self.canvas.present(keyframe);
        if finished {
            if let Some(transition) = self.transition.take() {
                tracing::debug!(direction = ?transition.direction(), "fade finished");
                transition.finish();
            }
        }
    }

    fn resize_at(
        &mut self,
        width: f64,
        height: f64,
        ratio: Option<f64>,
        now: Instant,
    ) -> Result<(), MotionError> {
        self.controller.resize(width, height, ratio, now)?;
        self.sync_canvas();
        Ok(())
    }

    /// Applies the latest host size, timed by the tick that delivers it.
    fn apply_pending_resize(&mut self, now: Instant) -> Result<(), MotionError> {
        let latest = self
            .resize_subscription
            .as_ref()
            .and_then(ResizeSubscription::latest);
        if let Some((width, height)) = latest {
            tracing::debug!(width, height, "host element resized");
            self.resize_at(width, height, None, now)?;
        }
        Ok(())
    }

    fn sync_canvas(&mut self) {
        if self.controller.state() != AnimationState::Running {
            return;
        }
        if let Some(viewport) = self.controller.viewport() {
            self.canvas.set_size(
                self.controller.logical_size(),
                (viewport.pixel_width, viewport.pixel_height),
            );
        }
    }

    fn ensure_live(&self) -> Result<(), MotionError> {
        if self.disposed {
            Err(MotionError::Disposed)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;

    fn motion(options: &MotionOptions) -> Motion<RecordingGpu, ManualClock> {
        Motion::with_gpu(RecordingGpu::new(), options, ManualClock::new(), None).unwrap()
    }

    fn sized(width: f64, height: f64) -> MotionOptions {
        MotionOptions {
            width: Some(width),
            height: Some(height),
            ..MotionOptions::default()
        }
    }

    #[test]
    fn canvas_reflects_options_before_start() {
        let mut styles = BTreeMap::new();
        styles.insert("pointer-events".to_string(), "auto".to_string());
        let options = MotionOptions {
            class_names: vec!["frame".to_string()],
            styles,
            ..MotionOptions::default()
        };
        let motion = motion(&options);
        let canvas = motion.element();
        assert_eq!(canvas.style("pointer-events"), Some("none"));
        assert_eq!(canvas.class_names(), ["frame".to_string()]);
        assert_eq!(canvas.css_size(), None);
        assert!(canvas.is_attached());
        assert_eq!(motion.state(), AnimationState::Created);
    }

    #[test]
    fn start_sizes_canvas_with_host_ratio() {
        let mut motion = Motion::with_gpu(
            RecordingGpu::new(),
            &sized(300.0, 200.0),
            ManualClock::new(),
            Some(2.0),
        )
        .unwrap();
        motion.start().unwrap();
        assert_eq!(motion.element().css_size(), Some((300.0, 200.0)));
        assert_eq!(motion.element().backing_size(), Some((600, 400)));
        assert_eq!(motion.gpu().drawing_buffer_size(), (600, 400));
        assert_eq!(motion.element().style("width"), Some("300px"));
    }

    #[test]
    fn resize_after_start_collapses_inner_rect() {
        let options = MotionOptions {
            border_width: Some(8.0),
            glow_width: Some(200.0),
            ..sized(600.0, 600.0)
        };
        let mut motion = motion(&options);
        motion.start().unwrap();
        motion.resize(300.0, 150.0, Some(2.0)).unwrap();

        assert_eq!(motion.element().backing_size(), Some((600, 300)));
        let insets = motion
            .controller()
            .surface()
            .mesh()
            .unwrap()
            .insets();
        assert_eq!(insets.inset_y, 150.0);
        assert_eq!(insets.inner_top, insets.inner_bottom);
    }

    #[test]
    fn resize_before_start_makes_no_gpu_calls() {
        let mut motion = motion(&MotionOptions::default());
        motion.gpu_mut().clear_calls();
        motion.resize(320.0, 240.0, None).unwrap();
        assert_eq!(motion.gpu().call_count(), 0);
        assert_eq!(motion.element().css_size(), None);

        motion.start().unwrap();
        assert_eq!(motion.element().css_size(), Some((320.0, 240.0)));
    }

    #[test]
    fn frames_are_paced_through_the_facade() {
        let mut motion = motion(&sized(100.0, 100.0));
        motion.start().unwrap();
        let clock = motion.clock().clone();
        for _ in 0..125 {
            clock.advance(Duration::from_millis(8));
            let token = motion.pending_frame().unwrap();
            motion.on_frame(token, clock.now()).unwrap();
        }
        let draws = motion.gpu().draw_count();
        assert!((31..=33).contains(&draws), "{draws} draws");
    }

    #[test]
    fn fade_in_completes_after_duration() {
        let mut motion = motion(&MotionOptions::default());
        let clock = motion.clock().clone();
        let mut completion = motion.fade_in().unwrap();
        assert_eq!(motion.element().opacity(), 0.0);
        assert_eq!(motion.element().scale(), 1.2);

        clock.advance(Duration::from_millis(150));
        motion.poll_host().unwrap();
        assert!(motion.element().opacity() > 0.5);
        assert_eq!(completion.try_result(), None);

        clock.advance(Duration::from_millis(150));
        motion.poll_host().unwrap();
        assert_eq!(completion.try_result(), Some(Ok(())));
        assert_eq!(motion.element().opacity(), 1.0);
        assert_eq!(motion.element().scale(), 1.0);
        assert_eq!(motion.active_fade(), None);
    }

    #[test]
    fn fade_out_fills_forwards_while_paused() {
        let mut motion = motion(&MotionOptions::default());
        motion.start().unwrap();
        motion.pause().unwrap();
        let clock = motion.clock().clone();
        let completion = motion.fade_out().unwrap();
        clock.advance(Duration::from_millis(400));
        motion.poll_host().unwrap();
        assert_eq!(completion.wait(), Ok(()));
        assert_eq!(motion.element().opacity(), 0.0);
        assert_eq!(motion.element().scale(), 1.2);
    }

    #[test]
    fn new_fade_cancels_previous() {
        let mut motion = motion(&MotionOptions::default());
        let first = motion.fade_in().unwrap();
        let mut second = motion.fade_out().unwrap();
        assert_eq!(first.wait(), Err(FadeCanceled));
        assert!(!second.is_settled());
        assert_eq!(motion.active_fade(), Some(FadeDirection::Out));

        motion.cancel_fades().unwrap();
        assert!(second.is_settled());
        assert_eq!(second.try_result(), Some(Err(FadeCanceled)));
        assert_eq!(motion.active_fade(), None);
    }

    #[test]
    fn auto_resize_applies_latest_size_on_next_frame() {
        let mut motion = motion(&sized(600.0, 600.0));
        motion.start().unwrap();
        let (notifier, subscription) = resize_channel();
        motion.auto_resize(subscription).unwrap();

        notifier.notify(100.0, 50.0);
        notifier.notify(200.0, 100.0);
        let clock = motion.clock().clone();
        clock.advance(Duration::from_millis(5));
        let token = motion.pending_frame().unwrap();
        motion.on_frame(token, clock.now()).unwrap();

        assert_eq!(motion.element().css_size(), Some((200.0, 100.0)));
        assert_eq!(motion.gpu().drawing_buffer_size(), (200, 100));
    }

    #[test]
    fn auto_resize_uses_the_host_tick_time() {
        let mut motion = motion(&sized(600.0, 600.0));
        motion.start().unwrap();
        let (notifier, subscription) = resize_channel();
        motion.auto_resize(subscription).unwrap();
        notifier.notify(300.0, 300.0);

        // Host time runs ahead of the motion's own clock.
        let host_now = motion.clock().now() + Duration::from_millis(100);
        let token = motion.pending_frame().unwrap();
        let outcome = motion.on_frame(token, host_now).unwrap();

        let draws = motion.gpu().draws();
        let resize_draw = draws.last().unwrap();
        assert_eq!(resize_draw.drawing_buffer, (300, 300));
        assert!((resize_draw.time.unwrap() - 0.1).abs() < 1e-3);
        assert_eq!(outcome, FrameOutcome::Dropped);
    }

    #[test]
    fn auto_resize_replaces_previous_subscription() {
        let mut motion = motion(&MotionOptions::default());
        let (old_notifier, old) = resize_channel();
        let (new_notifier, new) = resize_channel();
        motion.auto_resize(old).unwrap();
        motion.auto_resize(new).unwrap();
        assert!(!old_notifier.notify(10.0, 10.0));
        assert!(new_notifier.notify(10.0, 10.0));
    }

    #[test]
    fn dispose_tears_everything_down() {
        let mut motion = motion(&MotionOptions::default());
        motion.start().unwrap();
        let token = motion.pending_frame().unwrap();
        let (notifier, subscription) = resize_channel();
        motion.auto_resize(subscription).unwrap();
        let completion = motion.fade_in().unwrap();

        motion.dispose().unwrap();
        assert_eq!(completion.wait(), Err(FadeCanceled));
        assert!(!notifier.notify(1.0, 1.0));
        assert!(!motion.element().is_attached());
        assert_eq!(motion.gpu().live_objects().total(), 0);
        assert_eq!(motion.state(), AnimationState::Disposed);

        let clock = motion.clock().clone();
        assert!(matches!(motion.dispose(), Err(MotionError::Disposed)));
        assert!(matches!(motion.start(), Err(MotionError::Disposed)));
        assert!(matches!(motion.pause(), Err(MotionError::Disposed)));
        assert!(matches!(motion.resize(1.0, 1.0, None), Err(MotionError::Disposed)));
        assert!(matches!(motion.fade_in(), Err(MotionError::Disposed)));
        assert!(matches!(motion.fade_out(), Err(MotionError::Disposed)));
        assert!(matches!(motion.poll_host(), Err(MotionError::Disposed)));
        assert!(matches!(motion.cancel_fades(), Err(MotionError::Disposed)));
        assert!(matches!(
            motion.on_frame(token, clock.now()),
            Err(MotionError::Disposed)
        ));
        let (_, subscription) = resize_channel();
        assert!(matches!(
            motion.auto_resize(subscription),
            Err(MotionError::Disposed)
        ));
    }

    #[test]
    fn invalid_options_fail_construction() {
        let options = MotionOptions {
            colors: Some(vec!["blue".to_string()]),
            ..MotionOptions::default()
        };
        let result = Motion::with_gpu(RecordingGpu::new(), &options, ManualClock::new(), None);
        assert!(matches!(result, Err(MotionError::Config(_))));
    }

    #[test]
    fn shader_failure_surfaces_as_render_error() {
        let mut gpu = RecordingGpu::new();
        gpu.fail_next_link("link failed");
        let result = Motion::with_gpu(gpu, &MotionOptions::default(), ManualClock::new(), None);
        assert!(matches!(
            result,
            Err(MotionError::Render(RenderError::ProgramLink { .. }))
        ));
    }
}
