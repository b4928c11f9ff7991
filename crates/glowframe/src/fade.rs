use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::timeline::{Easing, FadeEnvelope};

/// Length of both fade transitions.
pub const FADE_DURATION: Duration = Duration::from_millis(300);

/// Scale the canvas grows to while hidden.
const HIDDEN_SCALE: f32 = 1.2;

/// The transition was interrupted before it finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("canceled")]
pub struct FadeCanceled;

/// Presentation values applied to the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub opacity: f32,
    pub scale: f32,
}

impl Keyframe {
    pub const VISIBLE: Keyframe = Keyframe {
        opacity: 1.0,
        scale: 1.0,
    };
    pub const HIDDEN: Keyframe = Keyframe {
        opacity: 0.0,
        scale: HIDDEN_SCALE,
    };

    fn lerp(self, to: Keyframe, t: f32) -> Keyframe {
        Keyframe {
            opacity: self.opacity + (to.opacity - self.opacity) * t,
            scale: self.scale + (to.scale - self.scale) * t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

impl FadeDirection {
    fn endpoints(self) -> (Keyframe, Keyframe, Easing) {
        match self {
            FadeDirection::In => (Keyframe::HIDDEN, Keyframe::VISIBLE, Easing::EaseOut),
            FadeDirection::Out => (Keyframe::VISIBLE, Keyframe::HIDDEN, Easing::EaseIn),
        }
    }
}

type FadeResult = Result<(), FadeCanceled>;

/// Single-shot completion signal of one fade.
///
/// Resolves `Ok(())` when the transition finishes and `Err(FadeCanceled)`
/// when it is interrupted. Can be moved to another thread and waited on.
#[derive(Debug)]
pub struct FadeCompletion {
    receiver: Receiver<FadeResult>,
    settled: Option<FadeResult>,
}

impl FadeCompletion {
    /// Result if the fade has settled, without blocking.
    pub fn try_result(&mut self) -> Option<FadeResult> {
        if self.settled.is_none() {
            self.settled = match self.receiver.try_recv() {
                Ok(result) => Some(result),
                Err(TryRecvError::Disconnected) => Some(Err(FadeCanceled)),
                Err(TryRecvError::Empty) => None,
            };
        }
        self.settled
    }

    pub fn is_settled(&mut self) -> bool {
        self.try_result().is_some()
    }

    /// Blocks up to `timeout` for the fade to settle.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<FadeResult> {
        if self.settled.is_none() {
            self.settled = match self.receiver.recv_timeout(timeout) {
                Ok(result) => Some(result),
                Err(RecvTimeoutError::Disconnected) => Some(Err(FadeCanceled)),
                Err(RecvTimeoutError::Timeout) => None,
            };
        }
        self.settled
    }

    /// Blocks until the fade settles.
    pub fn wait(mut self) -> FadeResult {
        if let Some(result) = self.settled.take() {
            return result;
        }
        self.receiver.recv().unwrap_or(Err(FadeCanceled))
    }
}

/// A running fade. Dropping it without finishing cancels the completion.
pub(crate) struct Transition {
    direction: FadeDirection,
    from: Keyframe,
    to: Keyframe,
    envelope: FadeEnvelope,
    sender: Sender<FadeResult>,
}

impl Transition {
    pub fn start(direction: FadeDirection, now: Instant) -> (Self, FadeCompletion) {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let (from, to, easing) = direction.endpoints();
        let transition = Self {
            direction,
            from,
            to,
            envelope: FadeEnvelope::new(FADE_DURATION, easing, now),
            sender,
        };
        let completion = FadeCompletion {
            receiver,
            settled: None,
        };
        (transition, completion)
    }

    pub fn direction(&self) -> FadeDirection {
        self.direction
    }

    pub fn initial(&self) -> Keyframe {
        self.from
    }

    /// Keyframe at `now` and whether the transition has reached its end.
    pub fn sample(&self, now: Instant) -> (Keyframe, bool) {
        let (mix, finished) = self.envelope.progress(now);
        if finished {
            (self.to, true)
        } else {
            (self.from.lerp(self.to, mix), false)
        }
    }

    pub fn finish(self) {
        let _ = self.sender.try_send(Ok(()));
    }

    pub fn cancel(self) {
        let _ = self.sender.try_send(Err(FadeCanceled));
    }
}
