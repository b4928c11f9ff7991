use crossbeam_channel::{Receiver, Sender};

/// Creates a linked notifier/subscription pair for host size changes.
///
/// The notifier lives with whatever observes the host element (possibly on
/// another thread); the subscription is handed to `Motion::auto_resize`.
pub fn resize_channel() -> (ResizeNotifier, ResizeSubscription) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    (ResizeNotifier { sender }, ResizeSubscription { receiver })
}

/// Sending half: reports the observed logical size of the host element.
#[derive(Debug, Clone)]
pub struct ResizeNotifier {
    sender: Sender<(f64, f64)>,
}

impl ResizeNotifier {
    /// Returns `false` once the subscription has been dropped.
    pub fn notify(&self, width: f64, height: f64) -> bool {
        self.sender.send((width, height)).is_ok()
    }
}

/// Receiving half installed on a `Motion`.
#[derive(Debug)]
pub struct ResizeSubscription {
    receiver: Receiver<(f64, f64)>,
}

impl ResizeSubscription {
    /// Drains pending notifications, keeping only the most recent size.
    pub fn latest(&self) -> Option<(f64, f64)> {
        self.receiver.try_iter().last()
    }
}
