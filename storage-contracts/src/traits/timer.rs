// SPDX-License-Identifier: GPL-3.0-only

use std::time::Duration;

/// Callback run once when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Handle to one outstanding timer registration.
pub trait TimerHandle: Send + Sync {
    /// Prevent the callback from running. Cancelling a timer that already
    /// fired or was already cancelled is a no-op.
    fn cancel(&self);
}

/// Scheduling facility used to expire transient settings.
///
/// Callbacks run on the service's own execution context, never inside
/// `schedule` itself.
pub trait TimerService: Send + Sync {
    fn schedule(&self, name: &str, delay: Duration, callback: TimerCallback)
        -> Box<dyn TimerHandle>;
}
