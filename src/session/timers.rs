//! Cancellable session timers.
//!
//! The session schedules three classes of recurring work through a host
//! [`Scheduler`] and keeps one [`TimerHandle`] per class. Handles are
//! uniquely owned by the session; cancellation is idempotent and safe on a
//! never-scheduled handle, which keeps session resets order-insensitive at
//! the timer layer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::session::SessionEvent;

/// The three recurring jobs a live session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Ping,
    ExtendedPing,
    ConnectionCheck,
}

impl TimerKind {
    /// Event a firing of this timer injects back into the session.
    pub fn event(self) -> SessionEvent {
        match self {
            TimerKind::Ping => SessionEvent::PingTimer,
            TimerKind::ExtendedPing => SessionEvent::ExtendedPingTimer,
            TimerKind::ConnectionCheck => SessionEvent::ConnectionCheckTimer,
        }
    }
}

/// Shared cancellation flag between a handle and its scheduled callback.
#[derive(Debug, Clone, Default)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent; a handle that was never scheduled cancels to no effect.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Checked by the scheduler right before delivering a firing. A firing
    /// observed after `cancel` must be dropped.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Host-supplied timer facility.
///
/// Firings must be delivered on the same logical task that drives the
/// session (the host's turn queue), so session state is never touched
/// concurrently.
pub trait Scheduler {
    /// Schedule `kind` to fire every `interval` until the returned handle
    /// is cancelled.
    fn schedule_repeating(&self, kind: TimerKind, interval: Duration) -> TimerHandle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_idempotent() {
        let handle = TimerHandle::new();
        assert!(!handle.is_cancelled());
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn clones_share_the_cancellation_flag() {
        let handle = TimerHandle::new();
        let scheduled_side = handle.clone();
        handle.cancel();
        assert!(scheduled_side.is_cancelled());
    }
}
