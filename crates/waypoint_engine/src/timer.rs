// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cancellable scheduled messages.
//!
//! Timers never touch engine state directly. They post a message into the
//! owner's channel after a delay, and the owner decides whether the message
//! is still relevant. Dropping a [`TimerHandle`] cancels delivery.

use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Handle to a pending timer; aborts on drop
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Stop the timer
    pub fn cancel(self) {
        drop(self);
    }

    /// Whether the timer already delivered (or was aborted)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Post `message` into `tx` once `delay` has passed
pub fn schedule<M: Send + 'static>(
    delay: Duration,
    tx: UnboundedSender<M>,
    message: M,
) -> TimerHandle {
    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(message);
    });
    TimerHandle { task }
}

/// Post a message built from the elapsed time every `period`.
///
/// The first tick fires immediately with zero elapsed time. Stops when the
/// receiving side is gone.
pub fn schedule_repeating<M, F>(period: Duration, tx: UnboundedSender<M>, mut make: F) -> TimerHandle
where
    M: Send + 'static,
    F: FnMut(Duration) -> M + Send + 'static,
{
    let task = tokio::spawn(async move {
        let started = tokio::time::Instant::now();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if tx.send(make(started.elapsed())).is_err() {
                break;
            }
        }
    });
    TimerHandle { task }
}

/// A single optional timer; arming replaces and cancels the previous one
#[derive(Debug, Default)]
pub struct TimerSlot {
    current: Option<TimerHandle>,
}

impl TimerSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending timer
    pub fn arm(&mut self, handle: TimerHandle) {
        self.current = Some(handle);
    }

    /// Cancel the pending timer, if any
    pub fn cancel(&mut self) {
        self.current = None;
    }

    /// Whether a timer is armed and not yet finished
    pub fn is_armed(&self) -> bool {
        self.current.as_ref().is_some_and(|h| !h.is_finished())
    }
}
