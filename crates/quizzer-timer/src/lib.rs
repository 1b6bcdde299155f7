//! Cancellable one-shot timers for Quizzer rounds.
//!
//! Round deadlines and recruitment windows never block the event path.
//! Each is a spawned task that sleeps and then runs a callback.
//!
//! Cancelling a task is not enough on its own: the sleep may already have
//! finished and the callback may be waiting on the round lock when the
//! round is stopped. So every timer carries the [`Generation`] of the round
//! that armed it, and the callback must compare it with the round's
//! current generation before acting. A stale timer then does nothing even
//! if it slips past cancellation.
//!
//! # Integration
//!
//! ```ignore
//! let weak = Arc::downgrade(&round);
//! let generation = inner.generation;
//! inner.timer.arm(ScheduledTimer::schedule(window, generation, async move {
//!     if let Some(round) = weak.upgrade() {
//!         round.on_recruitment_closed(generation).await;
//!     }
//! }));
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::trace;

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Monotonic round counter stamped on every timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The following generation.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ScheduledTimer
// ---------------------------------------------------------------------------

/// A callback that runs once after a delay unless cancelled first.
#[derive(Debug)]
pub struct ScheduledTimer {
    handle: JoinHandle<()>,
    generation: Generation,
    deadline: Instant,
}

impl ScheduledTimer {
    /// Spawns a task that sleeps for `delay`, then runs `callback`.
    ///
    /// Cancelling only interrupts the sleep. Once due, the callback runs in
    /// its own task, so a callback that re-arms or disarms the slot holding
    /// this timer does not abort itself.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(delay: Duration, generation: Generation, callback: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let deadline = Instant::now() + delay;
        trace!(%generation, delay_ms = delay.as_millis() as u64, "timer armed");
        let handle = tokio::spawn(async move {
            time::sleep_until(deadline).await;
            trace!(%generation, "timer fired");
            tokio::spawn(callback);
        });
        Self {
            handle,
            generation,
            deadline,
        }
    }

    /// Aborts the task. Harmless if it already ran.
    pub fn cancel(&self) {
        if !self.handle.is_finished() {
            trace!(generation = %self.generation, "timer cancelled");
        }
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Time left before firing, zero once due.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

// ---------------------------------------------------------------------------
// TimerSlot
// ---------------------------------------------------------------------------

/// Holds at most one pending timer.
///
/// Arming a slot cancels whatever it held before; dropping the slot
/// cancels the pending timer.
#[derive(Debug, Default)]
pub struct TimerSlot {
    current: Option<ScheduledTimer>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the pending timer, cancelling the old one.
    pub fn arm(&mut self, timer: ScheduledTimer) {
        if let Some(previous) = self.current.replace(timer) {
            previous.cancel();
        }
    }

    /// Cancels the pending timer, if any.
    pub fn disarm(&mut self) {
        if let Some(timer) = self.current.take() {
            timer.cancel();
        }
    }

    /// Whether a timer is held and has not finished yet.
    pub fn is_armed(&self) -> bool {
        self.current.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Time left on the pending timer, `None` when nothing is armed.
    pub fn remaining(&self) -> Option<Duration> {
        if !self.is_armed() {
            return None;
        }
        self.current.as_ref().map(ScheduledTimer::remaining)
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.disarm();
    }
}
