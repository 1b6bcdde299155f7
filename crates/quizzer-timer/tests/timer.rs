//! Integration tests for scheduled timers.
//!
//! Uses paused time: `tokio::time::advance` moves the clock and lets due
//! timers run, so no test actually waits.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use quizzer_timer::{Generation, ScheduledTimer, TimerSlot};

// =========================================================================
// Helpers
// =========================================================================

fn counting_timer(delay_secs: u64, counter: &Arc<AtomicU32>) -> ScheduledTimer {
    let counter = Arc::clone(counter);
    ScheduledTimer::schedule(Duration::from_secs(delay_secs), Generation::new(1), async move {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

/// Advances the paused clock and lets spawned tasks run.
async fn advance_secs(secs: u64) {
    tokio::time::advance(Duration::from_secs(secs)).await;
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

// =========================================================================
// ScheduledTimer
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_timer_fires_after_delay() {
    let fired = Arc::new(AtomicU32::new(0));
    let timer = counting_timer(30, &fired);

    advance_secs(29).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert_eq!(timer.remaining(), Duration::from_secs(1));

    advance_secs(1).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(timer.is_finished());
}

#[tokio::test(start_paused = true)]
async fn test_timer_cancel_prevents_callback() {
    let fired = Arc::new(AtomicU32::new(0));
    let timer = counting_timer(10, &fired);

    timer.cancel();
    advance_secs(20).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timer_keeps_its_generation() {
    let timer = ScheduledTimer::schedule(Duration::from_secs(1), Generation::new(42), async {});
    assert_eq!(timer.generation(), Generation::new(42));
}

// =========================================================================
// TimerSlot
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_slot_arm_replaces_previous_timer() {
    let first = Arc::new(AtomicU32::new(0));
    let second = Arc::new(AtomicU32::new(0));
    let mut slot = TimerSlot::new();

    slot.arm(counting_timer(10, &first));
    slot.arm(counting_timer(10, &second));
    assert!(slot.is_armed());
    assert_eq!(slot.remaining(), Some(Duration::from_secs(10)));

    advance_secs(10).await;
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
    assert!(!slot.is_armed());
}

#[tokio::test(start_paused = true)]
async fn test_slot_disarm_cancels() {
    let fired = Arc::new(AtomicU32::new(0));
    let mut slot = TimerSlot::new();
    slot.arm(counting_timer(5, &fired));

    slot.disarm();
    assert!(!slot.is_armed());
    assert_eq!(slot.remaining(), None);

    advance_secs(10).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slot_drop_cancels() {
    let fired = Arc::new(AtomicU32::new(0));
    {
        let mut slot = TimerSlot::new();
        slot.arm(counting_timer(5, &fired));
    }
    advance_secs(10).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}
