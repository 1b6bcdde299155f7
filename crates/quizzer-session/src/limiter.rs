//! Per-identity cooldowns and failed-attempt lockouts.
//!
//! Both trackers keep one map behind one mutex. Every read and write of a
//! record happens inside that critical section, so two tasks can never
//! observe a half-updated record for the same identity. The maps are
//! separate, so an answer cooldown check never waits on a lockout update.
//!
//! Expiry is lazy: nothing runs on a timer. A stale record is noticed and
//! removed the next time someone asks about that identity.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use quizzer_protocol::Identity;

/// Rounds a remaining duration up to whole seconds.
///
/// Rounding up keeps the reported value positive until the exact instant
/// the lockout ends.
pub(crate) fn ceil_secs(remaining: Duration) -> u64 {
    remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
}

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

struct RateState {
    cooldown: Duration,
    last_action: HashMap<Identity, Instant>,
}

/// Enforces a minimum gap between accepted actions of one identity.
pub struct RateLimiter {
    state: Mutex<RateState>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(RateState {
                cooldown,
                last_action: HashMap::new(),
            }),
        }
    }

    /// Returns `false` if `identity` acted less than one cooldown ago.
    ///
    /// Otherwise records "now" as the identity's last action and returns
    /// `true`. A rejected call does not move the window.
    pub async fn allow_action(&self, identity: &Identity) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        if let Some(last) = state.last_action.get(identity) {
            if now.duration_since(*last) < state.cooldown {
                return false;
            }
        }
        state.last_action.insert(identity.clone(), now);
        true
    }

    /// Changes the cooldown for every identity. Takes effect immediately.
    pub async fn set_cooldown(&self, cooldown: Duration) {
        self.state.lock().await.cooldown = cooldown;
        tracing::info!(cooldown_secs = cooldown.as_secs(), "answer cooldown updated");
    }

    pub async fn cooldown(&self) -> Duration {
        self.state.lock().await.cooldown
    }

    /// Forgets every recorded action.
    pub async fn clear(&self) {
        self.state.lock().await.last_action.clear();
    }
}

// ---------------------------------------------------------------------------
// LockoutTracker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct LockoutRecord {
    failures: u32,
    locked_until: Option<Instant>,
}

/// Counts failed password attempts and locks an identity out once the
/// threshold is reached.
pub struct LockoutTracker {
    max_attempts: u32,
    duration: Duration,
    records: Mutex<HashMap<Identity, LockoutRecord>>,
}

impl LockoutTracker {
    pub fn new(max_attempts: u32, duration: Duration) -> Self {
        Self {
            max_attempts,
            duration,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Records one failed attempt.
    ///
    /// Returns the remaining lockout in seconds if the identity is now
    /// (or already was) locked out, `None` otherwise.
    pub async fn record_failure(&self, identity: &Identity) -> Option<u64> {
        let now = Instant::now();
        let mut records = self.records.lock().await;
        let record = records
            .entry(identity.clone())
            .or_insert(LockoutRecord {
                failures: 0,
                locked_until: None,
            });

        match record.locked_until {
            Some(until) if until > now => return Some(ceil_secs(until - now)),
            Some(_) => {
                // An expired lockout starts a fresh count.
                record.failures = 0;
                record.locked_until = None;
            }
            None => {}
        }

        record.failures += 1;
        if record.failures >= self.max_attempts {
            let until = now + self.duration;
            record.locked_until = Some(until);
            tracing::warn!(
                identity = %identity,
                failures = record.failures,
                lockout_secs = self.duration.as_secs(),
                "identity locked out"
            );
            return Some(ceil_secs(until - now));
        }
        None
    }

    /// Clears every failure and lockout for `identity`.
    pub async fn record_success(&self, identity: &Identity) {
        self.records.lock().await.remove(identity);
    }

    /// Returns the remaining lockout in whole seconds, rounded up.
    ///
    /// An expired record is deleted before answering.
    pub async fn is_locked_out(&self, identity: &Identity) -> Option<u64> {
        let now = Instant::now();
        let mut records = self.records.lock().await;
        let until = records.get(identity)?.locked_until?;
        if until > now {
            Some(ceil_secs(until - now))
        } else {
            records.remove(identity);
            tracing::debug!(identity = %identity, "lockout expired");
            None
        }
    }

    /// Current failure count, mostly for diagnostics and tests.
    pub async fn failure_count(&self, identity: &Identity) -> u32 {
        self.records
            .lock()
            .await
            .get(identity)
            .map_or(0, |r| r.failures)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> Identity {
        Identity::new(raw).unwrap()
    }

    // =====================================================================
    // RateLimiter
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_allow_action_within_cooldown_rejected() {
        let limiter = RateLimiter::new(Duration::from_secs(2));
        assert!(limiter.allow_action(&id("alice")).await);
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(!limiter.allow_action(&id("alice")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_allow_action_after_cooldown_accepted() {
        let limiter = RateLimiter::new(Duration::from_secs(2));
        assert!(limiter.allow_action(&id("alice")).await);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(limiter.allow_action(&id("ALICE")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_allow_action_rejection_does_not_extend_window() {
        let limiter = RateLimiter::new(Duration::from_secs(2));
        assert!(limiter.allow_action(&id("alice")).await);
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(!limiter.allow_action(&id("alice")).await);
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.allow_action(&id("alice")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_allow_action_identities_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(2));
        assert!(limiter.allow_action(&id("alice")).await);
        assert!(limiter.allow_action(&id("bob")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_cooldown_zero_allows_everything() {
        let limiter = RateLimiter::new(Duration::from_secs(5));
        limiter.set_cooldown(Duration::ZERO).await;
        assert!(limiter.allow_action(&id("alice")).await);
        assert!(limiter.allow_action(&id("alice")).await);
        assert_eq!(limiter.cooldown().await, Duration::ZERO);
    }

    // =====================================================================
    // LockoutTracker
    // =====================================================================

    fn tracker() -> LockoutTracker {
        LockoutTracker::new(3, Duration::from_secs(300))
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_failure_below_threshold_not_locked() {
        let t = tracker();
        assert_eq!(t.record_failure(&id("alice")).await, None);
        assert_eq!(t.record_failure(&id("alice")).await, None);
        assert_eq!(t.failure_count(&id("alice")).await, 2);
        assert_eq!(t.is_locked_out(&id("alice")).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_failure_at_threshold_locks() {
        let t = tracker();
        t.record_failure(&id("alice")).await;
        t.record_failure(&id("alice")).await;
        assert_eq!(t.record_failure(&id("alice")).await, Some(300));
        assert_eq!(t.is_locked_out(&id("Alice")).await, Some(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_locked_out_decreases_then_expires() {
        let t = tracker();
        for _ in 0..3 {
            t.record_failure(&id("alice")).await;
        }
        tokio::time::advance(Duration::from_secs(100)).await;
        assert_eq!(t.is_locked_out(&id("alice")).await, Some(200));
        tokio::time::advance(Duration::from_millis(199_500)).await;
        assert_eq!(t.is_locked_out(&id("alice")).await, Some(1));
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(t.is_locked_out(&id("alice")).await, None);
        // The expired record was deleted, so the count starts over.
        assert_eq!(t.failure_count(&id("alice")).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_failure_while_locked_does_not_extend() {
        let t = tracker();
        for _ in 0..3 {
            t.record_failure(&id("alice")).await;
        }
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(t.record_failure(&id("alice")).await, Some(290));
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_success_clears_failures() {
        let t = tracker();
        t.record_failure(&id("alice")).await;
        t.record_failure(&id("alice")).await;
        t.record_success(&id("alice")).await;
        assert_eq!(t.failure_count(&id("alice")).await, 0);
        assert_eq!(t.record_failure(&id("alice")).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lockout_per_identity() {
        let t = tracker();
        for _ in 0..3 {
            t.record_failure(&id("alice")).await;
        }
        assert!(t.is_locked_out(&id("alice")).await.is_some());
        assert!(t.is_locked_out(&id("bob")).await.is_none());
    }

    #[test]
    fn test_ceil_secs_rounds_up_partial_seconds() {
        assert_eq!(ceil_secs(Duration::from_millis(1)), 1);
        assert_eq!(ceil_secs(Duration::from_secs(5)), 5);
        assert_eq!(ceil_secs(Duration::from_millis(5001)), 6);
    }
}
