//! Login attempt rate limiting
//!
//! A sliding-window limiter with a cooldown. Every attempt is recorded; once
//! `max_attempts` land inside `window`, the limiter blocks for
//! `block_duration` and forgets the recorded attempts, so the caller starts
//! from a fresh window only after the cooldown has fully elapsed.
//!
//! Expiry is evaluated lazily against the `now` passed to each call, so
//! there is no background timer to tear down.

use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

use crate::MonotonicInstant;

/// Limits for a [`LoginRateLimiter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Attempts allowed inside one window. The attempt that reaches this
    /// count triggers the block and is itself rejected.
    pub max_attempts: u32,
    /// Width of the sliding window
    pub window: Duration,
    /// Cooldown once the block triggers
    pub block_duration: Duration,
}

impl RateLimitConfig {
    /// Config whose cooldown equals the window
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            block_duration: window,
        }
    }

    pub fn with_block_duration(mut self, block_duration: Duration) -> Self {
        self.block_duration = block_duration;
        self
    }
}

impl Default for RateLimitConfig {
    /// Five attempts per fifteen minutes, five minute cooldown
    fn default() -> Self {
        Self::new(5, Duration::from_secs(15 * 60)).with_block_duration(Duration::from_secs(5 * 60))
    }
}

/// Sliding-window limiter for login attempts.
///
/// One instance belongs to one login flow; it is not shared.
#[derive(Debug, Clone)]
pub struct LoginRateLimiter {
    config: RateLimitConfig,
    /// Attempt timestamps, oldest first
    attempts: VecDeque<MonotonicInstant>,
    /// Set while blocked
    block_end: Option<MonotonicInstant>,
}

impl LoginRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            attempts: VecDeque::new(),
            block_end: None,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Record an attempt at `now`.
    ///
    /// Returns `true` if the attempt is permitted. While blocked this returns
    /// `false` without touching the log.
    pub fn attempt(&mut self, now: MonotonicInstant) -> bool {
        self.purge_expired(now);
        self.expire_block(now);

        if self.block_end.is_some() {
            debug!("Login attempt rejected, limiter is blocked");
            return false;
        }

        self.attempts.push_back(now);

        if self.attempts.len() >= self.config.max_attempts as usize {
            self.block_end = Some(now + self.config.block_duration);
            self.attempts.clear();
            warn!(
                max_attempts = self.config.max_attempts,
                block_secs = self.config.block_duration.as_secs(),
                "Login attempt limit reached, blocking"
            );
            return false;
        }

        true
    }

    /// Whether the limiter is blocked at `now`
    pub fn is_blocked(&self, now: MonotonicInstant) -> bool {
        self.block_end.is_some_and(|end| now < end)
    }

    /// Whether an attempt at `now` could be permitted
    pub fn can_attempt(&self, now: MonotonicInstant) -> bool {
        !self.is_blocked(now) && self.remaining_attempts(now) > 0
    }

    /// Attempts left in the current window
    pub fn remaining_attempts(&self, now: MonotonicInstant) -> u32 {
        let live = if self.block_end.is_some_and(|end| now >= end) {
            // The block has lapsed; the log was cleared when it began
            0
        } else {
            self.live_attempts(now)
        };
        self.config
            .max_attempts
            .saturating_sub(u32::try_from(live).unwrap_or(u32::MAX))
    }

    /// Time until the block lifts, zero when not blocked
    pub fn time_until_reset(&self, now: MonotonicInstant) -> Duration {
        self.block_end
            .map(|end| end.saturating_duration_until(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Clear all attempts and any block
    pub fn reset(&mut self) {
        self.attempts.clear();
        self.block_end = None;
    }

    fn live_attempts(&self, now: MonotonicInstant) -> usize {
        self.attempts
            .iter()
            .filter(|t| now.duration_since(**t) < self.config.window)
            .count()
    }

    fn purge_expired(&mut self, now: MonotonicInstant) {
        let window = self.config.window;
        self.attempts.retain(|t| now.duration_since(*t) < window);
    }

    fn expire_block(&mut self, now: MonotonicInstant) {
        if self.block_end.is_some_and(|end| now >= end) {
            debug!("Login block expired");
            self.block_end = None;
            self.attempts.clear();
        }
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(900_000);
    const BLOCK: Duration = Duration::from_millis(300_000);

    fn limiter() -> LoginRateLimiter {
        LoginRateLimiter::new(RateLimitConfig::new(5, WINDOW).with_block_duration(BLOCK))
    }

    #[test]
    fn fifth_attempt_within_a_second_blocks() {
        let mut limiter = limiter();
        let t0 = MonotonicInstant::now();

        for i in 0..4 {
            let now = t0 + Duration::from_millis(i * 200);
            assert!(limiter.attempt(now), "attempt {} should be allowed", i + 1);
        }

        let fifth = t0 + Duration::from_millis(800);
        assert!(!limiter.attempt(fifth));
        assert!(limiter.is_blocked(fifth));

        // Sixth call right after is also rejected
        let sixth = fifth + Duration::from_millis(1);
        assert!(!limiter.attempt(sixth));
        assert!(limiter.is_blocked(sixth));
    }

    #[test]
    fn attempts_while_blocked_do_not_touch_the_log() {
        let mut limiter = limiter();
        let t0 = MonotonicInstant::now();
        for _ in 0..5 {
            limiter.attempt(t0);
        }
        assert!(limiter.is_blocked(t0));

        for i in 1..10 {
            let now = t0 + Duration::from_secs(i);
            assert!(!limiter.attempt(now));
            assert!(limiter.attempts.is_empty());
            assert_eq!(limiter.remaining_attempts(now), 5);
            assert!(!limiter.can_attempt(now));
        }
    }

    #[test]
    fn block_expires_after_cooldown() {
        let mut limiter = limiter();
        let t0 = MonotonicInstant::now();
        for _ in 0..5 {
            limiter.attempt(t0);
        }

        let just_before = t0 + (BLOCK - Duration::from_millis(1));
        assert!(limiter.is_blocked(just_before));
        assert_eq!(limiter.time_until_reset(just_before), Duration::from_millis(1));

        let after = t0 + BLOCK;
        assert!(!limiter.is_blocked(after));
        assert!(limiter.can_attempt(after));
        assert!(limiter.attempt(after));
        assert_eq!(limiter.remaining_attempts(after), 4);
        assert_eq!(limiter.time_until_reset(after), Duration::ZERO);
    }

    #[test]
    fn old_attempts_slide_out_of_the_window() {
        let mut limiter = limiter();
        let t0 = MonotonicInstant::now();
        for _ in 0..4 {
            assert!(limiter.attempt(t0));
        }
        assert_eq!(limiter.remaining_attempts(t0), 1);

        // Once the window has passed, the earlier attempts no longer count
        let later = t0 + WINDOW;
        assert_eq!(limiter.remaining_attempts(later), 5);
        assert!(limiter.attempt(later));
        assert_eq!(limiter.attempts.len(), 1);
    }

    #[test]
    fn remaining_attempts_counts_down() {
        let mut limiter = limiter();
        let t0 = MonotonicInstant::now();
        assert_eq!(limiter.remaining_attempts(t0), 5);
        limiter.attempt(t0);
        limiter.attempt(t0);
        assert_eq!(limiter.remaining_attempts(t0), 3);
        assert!(limiter.can_attempt(t0));
    }

    #[test]
    fn reset_clears_everything() {
        let mut limiter = limiter();
        let t0 = MonotonicInstant::now();
        for _ in 0..5 {
            limiter.attempt(t0);
        }
        assert!(limiter.is_blocked(t0));

        limiter.reset();
        assert!(!limiter.is_blocked(t0));
        assert_eq!(limiter.remaining_attempts(t0), 5);
        assert_eq!(limiter.time_until_reset(t0), Duration::ZERO);

        let once = limiter.clone();
        limiter.reset();
        assert_eq!(limiter.attempts, once.attempts);
        assert_eq!(limiter.block_end, once.block_end);
    }

    #[test]
    fn block_duration_defaults_to_window() {
        let config = RateLimitConfig::new(3, Duration::from_secs(60));
        assert_eq!(config.block_duration, Duration::from_secs(60));
    }

    #[test]
    fn single_attempt_limit_blocks_immediately() {
        let mut limiter = LoginRateLimiter::new(RateLimitConfig::new(1, WINDOW));
        let t0 = MonotonicInstant::now();
        assert!(!limiter.attempt(t0));
        assert!(limiter.is_blocked(t0));
        assert_eq!(limiter.time_until_reset(t0), WINDOW);
    }
}
