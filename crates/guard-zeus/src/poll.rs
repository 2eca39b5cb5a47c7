//! Bounded linear polling.
//!
//! Boot readiness and the peer wait both use the same loop: check, sleep a
//! fixed interval, check again, at most [`PollConfig::MAX_WAIT_COUNT`] sleeps.

use crate::cancel::CancellationToken;
use crate::config::{PollConfig, SupervisorConfig};
use std::time::Duration;

/// How a bounded wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The condition held.
    Satisfied,
    /// Every attempt was used up.
    TimedOut,
    /// The token was cancelled between attempts.
    Cancelled,
}

impl PollOutcome {
    pub fn is_satisfied(self) -> bool {
        self == PollOutcome::Satisfied
    }
}

/// A fixed-interval wait with a hard attempt limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedPoll {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl BoundedPoll {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// The loop a runner uses: ten attempts of `timeout / 10`.
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(PollConfig::MAX_WAIT_COUNT, config.poll_interval())
    }

    /// Block until `condition` holds or the attempts run out.
    pub fn wait_until(&self, condition: impl FnMut() -> bool) -> bool {
        self.wait_until_cancellable(&CancellationToken::new(), condition)
            .is_satisfied()
    }

    /// Like [`wait_until`](Self::wait_until) but gives up early once `token`
    /// is cancelled.
    pub fn wait_until_cancellable(
        &self,
        token: &CancellationToken,
        mut condition: impl FnMut() -> bool,
    ) -> PollOutcome {
        let mut slept = 0;
        loop {
            if token.is_cancelled() {
                return PollOutcome::Cancelled;
            }
            if condition() {
                return PollOutcome::Satisfied;
            }
            // The check after the last sleep still counts.
            if slept >= self.max_attempts {
                return PollOutcome::TimedOut;
            }
            std::thread::sleep(self.interval);
            slept += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_success_does_not_sleep() {
        let poll = BoundedPoll::new(10, Duration::from_secs(60));
        let mut calls = 0;
        assert!(poll.wait_until(|| {
            calls += 1;
            true
        }));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let poll = BoundedPoll::new(10, Duration::ZERO);
        let mut calls = 0;
        assert!(!poll.wait_until(|| {
            calls += 1;
            false
        }));
        // One check per sleep plus the initial one.
        assert_eq!(calls, 11);
    }

    #[test]
    fn test_succeeds_on_later_attempt() {
        let poll = BoundedPoll::new(10, Duration::ZERO);
        let mut calls = 0;
        assert!(poll.wait_until(|| {
            calls += 1;
            calls == 4
        }));
        assert_eq!(calls, 4);
    }

    #[test]
    fn test_success_on_final_check_counts() {
        let poll = BoundedPoll::new(10, Duration::ZERO);
        let mut calls = 0;
        assert!(poll.wait_until(|| {
            calls += 1;
            calls == 11
        }));
    }

    #[test]
    fn test_cancelled_token_stops_before_checking() {
        let poll = BoundedPoll::new(10, Duration::ZERO);
        let token = CancellationToken::new();
        token.cancel();
        let mut calls = 0;
        let outcome = poll.wait_until_cancellable(&token, || {
            calls += 1;
            true
        });
        assert_eq!(outcome, PollOutcome::Cancelled);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_from_config_uses_tenth_of_timeout() {
        let config = SupervisorConfig::new("/app").with_timeout(5.0);
        let poll = BoundedPoll::from_config(&config);
        assert_eq!(poll.max_attempts, 10);
        assert_eq!(poll.interval, Duration::from_millis(500));
    }
}
