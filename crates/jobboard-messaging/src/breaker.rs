//! Consecutive-failure circuit breaker guarding live messaging calls.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerStatus {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum State {
    Closed { failures: u32 },
    Open { until: Instant },
    /// One trial call is in flight; everyone else keeps the fallback. A trial
    /// that never reports back is superseded once `retry_at` passes.
    HalfOpen { retry_at: Instant },
}

#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    state: Mutex<State>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            state: Mutex::new(State::Closed { failures: 0 }),
        }
    }

    #[must_use]
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Whether a live call may go out at `now`. An expired open state admits
    /// one trial call per cooldown.
    #[must_use]
    pub fn allow_at(&self, now: Instant) -> bool {
        let mut state = self.lock();
        match *state {
            State::Closed { .. } => true,
            State::Open { until: deadline } | State::HalfOpen { retry_at: deadline }
                if now >= deadline =>
            {
                *state = State::HalfOpen {
                    retry_at: now + self.cooldown,
                };
                true
            }
            State::Open { .. } | State::HalfOpen { .. } => false,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.lock();
        if !matches!(*state, State::Closed { failures: 0 }) {
            tracing::info!(target: "jobboard.messaging", "backend reachable again; breaker closed");
        }
        *state = State::Closed { failures: 0 };
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    pub fn record_failure_at(&self, now: Instant) {
        let mut state = self.lock();
        let next = match *state {
            State::Closed { failures } if failures + 1 < self.threshold => State::Closed {
                failures: failures + 1,
            },
            State::Closed { .. } | State::HalfOpen { .. } | State::Open { .. } => {
                tracing::warn!(
                    target: "jobboard.messaging",
                    cooldown_ms = u64::try_from(self.cooldown.as_millis()).unwrap_or(u64::MAX),
                    "backend unavailable; breaker open",
                );
                State::Open {
                    until: now + self.cooldown,
                }
            }
        };
        *state = next;
    }

    #[must_use]
    pub fn status(&self) -> BreakerStatus {
        match *self.lock() {
            State::Closed { .. } => BreakerStatus::Closed,
            State::Open { .. } => BreakerStatus::Open,
            State::HalfOpen { .. } => BreakerStatus::HalfOpen,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(30));
        let now = Instant::now();
        breaker.record_failure_at(now);
        breaker.record_failure_at(now);
        assert!(breaker.allow_at(now));
        breaker.record_failure_at(now);
        assert_eq!(breaker.status(), BreakerStatus::Open);
        assert!(!breaker.allow_at(now + Duration::from_secs(29)));
    }

    #[test]
    fn success_resets_the_failure_count() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(30));
        let now = Instant::now();
        breaker.record_failure_at(now);
        breaker.record_success();
        breaker.record_failure_at(now);
        assert_eq!(breaker.status(), BreakerStatus::Closed);
    }

    #[test]
    fn cooldown_admits_a_single_trial_call() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(10));
        let now = Instant::now();
        breaker.record_failure_at(now);
        let later = now + Duration::from_secs(10);
        assert!(breaker.allow_at(later));
        assert_eq!(breaker.status(), BreakerStatus::HalfOpen);
        assert!(!breaker.allow_at(later));

        breaker.record_failure_at(later);
        assert_eq!(breaker.status(), BreakerStatus::Open);
        assert!(!breaker.allow_at(later + Duration::from_secs(5)));

        assert!(breaker.allow_at(later + Duration::from_secs(10)));
        breaker.record_success();
        assert_eq!(breaker.status(), BreakerStatus::Closed);
        assert!(breaker.allow_at(later + Duration::from_secs(10)));
    }

    #[test]
    fn abandoned_trial_is_retried_after_another_cooldown() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(10));
        let now = Instant::now();
        breaker.record_failure_at(now);
        let trial = now + Duration::from_secs(10);
        assert!(breaker.allow_at(trial));

        // The trial never records an outcome.
        assert!(!breaker.allow_at(trial + Duration::from_secs(9)));
        assert!(breaker.allow_at(trial + Duration::from_secs(10)));
        assert_eq!(breaker.status(), BreakerStatus::HalfOpen);
        assert!(!breaker.allow_at(trial + Duration::from_secs(10)));

        breaker.record_success();
        assert_eq!(breaker.status(), BreakerStatus::Closed);
    }

    #[test]
    fn zero_threshold_behaves_like_one() {
        let breaker = CircuitBreaker::new(0, Duration::from_secs(1));
        breaker.record_failure();
        assert_eq!(breaker.status(), BreakerStatus::Open);
    }
}
