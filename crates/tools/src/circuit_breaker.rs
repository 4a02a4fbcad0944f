//! Per-`(plugin, action)` circuit breaker.
//!
//! Grounded on the same `RwLock<HashMap<_,_>>` shape [`crate::manager::ProcessManager`]
//! uses for its session table — one lock, short critical sections, state
//! cloned out before acting on it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use sa_domain::config::CircuitBreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Breaker {
    state: State,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_trials_used: u32,
}

impl Breaker {
    fn new() -> Self {
        Self {
            state: State::Closed,
            consecutive_failures: 0,
            opened_at: None,
            half_open_trials_used: 0,
        }
    }
}

/// Whether the breaker would currently allow a dispatch through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    /// Rejected without attempting the call; still within the cool-off window.
    Reject,
}

/// Tracks one breaker per `"plugin.action"` key, opening after
/// `failure_threshold` consecutive failures and rejecting dispatches until
/// `cooloff_ms` elapses, at which point a bounded number of half-open trial
/// requests are let through before the breaker fully closes again.
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Breaker>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Check whether `key` (typically `"plugin.action"`) currently admits a
    /// dispatch, transitioning `Open -> HalfOpen` if the cool-off has elapsed.
    pub fn admit(&self, key: &str) -> Admission {
        if !self.config.enabled {
            return Admission::Allow;
        }

        let mut breakers = self.breakers.write();
        let breaker = breakers.entry(key.to_string()).or_insert_with(Breaker::new);

        match breaker.state {
            State::Closed => Admission::Allow,
            State::HalfOpen => {
                if breaker.half_open_trials_used < self.config.half_open_trials {
                    breaker.half_open_trials_used += 1;
                    Admission::Allow
                } else {
                    Admission::Reject
                }
            }
            State::Open => {
                let cooled_off = breaker
                    .opened_at
                    .map(|t| t.elapsed() >= Duration::from_millis(self.config.cooloff_ms))
                    .unwrap_or(true);
                if cooled_off {
                    breaker.state = State::HalfOpen;
                    breaker.half_open_trials_used = 1;
                    Admission::Allow
                } else {
                    Admission::Reject
                }
            }
        }
    }

    /// Record a successful dispatch, closing the breaker.
    pub fn record_success(&self, key: &str) {
        let mut breakers = self.breakers.write();
        if let Some(breaker) = breakers.get_mut(key) {
            breaker.state = State::Closed;
            breaker.consecutive_failures = 0;
            breaker.opened_at = None;
            breaker.half_open_trials_used = 0;
        }
    }

    /// Record a failed dispatch. Opens the breaker once consecutive failures
    /// reach `failure_threshold`, or immediately re-opens a half-open trial
    /// that failed.
    pub fn record_failure(&self, key: &str) {
        if !self.config.enabled {
            return;
        }

        let mut breakers = self.breakers.write();
        let breaker = breakers.entry(key.to_string()).or_insert_with(Breaker::new);

        if breaker.state == State::HalfOpen {
            breaker.state = State::Open;
            breaker.opened_at = Some(Instant::now());
            breaker.half_open_trials_used = 0;
            return;
        }

        breaker.consecutive_failures += 1;
        if breaker.consecutive_failures >= self.config.failure_threshold {
            breaker.state = State::Open;
            breaker.opened_at = Some(Instant::now());
        }
    }

    /// Whether `key` is currently open (rejecting dispatches outright).
    pub fn is_open(&self, key: &str) -> bool {
        let breakers = self.breakers.read();
        breakers
            .get(key)
            .map(|b| b.state == State::Open)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold: u32, cooloff_ms: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            enabled: true,
            failure_threshold: threshold,
            cooloff_ms,
            half_open_trials: 1,
        }
    }

    #[test]
    fn opens_after_threshold_failures() {
        let reg = CircuitBreakerRegistry::new(config(3, 60_000));
        for _ in 0..2 {
            reg.record_failure("weather.query");
            assert!(!reg.is_open("weather.query"));
        }
        reg.record_failure("weather.query");
        assert!(reg.is_open("weather.query"));
        assert_eq!(reg.admit("weather.query"), Admission::Reject);
    }

    #[test]
    fn success_resets_failure_count() {
        let reg = CircuitBreakerRegistry::new(config(3, 60_000));
        reg.record_failure("weather.query");
        reg.record_failure("weather.query");
        reg.record_success("weather.query");
        reg.record_failure("weather.query");
        assert!(!reg.is_open("weather.query"));
    }

    #[test]
    fn half_open_after_cooloff_allows_one_trial() {
        let reg = CircuitBreakerRegistry::new(config(1, 0));
        reg.record_failure("weather.query");
        assert!(reg.is_open("weather.query"));
        assert_eq!(reg.admit("weather.query"), Admission::Allow);
        assert_eq!(reg.admit("weather.query"), Admission::Reject);
    }

    #[test]
    fn half_open_failure_reopens() {
        let reg = CircuitBreakerRegistry::new(config(1, 0));
        reg.record_failure("weather.query");
        assert_eq!(reg.admit("weather.query"), Admission::Allow);
        reg.record_failure("weather.query");
        assert!(reg.is_open("weather.query"));
    }

    #[test]
    fn disabled_breaker_always_admits() {
        let mut cfg = config(1, 60_000);
        cfg.enabled = false;
        let reg = CircuitBreakerRegistry::new(cfg);
        reg.record_failure("weather.query");
        assert_eq!(reg.admit("weather.query"), Admission::Allow);
    }
}
