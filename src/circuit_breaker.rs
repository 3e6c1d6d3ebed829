use failsafe::failure_policy::{
    self, ConsecutiveFailures, FailurePolicy, OrElse, SuccessRateOverTimeWindow,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

use crate::config::ResilienceConfig;

/// Failure policy used by the service breakers: trips on a run of consecutive
/// failures or on a low success rate over a rolling window, whichever comes first.
pub type DefaultFailurePolicy =
    OrElse<ConsecutiveFailures<CoolDown>, SuccessRateOverTimeWindow<CoolDown>>;

/// Builds the failure policy described by the configuration.
///
/// Open durations start at `open_duration` and double on every re-open, capped at
/// `max_open_duration`. A successful trial call resets the sequence.
pub fn default_failure_policy(config: &ResilienceConfig) -> DefaultFailurePolicy {
    let cool_down = CoolDown::new(config.open_duration, config.max_open_duration);
    let required_success_rate = (1.0 - config.failure_rate).clamp(0.01, 0.99);

    failure_policy::consecutive_failures(config.failure_threshold, cool_down.clone()).or_else(
        failure_policy::success_rate_over_time_window(
            required_success_rate,
            config.minimum_calls.max(1),
            config.window,
            cool_down,
        ),
    )
}

/// Doubling sequence of open durations, capped at `max`.
///
/// failsafe's own exponential backoff counts in whole seconds; this one keeps
/// millisecond cool-downs intact.
#[derive(Debug, Clone)]
pub struct CoolDown {
    next: Duration,
    max: Duration,
}

impl CoolDown {
    pub fn new(start: Duration, max: Duration) -> Self {
        Self {
            next: start.min(max),
            max,
        }
    }
}

impl Iterator for CoolDown {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = current.saturating_mul(2).min(self.max);
        Some(current)
    }
}

/// Observable state of a breaker.
///
/// # States
///
/// - **CLOSED**: Normal operation, requests pass through.
/// - **OPEN**: Too many failures, requests fail fast.
/// - **HALF_OPEN**: Cool-down elapsed, a single trial request is let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

enum State {
    Closed,
    Open { until: Instant, delay: Duration },
    HalfOpen { delay: Duration, trial_in_flight: bool },
}

impl State {
    fn public(&self) -> CircuitState {
        match self {
            State::Closed => CircuitState::Closed,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

struct Inner<P> {
    state: State,
    policy: P,
}

/// The breaker refused the call without running it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected;

/// Circuit breaker for one named operation.
///
/// CLOSED --policy trips--> OPEN --cool-down elapsed--> HALF_OPEN
/// --trial success--> CLOSED, and HALF_OPEN --trial failure--> OPEN.
pub struct CircuitBreaker<P = DefaultFailurePolicy> {
    name: &'static str,
    inner: Mutex<Inner<P>>,
}

impl CircuitBreaker<DefaultFailurePolicy> {
    pub fn from_config(name: &'static str, config: &ResilienceConfig) -> Self {
        Self::with_policy(name, default_failure_policy(config))
    }
}

impl<P: FailurePolicy> CircuitBreaker<P> {
    pub fn with_policy(name: &'static str, policy: P) -> Self {
        Self {
            name,
            inner: Mutex::new(Inner {
                state: State::Closed,
                policy,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current state. An open breaker whose cool-down has elapsed still reports
    /// `Open` until the next call moves it to half-open.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state.public()
    }

    /// Asks permission to run a call.
    ///
    /// The returned permit must be settled with [`Permit::success`] or
    /// [`Permit::failure`]; dropping it unsettled counts as a failure.
    pub fn acquire(&self) -> Result<Permit<'_, P>, Rejected> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.state {
            State::Closed => Ok(Permit::new(self, false)),
            State::Open { until, delay } => {
                if Instant::now() < until {
                    return Err(Rejected);
                }
                tracing::info!("Circuit '{}' half-open, admitting trial call", self.name);
                inner.state = State::HalfOpen {
                    delay,
                    trial_in_flight: true,
                };
                Ok(Permit::new(self, true))
            }
            State::HalfOpen {
                trial_in_flight: true,
                ..
            } => Err(Rejected),
            State::HalfOpen { delay, .. } => {
                inner.state = State::HalfOpen {
                    delay,
                    trial_in_flight: true,
                };
                Ok(Permit::new(self, true))
            }
        }
    }

    fn on_success(&self, trial: bool) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.state {
            State::Closed => inner.policy.record_success(),
            State::HalfOpen { .. } if trial => {
                inner.policy.revived();
                inner.state = State::Closed;
                tracing::info!("Circuit '{}' closed after successful trial", self.name);
            }
            // Late results of calls admitted before the breaker opened.
            _ => {}
        }
    }

    fn on_failure(&self, trial: bool) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.state {
            State::Closed => {
                if let Some(delay) = inner.policy.mark_dead_on_failure() {
                    inner.state = State::Open {
                        until: Instant::now() + delay,
                        delay,
                    };
                    tracing::warn!("Circuit '{}' opened for {:?}", self.name, delay);
                }
            }
            State::HalfOpen { delay, .. } if trial => {
                let delay = inner.policy.mark_dead_on_failure().unwrap_or(delay);
                inner.state = State::Open {
                    until: Instant::now() + delay,
                    delay,
                };
                tracing::warn!(
                    "Circuit '{}' trial failed, reopened for {:?}",
                    self.name,
                    delay
                );
            }
            _ => {}
        }
    }
}

/// Admission ticket for one call through a [`CircuitBreaker`].
pub struct Permit<'a, P: FailurePolicy> {
    breaker: &'a CircuitBreaker<P>,
    trial: bool,
    settled: bool,
}

impl<'a, P: FailurePolicy> Permit<'a, P> {
    fn new(breaker: &'a CircuitBreaker<P>, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    /// Whether this call is the half-open trial.
    #[cfg(test)]
    fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.trial);
    }
}

impl<P: FailurePolicy> Drop for Permit<'_, P> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_failure(self.trial);
        }
    }
}
