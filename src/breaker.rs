//! Circuit breaker state machine.
//!
//! The breaker tracks the outcome of the most recent calls in a count-based
//! rolling window and trips when either the failure rate or the slow-call
//! rate reaches its threshold.
//!
//! ```text
//!            failure/slow rate >= threshold
//!   Closed ─────────────────────────────────▶ Open
//!     ▲                                        │
//!     │ N trial successes        wait elapsed  │
//!     │                                        ▼
//!     └────────────────────────────────── HalfOpen
//!                 trial failure ──▶ Open
//! ```
//!
//! The breaker knows nothing about HTTP; callers ask for permission, run the
//! call, and report the outcome with its duration. Time is read through the
//! [`Clock`] trait so transitions can be driven deterministically in tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

/// Source of monotonic time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// State of the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Thresholds and timings for a [`CircuitBreaker`].
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Number of most recent outcomes considered
    pub sliding_window_size: usize,

    /// Outcomes required in the window before rates are evaluated
    pub minimum_number_of_calls: usize,

    /// Failure percentage (0-100] that trips the breaker
    pub failure_rate_threshold: f64,

    /// Slow-call percentage (0-100] that trips the breaker
    pub slow_call_rate_threshold: f64,

    /// Calls taking at least this long count as slow
    pub slow_call_duration_threshold: Duration,

    /// Cool-down before an open circuit admits trial calls
    pub wait_duration_in_open_state: Duration,

    /// Trial calls admitted (and successes required) in half-open
    pub permitted_calls_in_half_open: usize,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            sliding_window_size: 10,
            minimum_number_of_calls: 5,
            failure_rate_threshold: 50.0,
            slow_call_rate_threshold: 100.0,
            slow_call_duration_threshold: Duration::from_secs(10),
            wait_duration_in_open_state: Duration::from_secs(30),
            permitted_calls_in_half_open: 1,
        }
    }
}

/// Permission to run one call, handed out by [`CircuitBreaker::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    /// Ordinary call on a closed circuit
    Normal,
    /// Half-open trial call, tagged with the half-open period it belongs to
    Trial(u64),
}

#[derive(Debug, Clone, Copy)]
struct Outcome {
    failed: bool,
    slow: bool,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    window: VecDeque<Outcome>,
    opened_at: Option<Instant>,
    trials_in_flight: usize,
    trial_successes: usize,
    half_open_epoch: u64,
}

/// Snapshot of the rolling window, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerMetrics {
    pub state: CircuitState,
    pub buffered_calls: usize,
    pub failed_calls: usize,
    pub slow_calls: usize,
}

/// Count-based circuit breaker safe to share across tasks.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    pub fn with_clock(name: impl Into<String>, config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let window = VecDeque::with_capacity(config.sliding_window_size);
        Self {
            name: name.into(),
            config,
            clock,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                window,
                opened_at: None,
                trials_in_flight: 0,
                trial_successes: 0,
                half_open_epoch: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current state. Read-only; only call outcomes move the state.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn metrics(&self) -> BreakerMetrics {
        let inner = self.inner.lock();
        BreakerMetrics {
            state: inner.state,
            buffered_calls: inner.window.len(),
            failed_calls: inner.window.iter().filter(|o| o.failed).count(),
            slow_calls: inner.window.iter().filter(|o| o.slow).count(),
        }
    }

    /// Ask to run a call. Returns `false` if the call must be rejected.
    pub fn try_acquire(&self) -> bool {
        self.acquire().is_some()
    }

    /// Ask to run a call, returning the permit it runs under.
    ///
    /// An open circuit whose cool-down has elapsed moves to half-open here
    /// and admits the caller as a trial. A trial permit must end in
    /// [`on_success`](Self::on_success), [`on_failure`](Self::on_failure)
    /// or [`release_trial`](Self::release_trial).
    pub fn acquire(&self) -> Option<Permit> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Some(Permit::Normal),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| self.clock.now().saturating_duration_since(at))
                    .unwrap_or_default();
                if elapsed >= self.config.wait_duration_in_open_state {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.trials_in_flight = 1;
                    Some(Permit::Trial(inner.half_open_epoch))
                } else {
                    info!(
                        breaker = %self.name,
                        at = %Utc::now().to_rfc3339(),
                        "Circuit breaker call not permitted - backend protection active"
                    );
                    None
                }
            }
            CircuitState::HalfOpen => {
                if inner.trials_in_flight < self.config.permitted_calls_in_half_open {
                    inner.trials_in_flight += 1;
                    Some(Permit::Trial(inner.half_open_epoch))
                } else {
                    info!(breaker = %self.name, "Circuit breaker half-open trial slots exhausted");
                    None
                }
            }
        }
    }

    /// Give back a permit whose call will never report an outcome.
    ///
    /// Frees the trial slot if the circuit is still in the half-open period
    /// the permit was issued for; otherwise does nothing.
    pub fn release_trial(&self, permit: Permit) {
        let Permit::Trial(epoch) = permit else {
            return;
        };

        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen && inner.half_open_epoch == epoch {
            inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
            debug!(
                breaker = %self.name,
                trials_in_flight = inner.trials_in_flight,
                "Abandoned half-open trial released"
            );
        }
    }

    /// Report a successful call that took `duration`.
    pub fn on_success(&self, duration: Duration) {
        let slow = duration >= self.config.slow_call_duration_threshold;
        self.record(Outcome { failed: false, slow });
    }

    /// Report a failed call that took `duration`.
    pub fn on_failure(&self, duration: Duration) {
        let slow = duration >= self.config.slow_call_duration_threshold;
        self.record(Outcome { failed: true, slow });
    }

    fn record(&self, outcome: Outcome) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                while inner.window.len() >= self.config.sliding_window_size.max(1) {
                    inner.window.pop_front();
                }
                inner.window.push_back(outcome);
                self.evaluate(&mut inner);
            }
            CircuitState::HalfOpen => {
                inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
                if outcome.failed {
                    self.transition(&mut inner, CircuitState::Open);
                } else {
                    inner.trial_successes += 1;
                    if inner.trial_successes >= self.config.permitted_calls_in_half_open {
                        self.transition(&mut inner, CircuitState::Closed);
                    }
                }
            }
            // Late result from a call admitted before the circuit opened
            CircuitState::Open => {}
        }
    }

    fn evaluate(&self, inner: &mut Inner) {
        let total = inner.window.len();
        if total < self.config.minimum_number_of_calls || total == 0 {
            return;
        }

        let failed = inner.window.iter().filter(|o| o.failed).count();
        let slow = inner.window.iter().filter(|o| o.slow).count();
        let failure_rate = failed as f64 * 100.0 / total as f64;
        let slow_rate = slow as f64 * 100.0 / total as f64;

        if failure_rate >= self.config.failure_rate_threshold {
            error!(
                breaker = %self.name,
                rate = failure_rate,
                threshold = self.config.failure_rate_threshold,
                "Circuit breaker failure rate exceeded"
            );
            self.transition(inner, CircuitState::Open);
        } else if slow_rate >= self.config.slow_call_rate_threshold {
            warn!(
                breaker = %self.name,
                rate = slow_rate,
                threshold = self.config.slow_call_rate_threshold,
                "Circuit breaker slow call rate exceeded"
            );
            self.transition(inner, CircuitState::Open);
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        if from == to {
            return;
        }

        inner.state = to;
        inner.trials_in_flight = 0;
        inner.trial_successes = 0;
        match to {
            CircuitState::Open => inner.opened_at = Some(self.clock.now()),
            CircuitState::Closed => {
                inner.opened_at = None;
                inner.window.clear();
            }
            CircuitState::HalfOpen => inner.half_open_epoch += 1,
        }

        warn!(
            breaker = %self.name,
            from = %from,
            to = %to,
            at = %Utc::now().to_rfc3339(),
            "Circuit breaker state transition"
        );
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Manually advanced clock for driving the breaker in tests.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}
