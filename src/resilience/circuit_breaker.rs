//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: downstream assumed down, requests fail fast
//! - Half-Open: a bounded number of trial requests probe recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: ready_to_trip(counts) after a failure
//! Open → Half-Open: first call (or state read) once `timeout` has elapsed
//! Half-Open → Closed: consecutive successes reach max_requests
//! Half-Open → Open: any trial failure
//! ```
//!
//! # Design Decisions
//! - Counts reset on every transition (a new "generation")
//! - Outcomes from an older generation are ignored
//! - All reads and transitions happen under one mutex, never held across `.await`

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CONSECUTIVE_FAILURES: u32 = 5;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    HalfOpen,
    Open,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Closed => write!(f, "closed"),
            State::HalfOpen => write!(f, "half-open"),
            State::Open => write!(f, "open"),
        }
    }
}

/// Request outcome counters for the current generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }

    fn clear(&mut self) {
        *self = Counts::default();
    }
}

/// Predicate over the closed-state counts deciding when to open.
pub type TripPredicate = Arc<dyn Fn(&Counts) -> bool + Send + Sync>;

/// Breaker construction settings.
#[derive(Clone)]
pub struct Settings {
    /// Name used in logs and rejection errors.
    pub name: String,
    /// Trial requests admitted while half-open; also the success count that closes. 0 means 1.
    pub max_requests: u32,
    /// Period after which closed-state counts are cleared. Zero never clears.
    pub interval: Duration,
    /// How long the breaker stays open before probing. Zero means 60s.
    pub timeout: Duration,
    /// Trip predicate. `None` trips when consecutive failures exceed 5.
    pub ready_to_trip: Option<TripPredicate>,
}

impl Settings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_requests: 0,
            interval: Duration::ZERO,
            timeout: Duration::ZERO,
            ready_to_trip: None,
        }
    }

    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self::new(config.name.clone())
            .with_max_requests(config.max_requests)
            .with_interval(Duration::from_secs(config.interval_secs))
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_failure_threshold(config.consecutive_failures.saturating_add(1))
    }

    pub fn with_max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_ready_to_trip<F>(mut self, ready_to_trip: F) -> Self
    where
        F: Fn(&Counts) -> bool + Send + Sync + 'static,
    {
        self.ready_to_trip = Some(Arc::new(ready_to_trip));
        self
    }

    /// Trip once `threshold` consecutive failures have been observed.
    pub fn with_failure_threshold(self, threshold: u32) -> Self {
        let threshold = threshold.max(1);
        self.with_ready_to_trip(move |counts| counts.consecutive_failures >= threshold)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("name", &self.name)
            .field("max_requests", &self.max_requests)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("custom_trip", &self.ready_to_trip.is_some())
            .finish()
    }
}

/// Why the breaker refused to run an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The breaker is open.
    Open,
    /// Half-open and every trial slot is taken.
    TooManyRequests,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Open => write!(f, "circuit is open"),
            Rejection::TooManyRequests => write!(f, "too many half-open trial requests"),
        }
    }
}

/// Synthesized error for calls the breaker did not attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("circuit breaker '{breaker}' rejected the call: {reason}")]
pub struct BreakerRejected {
    pub breaker: String,
    pub reason: Rejection,
}

#[derive(Debug)]
struct Inner {
    state: State,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
    opened_at: Option<Instant>,
}

/// Thread-safe circuit breaker. Share one instance per downstream via `Arc`.
pub struct CircuitBreaker {
    name: String,
    max_requests: u32,
    interval: Duration,
    timeout: Duration,
    ready_to_trip: TripPredicate,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(settings: Settings) -> Self {
        let interval = settings.interval;
        let now = Instant::now();
        let ready_to_trip: TripPredicate = match settings.ready_to_trip {
            Some(ready_to_trip) => ready_to_trip,
            None => Arc::new(|counts: &Counts| {
                counts.consecutive_failures > DEFAULT_CONSECUTIVE_FAILURES
            }),
        };
        Self {
            name: settings.name,
            max_requests: settings.max_requests.max(1),
            interval,
            timeout: if settings.timeout.is_zero() {
                DEFAULT_TIMEOUT
            } else {
                settings.timeout
            },
            ready_to_trip,
            inner: Mutex::new(Inner {
                state: State::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry: (!interval.is_zero()).then(|| now + interval),
                opened_at: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, applying any due Open → Half-Open or interval transition.
    pub fn state(&self) -> State {
        let mut inner = self.lock();
        self.current_state(&mut inner, Instant::now()).0
    }

    /// Counts of the current generation.
    pub fn counts(&self) -> Counts {
        self.lock().counts
    }

    /// When the breaker last opened, if it is open.
    pub fn opened_at(&self) -> Option<Instant> {
        let inner = self.lock();
        match inner.state {
            State::Open => inner.opened_at,
            _ => None,
        }
    }

    /// Run `op` if the breaker admits it.
    ///
    /// The operation's own error is returned unchanged; a refusal is reported
    /// as `E::from(BreakerRejected)` without invoking `op`. An operation whose
    /// future is dropped before completing counts as a failure.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<BreakerRejected>,
    {
        let generation = self.before_request().map_err(E::from)?;
        let mut guard = Outcome {
            breaker: self,
            generation,
            recorded: false,
        };

        let result = op().await;
        guard.record(result.is_ok());
        result
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }

    fn before_request(&self) -> Result<u64, BreakerRejected> {
        let mut inner = self.lock();
        let (state, generation) = self.current_state(&mut inner, Instant::now());

        let rejection = match state {
            State::Open => Some(Rejection::Open),
            State::HalfOpen if inner.counts.requests >= self.max_requests => {
                Some(Rejection::TooManyRequests)
            }
            _ => None,
        };
        if let Some(reason) = rejection {
            metrics::record_breaker_rejection(&self.name);
            return Err(BreakerRejected {
                breaker: self.name.clone(),
                reason,
            });
        }

        inner.counts.on_request();
        Ok(generation)
    }

    fn after_request(&self, before: u64, success: bool) {
        let mut inner = self.lock();
        let now = Instant::now();
        let (state, generation) = self.current_state(&mut inner, now);
        if generation != before {
            return;
        }

        if success {
            inner.counts.on_success();
            if state == State::HalfOpen && inner.counts.consecutive_successes >= self.max_requests {
                self.set_state(&mut inner, State::Closed, now);
            }
        } else {
            inner.counts.on_failure();
            match state {
                State::Closed if (self.ready_to_trip)(&inner.counts) => {
                    self.set_state(&mut inner, State::Open, now);
                }
                State::HalfOpen => self.set_state(&mut inner, State::Open, now),
                _ => {}
            }
        }
    }

    fn current_state(&self, inner: &mut Inner, now: Instant) -> (State, u64) {
        match inner.state {
            State::Closed => {
                if matches!(inner.expiry, Some(expiry) if expiry <= now) {
                    self.new_generation(inner, now);
                }
            }
            State::Open => {
                if matches!(inner.expiry, Some(expiry) if expiry <= now) {
                    self.set_state(inner, State::HalfOpen, now);
                }
            }
            State::HalfOpen => {}
        }
        (inner.state, inner.generation)
    }

    fn set_state(&self, inner: &mut Inner, state: State, now: Instant) {
        if inner.state == state {
            return;
        }
        let from = inner.state;
        inner.state = state;
        inner.opened_at = (state == State::Open).then_some(now);
        self.new_generation(inner, now);

        if state == State::Open {
            tracing::warn!(breaker = %self.name, %from, to = %state, "Circuit breaker opened");
        } else {
            tracing::info!(breaker = %self.name, %from, to = %state, "Circuit breaker state changed");
        }
        metrics::record_breaker_transition(&self.name, state);
    }

    fn new_generation(&self, inner: &mut Inner, now: Instant) {
        inner.generation = inner.generation.wrapping_add(1);
        inner.counts.clear();
        inner.expiry = match inner.state {
            State::Closed => (!self.interval.is_zero()).then(|| now + self.interval),
            State::Open => Some(now + self.timeout),
            State::HalfOpen => None,
        };
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("max_requests", &self.max_requests)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("inner", &*self.lock())
            .finish()
    }
}

/// Records exactly one outcome per admitted request.
struct Outcome<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    recorded: bool,
}

impl Outcome<'_> {
    fn record(&mut self, success: bool) {
        self.recorded = true;
        self.breaker.after_request(self.generation, success);
    }
}

impl Drop for Outcome<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            self.breaker.after_request(self.generation, false);
        }
    }
}
