//! Classification-aware retry for single remote calls.
//!
//! [`RetryExecutor::execute`] runs an operation, asks the store's classifier
//! whether a failure is transient, and if so sleeps through the next delay of
//! an exponential schedule before trying again. The schedule comes from a
//! `backon` [`ExponentialBuilder`] with jitter off, so the delays are exact:
//! with the defaults, 1s, 2s, 4s.
//!
//! Every attempt, wait, give-up and fatal short-circuit is reported to an
//! observer as a [`RetryEvent`]. The default observer logs them.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};

use leadsync_core::config::RetrySettings;
use leadsync_core::ErrorClass;

/// Upper bound for a single backoff wait.
pub const MAX_DELAY: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: usize,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied to each following delay.
    pub factor: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            factor: 2.0,
        }
    }
}

impl From<RetrySettings> for RetryPolicy {
    fn from(settings: RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            ..Self::default()
        }
    }
}

impl RetryPolicy {
    /// Build the backoff strategy for this policy.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(MAX_DELAY)
            .with_factor(self.factor)
            .with_max_times(self.max_retries)
    }

    /// The full list of waits a call that keeps failing would go through.
    pub fn schedule(&self) -> Vec<Duration> {
        self.backoff().build().collect()
    }
}

// ---------------------------------------------------------------------------
// Sleeping
// ---------------------------------------------------------------------------

pub trait Sleeper: Send + Sync {
    fn sleep(&self, delay: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Records requested delays without sleeping.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, delay: Duration) {
        match self.slept.lock() {
            Ok(mut slept) => slept.push(delay),
            Err(e) => e.into_inner().push(delay),
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Side-channel notification about one step of a retried call.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryEvent<'a> {
    /// About to run attempt number `attempt` (1-based).
    Attempt { operation: &'a str, attempt: usize },
    /// Attempt failed with a retryable error; waiting `delay` before the next.
    Backoff {
        operation: &'a str,
        attempt: usize,
        delay: Duration,
        error: String,
    },
    /// Retryable failures exhausted the schedule.
    GaveUp {
        operation: &'a str,
        attempts: usize,
        error: String,
    },
    /// A fatal error stopped the call without retrying.
    Fatal {
        operation: &'a str,
        attempt: usize,
        error: String,
    },
}

pub type RetryObserver = Arc<dyn Fn(&RetryEvent<'_>) + Send + Sync>;

/// Observer that writes every event to the log.
pub fn log_event(event: &RetryEvent<'_>) {
    match event {
        RetryEvent::Attempt { operation, attempt } => {
            if *attempt > 1 {
                tracing::debug!("{operation}: attempt {attempt}");
            }
        }
        RetryEvent::Backoff {
            operation,
            attempt,
            delay,
            error,
        } => tracing::warn!(
            "{operation}: transient failure on attempt {attempt} ({error}), retrying in {delay:?}"
        ),
        RetryEvent::GaveUp {
            operation,
            attempts,
            error,
        } => tracing::error!("{operation}: giving up after {attempts} attempts: {error}"),
        RetryEvent::Fatal {
            operation,
            attempt,
            error,
        } => tracing::debug!("{operation}: fatal error on attempt {attempt}: {error}"),
    }
}

/// What happened during one [`RetryExecutor::execute_traced`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryOutcome {
    pub attempts: usize,
    pub delays: Vec<Duration>,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    observer: RetryObserver,
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(ThreadSleeper),
            observer: Arc::new(log_event),
        }
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn with_observer(
        mut self,
        observer: impl Fn(&RetryEvent<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op`, retrying while `classify` says the error is retryable and
    /// the schedule has delays left. The last error is returned on
    /// exhaustion.
    pub fn execute<T, E, F, C>(&self, operation: &str, op: F, classify: C) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        C: Fn(&E) -> ErrorClass,
        E: fmt::Display,
    {
        self.execute_traced(operation, op, classify).0
    }

    /// Like [`Self::execute`], also returning attempt count and delays slept.
    pub fn execute_traced<T, E, F, C>(
        &self,
        operation: &str,
        mut op: F,
        classify: C,
    ) -> (Result<T, E>, RetryOutcome)
    where
        F: FnMut() -> Result<T, E>,
        C: Fn(&E) -> ErrorClass,
        E: fmt::Display,
    {
        let mut schedule = self.policy.backoff().build();
        let mut outcome = RetryOutcome::default();

        loop {
            outcome.attempts += 1;
            (self.observer)(&RetryEvent::Attempt {
                operation,
                attempt: outcome.attempts,
            });

            let err = match op() {
                Ok(value) => return (Ok(value), outcome),
                Err(err) => err,
            };

            if classify(&err) == ErrorClass::Fatal {
                (self.observer)(&RetryEvent::Fatal {
                    operation,
                    attempt: outcome.attempts,
                    error: err.to_string(),
                });
                return (Err(err), outcome);
            }

            match schedule.next() {
                Some(delay) => {
                    (self.observer)(&RetryEvent::Backoff {
                        operation,
                        attempt: outcome.attempts,
                        delay,
                        error: err.to_string(),
                    });
                    self.sleeper.sleep(delay);
                    outcome.delays.push(delay);
                }
                None => {
                    (self.observer)(&RetryEvent::GaveUp {
                        operation,
                        attempts: outcome.attempts,
                        error: err.to_string(),
                    });
                    return (Err(err), outcome);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
