//! Timeout and retry wrappers for calls that cross into the accessibility provider.
//!
//! Every provider call runs on a short-lived worker thread and is awaited with a
//! deadline. A worker that misses its deadline is abandoned, not killed: the
//! provider may still complete the call later, so a [`NavigationError::Timeout`]
//! means "outcome unknown", never "nothing happened".

use crate::errors::NavigationError;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Bounded retry settings. Construct with [`RetryPolicy::new`] so the attempt
/// count is always validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self, NavigationError> {
        if max_attempts < 1 {
            return Err(NavigationError::Validation(format!(
                "max attempts must be at least 1, got {max_attempts}"
            )));
        }
        Ok(Self {
            max_attempts,
            delay,
        })
    }

    /// A single attempt, no delay.
    pub const fn once() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(250),
        }
    }
}

/// Deadlines and retry settings used by the tree model and the navigator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Deadline for a single navigation call (applications, windows, roots).
    pub call_timeout: Duration,
    /// Deadline for loading the children of one element.
    pub element_timeout: Duration,
    /// Budget for a whole-tree walk (find, tree display, registry rebuild).
    pub walk_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(2),
            element_timeout: Duration::from_millis(500),
            walk_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

impl ExecutorConfig {
    /// Runs a navigation call with the configured timeout and retry policy.
    pub fn call<T, F>(&self, what: &str, operation: F) -> Result<T, NavigationError>
    where
        F: Fn() -> Result<T, NavigationError> + Send + Sync + 'static,
        T: Send + 'static,
    {
        retry_with_policy(what, &self.retry, timed(what, self.call_timeout, operation))
    }
}

/// Runs `operation` on a worker thread and waits at most `timeout` for it.
pub fn run_with_timeout<T, F>(
    what: &str,
    timeout: Duration,
    operation: F,
) -> Result<T, NavigationError>
where
    F: FnOnce() -> Result<T, NavigationError> + Send + 'static,
    T: Send + 'static,
{
    let (sender, receiver) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name(format!("axnav-{what}"))
        .spawn(move || {
            // The receiver is gone if the caller already gave up.
            let _ = sender.send(operation());
        });
    if let Err(e) = spawned {
        return Err(NavigationError::ProviderError(format!(
            "{what}: could not start worker: {e}"
        )));
    }

    match receiver.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            debug!("{what} did not finish within {timeout:?}, abandoning worker");
            Err(NavigationError::timeout(what, timeout))
        }
        Err(RecvTimeoutError::Disconnected) => Err(NavigationError::ProviderError(format!(
            "{what}: worker stopped without a result"
        ))),
    }
}

/// Runs `operation` up to `max_attempts` times, sleeping `delay` between
/// failed attempts. Returns the first success or the last error.
pub fn run_with_retry<T, F>(
    what: &str,
    max_attempts: u32,
    delay: Duration,
    operation: F,
) -> Result<T, NavigationError>
where
    F: FnMut() -> Result<T, NavigationError>,
{
    let policy = RetryPolicy::new(max_attempts, delay)?;
    retry_with_policy(what, &policy, operation)
}

/// Retry where every attempt is itself bounded by `timeout`. A timed-out
/// attempt counts as a failure and is retried like any other.
pub fn run_with_timeout_and_retry<T, F>(
    what: &str,
    timeout: Duration,
    max_attempts: u32,
    delay: Duration,
    operation: F,
) -> Result<T, NavigationError>
where
    F: Fn() -> Result<T, NavigationError> + Send + Sync + 'static,
    T: Send + 'static,
{
    let policy = RetryPolicy::new(max_attempts, delay)?;
    retry_with_policy(what, &policy, timed(what, timeout, operation))
}

fn timed<T, F>(
    what: &str,
    timeout: Duration,
    operation: F,
) -> impl FnMut() -> Result<T, NavigationError>
where
    F: Fn() -> Result<T, NavigationError> + Send + Sync + 'static,
    T: Send + 'static,
{
    let operation = Arc::new(operation);
    let what = what.to_string();
    move || {
        let operation = Arc::clone(&operation);
        run_with_timeout(&what, timeout, move || (*operation)())
    }
}

fn retry_with_policy<T, F>(
    what: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, NavigationError>
where
    F: FnMut() -> Result<T, NavigationError>,
{
    let mut attempt = 1;
    loop {
        match operation() {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{what} succeeded on attempt {attempt}");
                }
                return Ok(value);
            }
            Err(e) if attempt < policy.max_attempts => {
                warn!(
                    "{what} failed on attempt {}/{}. Retrying... Error: {}",
                    attempt, policy.max_attempts, e
                );
                thread::sleep(policy.delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Cooperative deadline for work that has to stay on the calling thread, such
/// as walks that lazily grow the element tree.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.budget
    }

    pub fn check(&self, what: &str) -> Result<(), NavigationError> {
        if self.expired() {
            Err(NavigationError::timeout(what, self.budget))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_retry_policy_rejects_zero_attempts() {
        let err = RetryPolicy::new(0, Duration::ZERO).unwrap_err();
        assert!(matches!(err, NavigationError::Validation(_)));
    }

    #[test]
    fn test_run_with_retry_validates_before_calling() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = run_with_retry("noop", 0, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(matches!(result, Err(NavigationError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_timeout_returns_value_when_fast() {
        let value = run_with_timeout("fast", Duration::from_secs(1), || Ok(42)).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_timeout_passes_operation_error_through() {
        let err = run_with_timeout::<(), _>("failing", Duration::from_secs(1), || {
            Err(NavigationError::ProviderError("cannot complete".into()))
        })
        .unwrap_err();
        assert_eq!(
            err,
            NavigationError::ProviderError("cannot complete".into())
        );
    }

    #[test]
    fn test_panicking_worker_is_a_provider_error() {
        let err = run_with_timeout::<(), _>("panicky", Duration::from_secs(1), || {
            panic!("provider blew up")
        })
        .unwrap_err();
        assert!(matches!(err, NavigationError::ProviderError(_)));
    }

    #[test]
    fn test_deadline_expires() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.expired());
        assert!(deadline.check("walk").unwrap_err().is_timeout());

        let generous = Deadline::after(Duration::from_secs(60));
        assert!(generous.check("walk").is_ok());
        assert!(generous.remaining() > Duration::from_secs(59));
    }
}
