// CrashSleuth - app/executor.rs
//
// Resilient retry wrapper. Wraps a fallible operation with retry-on-failure
// and immediate short-circuit on cancellation, distinct from an ordinary
// error per §4.7/§9 ("cancellation is distinct from error").

use crate::util::constants;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for `ResilientExecutor`.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: constants::DEFAULT_MAX_RETRIES,
            backoff: Duration::from_millis(constants::DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

/// Outcome of a resilient-executor run.
pub enum ExecutorOutcome<T, E> {
    Succeeded(T),
    Cancelled,
    Failed(E),
}

/// Wraps an operation with retry and cancellation short-circuit.
pub struct ResilientExecutor {
    config: ExecutorConfig,
}

impl ResilientExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Runs `f` under retry/backoff, tagging the attempt with `key` for
    /// logging. `cancel` is checked before each attempt; a cancellation never
    /// counts against the retry budget and is never itself retried.
    pub fn run<T, E, F>(&self, key: &str, cancel: &Arc<AtomicBool>, mut f: F) -> ExecutorOutcome<T, E>
    where
        F: FnMut() -> Result<T, E>,
    {
        let mut attempt = 0;
        loop {
            if cancel.load(Ordering::SeqCst) {
                tracing::debug!(key, "cancelled before attempt");
                return ExecutorOutcome::Cancelled;
            }

            match f() {
                Ok(value) => return ExecutorOutcome::Succeeded(value),
                Err(err) => {
                    if attempt >= self.config.max_retries {
                        tracing::warn!(key, attempt, "retries exhausted");
                        return ExecutorOutcome::Failed(err);
                    }
                    attempt += 1;
                    tracing::debug!(key, attempt, "retrying after failure");
                    std::thread::sleep(self.config.backoff * attempt);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn succeeds_without_retry_on_first_try() {
        let executor = ResilientExecutor::new(ExecutorConfig::default());
        let cancel = Arc::new(AtomicBool::new(false));
        let result: ExecutorOutcome<i32, &str> =
            executor.run("op", &cancel, || Ok::<i32, &str>(42));
        assert!(matches!(result, ExecutorOutcome::Succeeded(42)));
    }

    #[test]
    fn retries_up_to_max_then_fails() {
        let executor = ResilientExecutor::new(ExecutorConfig {
            max_retries: 2,
            backoff: Duration::from_millis(1),
        });
        let cancel = Arc::new(AtomicBool::new(false));
        let attempts = AtomicU32::new(0);
        let result: ExecutorOutcome<i32, &str> = executor.run("op", &cancel, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err("boom")
        });
        assert!(matches!(result, ExecutorOutcome::Failed("boom")));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn cancellation_short_circuits_without_retry() {
        let executor = ResilientExecutor::new(ExecutorConfig::default());
        let cancel = Arc::new(AtomicBool::new(true));
        let attempts = AtomicU32::new(0);
        let result: ExecutorOutcome<i32, &str> = executor.run("op", &cancel, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err("boom")
        });
        assert!(matches!(result, ExecutorOutcome::Cancelled));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }
}
