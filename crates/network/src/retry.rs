// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Bounded retry of network operations.
//!
//! Retries are driven by an explicit state machine:
//!
//! ```text
//! Attempting(1) -> Succeeded
//!               -> Retrying(delay) -> Attempting(2) -> ... -> Failed
//! ```
//!
//! A run is bounded three ways: by the maximum number of attempts, by an optional
//! per-attempt timeout, and by an optional total elapsed budget.

use std::{future::Future, marker::PhantomData, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::backoff::ExponentialBackoff;

/// Message passed to the error factory when an operation is canceled.
pub const CANCELED_MESSAGE: &str = "canceled";

/// Configuration for retry behavior.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (total attempts = 1 initial + `max_retries`).
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
    /// Backoff multiplier factor.
    pub backoff_factor: f64,
    /// Maximum jitter in milliseconds to add to delays.
    pub jitter_ms: u64,
    /// Optional timeout for individual attempts in milliseconds.
    pub operation_timeout_ms: Option<u64>,
    /// Whether the first retry should happen immediately without delay.
    pub immediate_first: bool,
    /// Optional maximum total elapsed time for all attempts in milliseconds.
    pub max_elapsed_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
            backoff_factor: 2.0,
            jitter_ms: 500,
            operation_timeout_ms: Some(60_000),
            immediate_first: false,
            max_elapsed_ms: Some(300_000),
        }
    }
}

impl RetryConfig {
    /// Returns the total number of attempts allowed, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    fn backoff(&self) -> anyhow::Result<ExponentialBackoff> {
        ExponentialBackoff::new(
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.backoff_factor,
            self.jitter_ms,
            self.immediate_first,
        )
    }
}

/// The state of a single retried operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryState {
    /// Attempt number `n` (1-based) is in progress.
    Attempting(u32),
    /// Attempt `attempt` failed and the next one starts after `delay`.
    Retrying { attempt: u32, delay: Duration },
    /// The operation succeeded on attempt `attempts`.
    Succeeded { attempts: u32 },
    /// The operation failed terminally after `attempts` attempts.
    Failed { attempts: u32 },
}

impl RetryState {
    /// Returns whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }
}

/// Drives [`RetryState`] transitions for one operation.
#[derive(Debug)]
pub struct RetryMachine {
    state: RetryState,
    max_attempts: u32,
    max_elapsed: Option<Duration>,
    backoff: ExponentialBackoff,
    started: Instant,
}

impl RetryMachine {
    /// Creates a new machine in state `Attempting(1)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backoff parameters of `config` are invalid.
    pub fn new(config: &RetryConfig) -> anyhow::Result<Self> {
        Ok(Self {
            state: RetryState::Attempting(1),
            max_attempts: config.max_attempts(),
            max_elapsed: config.max_elapsed_ms.map(Duration::from_millis),
            backoff: config.backoff()?,
            started: Instant::now(),
        })
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> RetryState {
        self.state
    }

    /// Returns whether the total elapsed budget has been used up.
    #[must_use]
    pub fn budget_exhausted(&self) -> bool {
        self.max_elapsed
            .is_some_and(|budget| self.started.elapsed() > budget)
    }

    /// Records a successful attempt.
    pub fn on_success(&mut self) -> RetryState {
        if let RetryState::Attempting(n) = self.state {
            self.state = RetryState::Succeeded { attempts: n };
        }
        self.state
    }

    /// Records a failed attempt, moving to `Retrying` or `Failed`.
    pub fn on_failure(&mut self, retryable: bool) -> RetryState {
        self.on_failure_with_delay(retryable, None)
    }

    /// Records a failed attempt whose next retry must wait at least `min_delay`.
    ///
    /// A server hint may exceed the configured maximum delay, but never the remaining
    /// elapsed budget.
    pub fn on_failure_with_delay(
        &mut self,
        retryable: bool,
        min_delay: Option<Duration>,
    ) -> RetryState {
        let RetryState::Attempting(n) = self.state else {
            return self.state;
        };

        if !retryable || n >= self.max_attempts || self.budget_exhausted() {
            self.state = RetryState::Failed { attempts: n };
            return self.state;
        }

        let mut delay = self.backoff.next_duration();
        if let Some(hint) = min_delay {
            delay = delay.max(hint);
        }
        if let Some(budget) = self.max_elapsed {
            let remaining = budget.saturating_sub(self.started.elapsed());
            delay = delay.min(remaining);
        }
        self.state = RetryState::Retrying { attempt: n, delay };
        self.state
    }

    /// Moves from `Retrying` to the next `Attempting` state.
    pub fn next_attempt(&mut self) -> RetryState {
        if let RetryState::Retrying { attempt, .. } = self.state {
            self.state = RetryState::Attempting(attempt + 1);
        }
        self.state
    }

    /// Forces the machine into `Failed`.
    pub fn fail(&mut self) -> RetryState {
        let attempts = match self.state {
            RetryState::Attempting(n) => n,
            RetryState::Retrying { attempt, .. } => attempt,
            RetryState::Succeeded { attempts } | RetryState::Failed { attempts } => attempts,
        };
        self.state = RetryState::Failed { attempts };
        self.state
    }
}

/// Generic retry manager for network operations.
///
/// Stateless and thread-safe: each operation gets its own [`RetryMachine`].
#[derive(Debug)]
pub struct RetryManager<E> {
    config: RetryConfig,
    _phantom: PhantomData<E>,
}

impl<E> RetryManager<E>
where
    E: std::error::Error,
{
    /// Creates a new retry manager with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the backoff parameters of `config` are invalid.
    pub fn new(config: RetryConfig) -> anyhow::Result<Self> {
        config.backoff()?;
        Ok(Self {
            config,
            _phantom: PhantomData,
        })
    }

    /// Returns the configuration of this manager.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Executes an operation with retry logic.
    ///
    /// # Errors
    ///
    /// Returns the last error if the operation fails after exhausting all attempts,
    /// a timeout error if an attempt or the elapsed budget times out, or the
    /// operation's error as-is when `should_retry` rejects it.
    pub async fn execute_with_retry<F, Fut, T>(
        &self,
        operation_name: &str,
        operation: F,
        should_retry: impl Fn(&E) -> bool,
        create_error: impl Fn(String) -> E,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(operation_name, operation, should_retry, create_error, None)
            .await
    }

    /// Executes an operation with retry logic, aborting when `cancel` fires.
    ///
    /// On cancellation `create_error` is called with [`CANCELED_MESSAGE`].
    ///
    /// # Errors
    ///
    /// As [`Self::execute_with_retry`], plus the canceled error.
    pub async fn execute_with_retry_with_cancel<F, Fut, T>(
        &self,
        operation_name: &str,
        operation: F,
        should_retry: impl Fn(&E) -> bool,
        create_error: impl Fn(String) -> E,
        cancel: &CancellationToken,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(
            operation_name,
            operation,
            should_retry,
            create_error,
            Some(cancel),
        )
        .await
    }

    /// Executes an operation with retry logic, waiting at least as long as `retry_after`
    /// asks for before retrying a failed attempt, and aborting when `cancel` fires.
    ///
    /// # Errors
    ///
    /// As [`Self::execute_with_retry_with_cancel`].
    pub async fn execute_with_retry_after<F, Fut, T>(
        &self,
        operation_name: &str,
        operation: F,
        should_retry: impl Fn(&E) -> bool,
        retry_after: impl Fn(&E) -> Option<Duration>,
        create_error: impl Fn(String) -> E,
        cancel: &CancellationToken,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_with_hint(
            operation_name,
            operation,
            should_retry,
            retry_after,
            create_error,
            Some(cancel),
        )
        .await
    }

    async fn run<F, Fut, T>(
        &self,
        operation_name: &str,
        operation: F,
        should_retry: impl Fn(&E) -> bool,
        create_error: impl Fn(String) -> E,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_with_hint(
            operation_name,
            operation,
            should_retry,
            |_| None,
            create_error,
            cancel,
        )
        .await
    }

    async fn run_with_hint<F, Fut, T>(
        &self,
        operation_name: &str,
        mut operation: F,
        should_retry: impl Fn(&E) -> bool,
        retry_after: impl Fn(&E) -> Option<Duration>,
        create_error: impl Fn(String) -> E,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut machine = RetryMachine::new(&self.config)
            .map_err(|e| create_error(format!("Failed to create backoff: {e}")))?;
        let timeout = self.config.operation_timeout_ms.map(Duration::from_millis);

        loop {
            let attempt = match machine.state() {
                RetryState::Attempting(n) => n,
                RetryState::Retrying { attempt, delay } => {
                    tracing::debug!(
                        "Operation '{operation_name}' failed (attempt {attempt}), retrying in {delay:?}"
                    );
                    if wait_or_cancel(sleep_for(delay), cancel).await.is_none() {
                        return Err(create_error(CANCELED_MESSAGE.to_string()));
                    }
                    machine.next_attempt();
                    continue;
                }
                RetryState::Succeeded { .. } | RetryState::Failed { .. } => {
                    // Terminal states return from within the loop body
                    return Err(create_error(format!(
                        "Operation '{operation_name}' reached terminal state {:?}",
                        machine.state()
                    )));
                }
            };

            if attempt > 1 && machine.budget_exhausted() {
                tracing::warn!(
                    "Operation '{operation_name}' exceeded total time budget after {} attempts",
                    attempt - 1
                );
                machine.fail();
                return Err(create_error(format!(
                    "Operation '{operation_name}' exceeded total time budget of {}ms",
                    self.config.max_elapsed_ms.unwrap_or_default()
                )));
            }

            let attempt_future = async {
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, operation()).await.ok(),
                    None => Some(operation().await),
                }
            };

            let Some(outcome) = wait_or_cancel(attempt_future, cancel).await else {
                return Err(create_error(CANCELED_MESSAGE.to_string()));
            };

            let error = match outcome {
                Some(Ok(value)) => {
                    machine.on_success();
                    if attempt > 1 {
                        tracing::debug!(
                            "Operation '{operation_name}' succeeded after {attempt} attempts"
                        );
                    }
                    return Ok(value);
                }
                Some(Err(error)) => error,
                None => create_error(format!(
                    "Operation '{operation_name}' timed out after {}ms",
                    self.config.operation_timeout_ms.unwrap_or_default()
                )),
            };

            let retryable = should_retry(&error);
            let state = machine.on_failure_with_delay(retryable, retry_after(&error));
            if let RetryState::Failed { attempts } = state {
                if retryable {
                    tracing::warn!(
                        "Operation '{operation_name}' failed after {attempts} attempts: {error}"
                    );
                } else {
                    tracing::debug!(
                        "Operation '{operation_name}' failed with non-retryable error: {error}"
                    );
                }
                return Err(error);
            }
        }
    }
}

async fn sleep_for(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

async fn wait_or_cancel<Fut: Future>(
    future: Fut,
    cancel: Option<&CancellationToken>,
) -> Option<Fut::Output> {
    match cancel {
        Some(token) => {
            tokio::select! {
                () = token.cancelled() => None,
                output = future => Some(output),
            }
        }
        None => Some(future.await),
    }
}

/// Creates a retry manager tuned for rate-limited HTTP APIs.
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
pub fn create_http_retry_manager<E>() -> anyhow::Result<RetryManager<E>>
where
    E: std::error::Error,
{
    RetryManager::new(RetryConfig::default())
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use rstest::rstest;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("Retryable error: {0}")]
        Retryable(String),
        #[error("Non-retryable error: {0}")]
        NonRetryable(String),
        #[error("Timeout error: {0}")]
        Timeout(String),
    }

    fn should_retry_test_error(error: &TestError) -> bool {
        matches!(error, TestError::Retryable(_) | TestError::Timeout(_))
    }

    fn create_test_error(msg: String) -> TestError {
        TestError::Timeout(msg)
    }

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay_ms: 5,
            max_delay_ms: 20,
            backoff_factor: 2.0,
            jitter_ms: 0,
            operation_timeout_ms: None,
            immediate_first: false,
            max_elapsed_ms: None,
        }
    }

    #[rstest]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.max_attempts(), 5);
        assert!(!config.immediate_first);
        assert_eq!(config.max_elapsed_ms, Some(300_000));
    }

    #[rstest]
    fn test_retry_config_invalid_rejected() {
        let config = RetryConfig {
            initial_delay_ms: 20_000,
            max_delay_ms: 1_000,
            ..RetryConfig::default()
        };
        assert!(RetryManager::<TestError>::new(config).is_err());
    }

    #[tokio::test]
    async fn test_machine_transitions_to_failed_after_max_attempts() {
        let mut machine = RetryMachine::new(&fast_config(2)).unwrap();
        assert_eq!(machine.state(), RetryState::Attempting(1));

        assert!(matches!(
            machine.on_failure(true),
            RetryState::Retrying { attempt: 1, .. }
        ));
        assert_eq!(machine.next_attempt(), RetryState::Attempting(2));
        assert!(matches!(
            machine.on_failure(true),
            RetryState::Retrying { attempt: 2, .. }
        ));
        assert_eq!(machine.next_attempt(), RetryState::Attempting(3));
        assert_eq!(
            machine.on_failure(true),
            RetryState::Failed { attempts: 3 }
        );
        assert!(machine.state().is_terminal());
    }

    #[tokio::test]
    async fn test_machine_non_retryable_fails_immediately() {
        let mut machine = RetryMachine::new(&fast_config(5)).unwrap();
        assert_eq!(
            machine.on_failure(false),
            RetryState::Failed { attempts: 1 }
        );
    }

    #[tokio::test]
    async fn test_machine_server_hint_raises_delay() {
        let mut machine = RetryMachine::new(&fast_config(3)).unwrap();
        assert_eq!(
            machine.on_failure_with_delay(true, Some(Duration::from_secs(2))),
            RetryState::Retrying {
                attempt: 1,
                delay: Duration::from_secs(2)
            }
        );

        // A hint shorter than the backoff leaves the backoff in charge
        machine.next_attempt();
        assert_eq!(
            machine.on_failure_with_delay(true, Some(Duration::ZERO)),
            RetryState::Retrying {
                attempt: 2,
                delay: Duration::from_millis(10)
            }
        );
    }

    #[tokio::test]
    async fn test_machine_server_hint_capped_by_budget() {
        let config = RetryConfig {
            max_elapsed_ms: Some(1_000),
            ..fast_config(3)
        };
        let mut machine = RetryMachine::new(&config).unwrap();

        match machine.on_failure_with_delay(true, Some(Duration::from_secs(60))) {
            RetryState::Retrying { delay, .. } => assert!(delay <= Duration::from_secs(1)),
            other => panic!("expected retry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_machine_success() {
        let mut machine = RetryMachine::new(&fast_config(5)).unwrap();
        machine.on_failure(true);
        machine.next_attempt();
        assert_eq!(machine.on_success(), RetryState::Succeeded { attempts: 2 });
    }

    #[tokio::test]
    async fn test_retry_manager_success_first_attempt() {
        let manager = RetryManager::new(fast_config(3)).unwrap();

        let result = manager
            .execute_with_retry(
                "test_operation",
                || async { Ok::<i32, TestError>(42) },
                should_retry_test_error,
                create_test_error,
            )
            .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_manager_non_retryable_error() {
        let manager = RetryManager::new(fast_config(3)).unwrap();
        let calls = Arc::new(AtomicU32::new(0));

        let result = manager
            .execute_with_retry(
                "test_operation",
                || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err::<i32, TestError>(TestError::NonRetryable("bad".to_string()))
                    }
                },
                should_retry_test_error,
                create_test_error,
            )
            .await;

        assert!(matches!(result, Err(TestError::NonRetryable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_manager_succeeds_after_transient_failures() {
        let manager = RetryManager::new(fast_config(3)).unwrap();
        let calls = Arc::new(AtomicU32::new(0));

        let result = manager
            .execute_with_retry(
                "test_operation",
                || {
                    let calls = calls.clone();
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        if n < 3 {
                            Err(TestError::Retryable(format!("attempt {n}")))
                        } else {
                            Ok(n)
                        }
                    }
                },
                should_retry_test_error,
                create_test_error,
            )
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_manager_retryable_error_exhausted() {
        let manager = RetryManager::new(fast_config(2)).unwrap();
        let calls = Arc::new(AtomicU32::new(0));

        let result = manager
            .execute_with_retry(
                "test_operation",
                || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err::<i32, TestError>(TestError::Retryable("again".to_string()))
                    }
                },
                should_retry_test_error,
                create_test_error,
            )
            .await;

        assert!(matches!(result, Err(TestError::Retryable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_attempt_timeout_is_retried_then_reported() {
        let config = RetryConfig {
            operation_timeout_ms: Some(20),
            ..fast_config(1)
        };
        let manager = RetryManager::new(config).unwrap();

        let result = manager
            .execute_with_retry(
                "test_timeout",
                || async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok::<i32, TestError>(42)
                },
                should_retry_test_error,
                create_test_error,
            )
            .await;

        assert!(matches!(result, Err(TestError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_max_elapsed_time_budget() {
        let config = RetryConfig {
            max_retries: 100,
            initial_delay_ms: 20,
            max_delay_ms: 40,
            max_elapsed_ms: Some(100),
            ..fast_config(0)
        };
        let manager = RetryManager::new(config).unwrap();

        let start = Instant::now();
        let result = manager
            .execute_with_retry(
                "test_budget",
                || async { Err::<i32, TestError>(TestError::Retryable("again".to_string())) },
                should_retry_test_error,
                create_test_error,
            )
            .await;

        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_retry_after_hint_is_honored() {
        let manager = RetryManager::new(fast_config(1)).unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let token = CancellationToken::new();

        let start = Instant::now();
        let result = manager
            .execute_with_retry_after(
                "test_hint",
                || {
                    let calls = calls.clone();
                    async move {
                        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                            Err(TestError::Retryable("slow down".to_string()))
                        } else {
                            Ok(7)
                        }
                    }
                },
                should_retry_test_error,
                |_| Some(Duration::from_millis(150)),
                create_test_error,
                &token,
            )
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_backoff() {
        let config = RetryConfig {
            initial_delay_ms: 10_000,
            max_delay_ms: 10_000,
            ..fast_config(5)
        };
        let manager = RetryManager::new(config).unwrap();
        let token = CancellationToken::new();
        let cancel = token.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let result = manager
            .execute_with_retry_with_cancel(
                "test_cancel",
                || async { Err::<i32, TestError>(TestError::Retryable("again".to_string())) },
                should_retry_test_error,
                create_test_error,
                &token,
            )
            .await;

        match result {
            Err(TestError::Timeout(msg)) => assert_eq!(msg, CANCELED_MESSAGE),
            other => panic!("expected canceled error, got {other:?}"),
        }
    }
}
