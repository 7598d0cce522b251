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

//! Two-tier admission control for page requests.
//!
//! Instruments and windows fan out under the `I * W` limits of [`BackfillConfig`], but
//! every page request additionally takes one permit from a single global semaphore of
//! size `G`. Nesting can therefore never push simultaneous requests above `G`.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::{
    config::BackfillConfig,
    error::{ConfigError, FetchError},
    model::{SeqWindow, TimeWindow, TradeRecord},
    source::TradeSource,
};

/// Bounds in-flight requests and applies the task deadline.
#[derive(Debug)]
pub struct ConcurrencyScheduler {
    permits: Arc<Semaphore>,
    max_in_flight: usize,
    max_instruments: usize,
    max_windows: usize,
    task_timeout: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    admitted: AtomicUsize,
}

impl ConcurrencyScheduler {
    /// Creates a new [`ConcurrencyScheduler`] from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid, including when
    /// `max_instruments * max_windows_per_instrument > max_in_flight`.
    pub fn new(config: &BackfillConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            permits: Arc::new(Semaphore::new(config.max_in_flight)),
            max_in_flight: config.max_in_flight,
            max_instruments: config.max_instruments,
            max_windows: config.max_windows_per_instrument,
            task_timeout: config.task_timeout(),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            admitted: AtomicUsize::new(0),
        })
    }

    /// Returns the global in-flight ceiling `G`.
    #[must_use]
    pub const fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Returns the number of instruments processed concurrently.
    #[must_use]
    pub const fn max_instruments(&self) -> usize {
        self.max_instruments
    }

    /// Returns the number of windows processed concurrently per instrument.
    #[must_use]
    pub const fn max_windows(&self) -> usize {
        self.max_windows
    }

    /// Returns the number of requests currently holding a permit.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Returns the highest number of requests which held a permit at once.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Acquire)
    }

    /// Returns the total number of requests admitted.
    #[must_use]
    pub fn admitted(&self) -> usize {
        self.admitted.load(Ordering::Acquire)
    }

    /// Stops admitting requests; waiting and future requests fail as canceled.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Runs `request` once a global permit is available.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Canceled`] if the scheduler was closed, otherwise the
    /// result of `request`.
    pub async fn admit<F, T>(&self, request: F) -> Result<T, FetchError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::Canceled("scheduler closed".to_string()))?;

        self.admitted.fetch_add(1, Ordering::AcqRel);
        let current = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::AcqRel);
        let _slot = InFlightSlot(&self.in_flight);

        request.await
    }

    /// Runs a window task under the task deadline.
    ///
    /// Expiry drops the task, releasing any permit it holds.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Timeout`] if the deadline expires, otherwise the result of
    /// `task`.
    pub async fn run_task<F, T>(&self, label: &str, task: F) -> Result<T, FetchError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        match self.task_timeout {
            Some(deadline) => tokio::time::timeout(deadline, task)
                .await
                .map_err(|_| {
                    tracing::warn!("Task {label} exceeded deadline of {deadline:?}");
                    FetchError::Timeout(format!("{label} exceeded {}ms", deadline.as_millis()))
                })?,
            None => task.await,
        }
    }

    /// Wraps `source` so that every call is admitted by this scheduler.
    #[must_use]
    pub const fn wrap<'a, S: ?Sized>(&'a self, source: &'a S) -> ScheduledSource<'a, S> {
        ScheduledSource {
            source,
            scheduler: self,
        }
    }
}

struct InFlightSlot<'a>(&'a AtomicUsize);

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A [`TradeSource`] whose calls each hold one global permit.
#[derive(Debug)]
pub struct ScheduledSource<'a, S: ?Sized> {
    source: &'a S,
    scheduler: &'a ConcurrencyScheduler,
}

#[async_trait]
impl<S> TradeSource for ScheduledSource<'_, S>
where
    S: TradeSource + ?Sized,
{
    async fn fetch_trades_by_time(
        &self,
        instrument: &str,
        window: TimeWindow,
        count: usize,
    ) -> Result<Vec<TradeRecord>, FetchError> {
        self.scheduler
            .admit(self.source.fetch_trades_by_time(instrument, window, count))
            .await
    }

    async fn fetch_trades_by_seq(
        &self,
        instrument: &str,
        window: SeqWindow,
        count: usize,
    ) -> Result<Vec<TradeRecord>, FetchError> {
        self.scheduler
            .admit(self.source.fetch_trades_by_seq(instrument, window, count))
            .await
    }

    async fn fetch_latest_seq(
        &self,
        instrument: &str,
        end_ms: i64,
    ) -> Result<Option<i64>, FetchError> {
        self.scheduler
            .admit(self.source.fetch_latest_seq(instrument, end_ms))
            .await
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use futures::{StreamExt, stream};
    use rstest::rstest;

    use super::*;
    use crate::testing::StubTradeSource;

    fn config(max_in_flight: usize) -> BackfillConfig {
        BackfillConfig {
            max_in_flight,
            max_instruments: 1,
            max_windows_per_instrument: 1,
            ..Default::default()
        }
    }

    #[rstest]
    fn test_rejects_fan_out_above_budget() {
        let config = BackfillConfig {
            max_in_flight: 10,
            max_instruments: 4,
            max_windows_per_instrument: 3,
            ..Default::default()
        };

        assert!(matches!(
            ConcurrencyScheduler::new(&config),
            Err(ConfigError::FanOutExceedsBudget { .. })
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn test_admit_counts_requests() {
        let scheduler = ConcurrencyScheduler::new(&config(2)).unwrap();

        let value = scheduler.admit(async { Ok::<_, FetchError>(7) }).await;

        assert_eq!(value, Ok(7));
        assert_eq!(scheduler.admitted(), 1);
        assert_eq!(scheduler.in_flight(), 0);
        assert_eq!(scheduler.peak_in_flight(), 1);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_peak_never_exceeds_ceiling() {
        let scheduler = ConcurrencyScheduler::new(&config(3)).unwrap();
        let source = StubTradeSource::with_tape("X", (1..=10).map(|seq| (seq, seq)))
            .with_latency(Duration::from_millis(10), 20);
        let scheduled = scheduler.wrap(&source);

        let results: Vec<_> = stream::iter(0..50)
            .map(|i| scheduled.fetch_latest_seq("X", i))
            .buffer_unordered(50)
            .collect()
            .await;

        assert_eq!(results.len(), 50);
        assert_eq!(source.request_count(), 50);
        assert_eq!(scheduler.peak_in_flight(), 3);
        assert!(source.peak_in_flight() <= 3);
    }

    #[rstest]
    #[tokio::test]
    async fn test_closed_scheduler_cancels() {
        let scheduler = ConcurrencyScheduler::new(&config(1)).unwrap();
        scheduler.close();

        let result = scheduler.admit(async { Ok::<_, FetchError>(()) }).await;

        assert!(matches!(result, Err(FetchError::Canceled(_))));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_task_deadline_marks_timeout() {
        let config = BackfillConfig {
            task_timeout_ms: Some(100),
            ..config(1)
        };
        let scheduler = ConcurrencyScheduler::new(&config).unwrap();

        let result = scheduler
            .run_task("X [0, 1]", async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, FetchError>(())
            })
            .await;

        assert!(matches!(result, Err(FetchError::Timeout(_))));
    }
}
