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

//! Drives instruments through planning, fetching, merging and persistence.
//!
//! Each instrument moves through the states
//! `Discovered -> Planning -> Fetching -> Merging -> Persisted | Failed`.
//! An instrument fails only when every planned window fails, when its plan cannot be
//! made, or when the sink rejects its output. Windows which fail while others succeed
//! are reported as gaps.

use std::collections::HashMap;

use futures::{Stream, StreamExt, stream};
use strum::{AsRefStr, Display as StrumDisplay};
use tapefill_core::{ReferenceTime, fsm::FiniteStateMachine};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{BackfillConfig, PaginationMode, Partitioning},
    error::{ConfigError, FetchError},
    model::{BackfillResult, Instrument, SeqWindow, TradeRecord, Window, WindowGap},
    planner::WindowPlanner,
    scheduler::{ConcurrencyScheduler, ScheduledSource},
    sink::OutputSink,
    source::TradeSource,
    walker::{PageWalker, WalkOutcome},
};

/// Whether instrument ranges are clamped to a frozen reference time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotMode {
    /// Instruments have expired; their full range is fetched.
    Historical,
    /// Instruments may still trade; ranges end at the captured reference time.
    Live(ReferenceTime),
}

impl SnapshotMode {
    /// Returns the reference time of a live snapshot.
    #[must_use]
    pub const fn reference(&self) -> Option<ReferenceTime> {
        match self {
            Self::Historical => None,
            Self::Live(reference) => Some(*reference),
        }
    }
}

/// The lifecycle state of one instrument within a run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, StrumDisplay, AsRefStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum InstrumentState {
    /// Known to the run, not yet started.
    Discovered,
    /// Windows are being planned.
    Planning,
    /// Windows are being paginated.
    Fetching,
    /// Window results are being merged and handed to the sink.
    Merging,
    /// Output was persisted, possibly with gaps.
    Persisted,
    /// No output could be produced.
    Failed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
enum InstrumentTrigger {
    Plan,
    Fetch,
    Merge,
    Persist,
    Fail,
}

fn instrument_fsm() -> anyhow::Result<FiniteStateMachine<InstrumentState, InstrumentTrigger>> {
    use InstrumentState::{Discovered, Failed, Fetching, Merging, Persisted, Planning};
    use InstrumentTrigger::{Fail, Fetch, Merge, Persist, Plan};

    let table = HashMap::from([
        ((Discovered, Plan), Planning),
        ((Planning, Fetch), Fetching),
        ((Fetching, Merge), Merging),
        ((Merging, Persist), Persisted),
        ((Planning, Fail), Failed),
        ((Fetching, Fail), Failed),
        ((Merging, Fail), Failed),
    ]);
    FiniteStateMachine::new(Discovered, table)
}

/// A result handed to the sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistedResult {
    /// The file stem the result was persisted under.
    pub file_stem: String,
    /// The covered window, `None` for a whole instrument.
    pub window: Option<Window>,
    /// The number of trades persisted.
    pub trades: usize,
}

/// The outcome of one instrument.
#[derive(Debug)]
pub struct InstrumentReport {
    /// The instrument.
    pub instrument: Instrument,
    /// The final state, [`InstrumentState::Persisted`] or [`InstrumentState::Failed`].
    pub state: InstrumentState,
    /// The number of windows planned.
    pub windows_planned: usize,
    /// The number of windows fetched successfully.
    pub windows_ok: usize,
    /// The number of page requests made by successful windows.
    pub requests: usize,
    /// The number of trades persisted.
    pub trades: usize,
    /// The results handed to the sink.
    pub persisted: Vec<PersistedResult>,
    /// Windows which failed and are missing from the output.
    pub gaps: Vec<WindowGap>,
    /// The reason the instrument failed.
    pub error: Option<String>,
}

impl InstrumentReport {
    fn new(instrument: Instrument) -> Self {
        Self {
            instrument,
            state: InstrumentState::Discovered,
            windows_planned: 0,
            windows_ok: 0,
            requests: 0,
            trades: 0,
            persisted: Vec::new(),
            gaps: Vec::new(),
            error: None,
        }
    }

    /// Returns whether the instrument was persisted with missing windows.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.state == InstrumentState::Persisted && !self.gaps.is_empty()
    }
}

struct WindowOutcome {
    window: Window,
    walked: Result<WalkOutcome, FetchError>,
    persisted: Option<anyhow::Result<PersistedResult>>,
}

/// Runs backfills for a set of instruments.
///
/// With [`Partitioning::PerWindow`] each non-empty window is persisted as soon as it
/// completes; with [`Partitioning::PerInstrument`] one result, possibly empty, is
/// persisted once every window has finished.
#[derive(Debug)]
pub struct BackfillOrchestrator<S, O> {
    source: S,
    sink: O,
    config: BackfillConfig,
    planner: WindowPlanner,
    scheduler: ConcurrencyScheduler,
    cancellation_token: CancellationToken,
}

impl<S, O> BackfillOrchestrator<S, O>
where
    S: TradeSource,
    O: OutputSink,
{
    /// Creates a new [`BackfillOrchestrator`].
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid.
    pub fn new(source: S, sink: O, config: BackfillConfig) -> Result<Self, ConfigError> {
        let scheduler = ConcurrencyScheduler::new(&config)?;
        let planner = WindowPlanner::new(config.chunk_ms, config.seq_span());

        Ok(Self {
            source,
            sink,
            config,
            planner,
            scheduler,
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Sets the token which cancels the run.
    #[must_use]
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &BackfillConfig {
        &self.config
    }

    /// Returns the scheduler, for its in-flight counters.
    #[must_use]
    pub const fn scheduler(&self) -> &ConcurrencyScheduler {
        &self.scheduler
    }

    /// Backfills `instruments`, yielding one report per instrument as it completes.
    pub fn run(
        &self,
        instruments: Vec<Instrument>,
        mode: SnapshotMode,
    ) -> impl Stream<Item = InstrumentReport> + '_ {
        tracing::info!(
            "Backfilling {} instruments: max_in_flight={}, max_instruments={}, max_windows={}",
            instruments.len(),
            self.scheduler.max_in_flight(),
            self.scheduler.max_instruments(),
            self.scheduler.max_windows(),
        );

        stream::iter(instruments)
            .map(move |instrument| self.backfill_instrument(instrument, mode))
            .buffer_unordered(self.scheduler.max_instruments())
    }

    /// Backfills `instruments` and collects every report.
    pub async fn run_to_end(
        &self,
        instruments: Vec<Instrument>,
        mode: SnapshotMode,
    ) -> Vec<InstrumentReport> {
        self.run(instruments, mode).collect().await
    }

    async fn backfill_instrument(
        &self,
        instrument: Instrument,
        mode: SnapshotMode,
    ) -> InstrumentReport {
        let mut report = InstrumentReport::new(instrument);

        if let Err(e) = self.process(&mut report, mode).await {
            tracing::error!("Backfill of {} failed: {e:#}", report.instrument.name);
            report.state = InstrumentState::Failed;
            report.error = Some(format!("{e:#}"));
        }

        report
    }

    async fn process(
        &self,
        report: &mut InstrumentReport,
        mode: SnapshotMode,
    ) -> anyhow::Result<()> {
        let mut fsm = instrument_fsm()?;
        let instrument = report.instrument.clone();
        let scheduled = self.scheduler.wrap(&self.source);

        report.state = fsm.trigger(InstrumentTrigger::Plan)?;
        let windows = match self.plan_windows(&scheduled, &instrument, mode).await {
            Ok(windows) => windows,
            Err(e) => {
                report.state = fsm.trigger(InstrumentTrigger::Fail)?;
                return Err(anyhow::Error::new(e).context("planning failed"));
            }
        };
        report.windows_planned = windows.len();
        tracing::debug!("{}: planned {} windows", instrument.name, windows.len());

        report.state = fsm.trigger(InstrumentTrigger::Fetch)?;
        let walker = PageWalker::new(&scheduled, &self.config);
        let mut outcomes: Vec<WindowOutcome> = stream::iter(windows)
            .map(|window| self.fetch_window(&walker, &instrument, window))
            .buffer_unordered(self.scheduler.max_windows())
            .collect()
            .await;
        outcomes.sort_by_key(|outcome| outcome.window.bounds());

        report.state = fsm.trigger(InstrumentTrigger::Merge)?;
        let mut fetched = Vec::new();
        let mut sink_error = None;
        for outcome in outcomes {
            match outcome.walked {
                Ok(walked) => {
                    report.windows_ok += 1;
                    report.requests += walked.requests;
                    fetched.push(walked.trades);
                }
                Err(error) => {
                    tracing::warn!(
                        "{} {}: window failed: {error}",
                        instrument.name,
                        outcome.window
                    );
                    report.gaps.push(WindowGap {
                        instrument: instrument.name,
                        window: outcome.window,
                        error,
                    });
                }
            }
            match outcome.persisted {
                Some(Ok(persisted)) => {
                    report.trades += persisted.trades;
                    report.persisted.push(persisted);
                }
                Some(Err(e)) => {
                    sink_error.get_or_insert(e);
                }
                None => {}
            }
        }

        if let Some(e) = sink_error {
            report.state = fsm.trigger(InstrumentTrigger::Fail)?;
            return Err(e.context("sink failed"));
        }

        if report.windows_planned > 0 && report.windows_ok == 0 {
            report.state = fsm.trigger(InstrumentTrigger::Fail)?;
            anyhow::bail!("all {} windows failed", report.windows_planned);
        }

        if self.config.partitioning == Partitioning::PerInstrument {
            let result = BackfillResult {
                instrument: instrument.clone(),
                window: None,
                trades: merge_windows(fetched),
            };
            match self.persist(&result).await {
                Ok(persisted) => {
                    report.trades += persisted.trades;
                    report.persisted.push(persisted);
                }
                Err(e) => {
                    report.state = fsm.trigger(InstrumentTrigger::Fail)?;
                    return Err(e.context("sink failed"));
                }
            }
        }

        report.state = fsm.trigger(InstrumentTrigger::Persist)?;
        tracing::info!(
            "{}: persisted {} trades from {}/{} windows in {} requests",
            instrument.name,
            report.trades,
            report.windows_ok,
            report.windows_planned,
            report.requests,
        );
        Ok(())
    }

    async fn plan_windows(
        &self,
        source: &ScheduledSource<'_, S>,
        instrument: &Instrument,
        mode: SnapshotMode,
    ) -> Result<Vec<Window>, FetchError> {
        let Some(range) = instrument.valid_range(mode.reference()) else {
            tracing::debug!("{}: listed after the reference time", instrument.name);
            return Ok(Vec::new());
        };

        match self.config.pagination {
            PaginationMode::Time => Ok(self
                .planner
                .plan(range)
                .into_iter()
                .map(Window::from)
                .collect()),
            PaginationMode::Sequence => {
                let latest = self
                    .cancelable(source.fetch_latest_seq(instrument.name.as_str(), range.end_ms))
                    .await?;
                match latest.and_then(|latest| SeqWindow::new(1, latest).ok()) {
                    Some(seq_range) => Ok(self
                        .planner
                        .plan_seq(seq_range)
                        .into_iter()
                        .map(Window::from)
                        .collect()),
                    None => Ok(Vec::new()),
                }
            }
        }
    }

    async fn fetch_window(
        &self,
        walker: &PageWalker<'_, ScheduledSource<'_, S>>,
        instrument: &Instrument,
        window: Window,
    ) -> WindowOutcome {
        let label = format!("{} {window}", instrument.name);
        let walked = self
            .scheduler
            .run_task(
                &label,
                self.cancelable(walker.walk(instrument.name.as_str(), window)),
            )
            .await;

        let persisted = match (&walked, self.config.partitioning) {
            (Ok(outcome), Partitioning::PerWindow) if !outcome.trades.is_empty() => {
                let result = BackfillResult {
                    instrument: instrument.clone(),
                    window: Some(window),
                    trades: outcome.trades.clone(),
                };
                Some(self.persist(&result).await)
            }
            _ => None,
        };

        WindowOutcome {
            window,
            walked,
            persisted,
        }
    }

    async fn persist(&self, result: &BackfillResult) -> anyhow::Result<PersistedResult> {
        self.sink.persist(result).await?;

        Ok(PersistedResult {
            file_stem: result.file_stem(),
            window: result.window,
            trades: result.trades.len(),
        })
    }

    async fn cancelable<F, T>(&self, task: F) -> Result<T, FetchError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        tokio::select! {
            biased;
            () = self.cancellation_token.cancelled() => {
                Err(FetchError::Canceled("backfill canceled".to_string()))
            }
            result = task => result,
        }
    }
}

/// Concatenates window results into one sequence ordered by `(timestamp, trade_seq)`.
fn merge_windows(windows: Vec<Vec<TradeRecord>>) -> Vec<TradeRecord> {
    let mut trades: Vec<TradeRecord> = windows.into_iter().flatten().collect();
    trades.sort_by_key(TradeRecord::sort_key);
    trades.dedup_by_key(|t| t.trade_seq);
    trades
}
