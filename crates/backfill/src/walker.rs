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

//! Walks the pages of one window and merges them into a single ordered sequence.
//!
//! Time windows are walked backward: each page holds the newest trades of the remaining
//! range, so the cursor (the end of the range) moves down to the oldest timestamp seen.
//! Sequence windows are walked forward from the first sequence number.
//!
//! Termination:
//! - an empty page, or a page shorter than the page size, ends the walk;
//! - the cursor strictly moves on every full page, or the walk fails;
//! - a hard page ceiling bounds the number of requests.

use std::collections::HashSet;

use crate::{
    config::{BackfillConfig, BoundaryMode},
    error::FetchError,
    model::{SeqWindow, TimeWindow, TradeRecord, Window},
    source::TradeSource,
};

/// The merged trades of one window and the number of requests issued.
#[derive(Clone, Debug, PartialEq)]
pub struct WalkOutcome {
    /// The walked window.
    pub window: Window,
    /// Trades sorted by `(timestamp, trade_seq)` with unique `trade_seq`.
    pub trades: Vec<TradeRecord>,
    /// The number of page requests made.
    pub requests: usize,
}

/// Paginates a single window against a [`TradeSource`].
#[derive(Debug)]
pub struct PageWalker<'a, S: ?Sized> {
    source: &'a S,
    page_size: usize,
    max_pages: usize,
    boundary: BoundaryMode,
}

impl<'a, S> PageWalker<'a, S>
where
    S: TradeSource + ?Sized,
{
    /// Creates a new [`PageWalker`] using the page settings of `config`.
    #[must_use]
    pub fn new(source: &'a S, config: &BackfillConfig) -> Self {
        Self {
            source,
            page_size: config.page_size.max(1),
            max_pages: config.max_pages_per_window.max(1),
            boundary: config.boundary,
        }
    }

    /// Walks `window` in the space it is expressed in.
    ///
    /// # Errors
    ///
    /// Returns an error if a page request terminally fails or pagination cannot progress.
    pub async fn walk(&self, instrument: &str, window: Window) -> Result<WalkOutcome, FetchError> {
        match window {
            Window::Time(w) => self.walk_time(instrument, w).await,
            Window::Seq(w) => self.walk_seq(instrument, w).await,
        }
    }

    /// Walks a time window backward from its end.
    ///
    /// # Errors
    ///
    /// Returns an error if a page request terminally fails, the page ceiling is reached,
    /// or a full page does not move the cursor.
    pub async fn walk_time(
        &self,
        instrument: &str,
        window: TimeWindow,
    ) -> Result<WalkOutcome, FetchError> {
        let mut pages = Vec::new();
        let mut requests = 0;
        let mut end_ms = window.end_ms;

        loop {
            if requests >= self.max_pages {
                return Err(FetchError::PageCeiling(self.max_pages));
            }

            let request = TimeWindow {
                start_ms: window.start_ms,
                end_ms,
            };
            let page = self
                .source
                .fetch_trades_by_time(instrument, request, self.page_size)
                .await?;
            requests += 1;

            let Some(oldest_ms) = page.iter().map(|t| t.timestamp).min() else {
                break;
            };
            let full = page.len() >= self.page_size;
            tracing::trace!(
                "{instrument} {request}: {} trades, oldest {oldest_ms}",
                page.len()
            );
            pages.push(page);

            if !full {
                break;
            }

            if oldest_ms > end_ms {
                return Err(FetchError::Malformed(format!(
                    "page for {instrument} {request} holds trades after its end"
                )));
            }

            let next_end_ms = match self.boundary {
                BoundaryMode::Inclusive if oldest_ms == end_ms => {
                    return Err(FetchError::SaturatedTimestamp(end_ms));
                }
                BoundaryMode::Inclusive => oldest_ms,
                BoundaryMode::Exclusive => oldest_ms.saturating_sub(1),
            };

            if next_end_ms < window.start_ms {
                break;
            }
            end_ms = next_end_ms;
        }

        let window = Window::Time(window);
        Ok(WalkOutcome {
            window,
            trades: merge_pages(pages, window),
            requests,
        })
    }

    /// Walks a sequence window forward from its start.
    ///
    /// # Errors
    ///
    /// Returns an error if a page request terminally fails, the page ceiling is reached,
    /// or a full page does not move the cursor.
    pub async fn walk_seq(
        &self,
        instrument: &str,
        window: SeqWindow,
    ) -> Result<WalkOutcome, FetchError> {
        let mut pages = Vec::new();
        let mut requests = 0;
        let mut start_seq = window.start_seq;

        loop {
            if requests >= self.max_pages {
                return Err(FetchError::PageCeiling(self.max_pages));
            }

            let request = SeqWindow {
                start_seq,
                end_seq: window.end_seq,
            };
            let page = self
                .source
                .fetch_trades_by_seq(instrument, request, self.page_size)
                .await?;
            requests += 1;

            let Some(newest_seq) = page.iter().map(|t| t.trade_seq).max() else {
                break;
            };
            let full = page.len() >= self.page_size;
            pages.push(page);

            if !full || newest_seq >= window.end_seq {
                break;
            }
            if newest_seq < start_seq {
                return Err(FetchError::Malformed(format!(
                    "page for {instrument} {request} holds trades before its start"
                )));
            }
            start_seq = newest_seq + 1;
        }

        let window = Window::Seq(window);
        Ok(WalkOutcome {
            window,
            trades: merge_pages(pages, window),
            requests,
        })
    }
}

/// Merges pages into one sequence sorted by `(timestamp, trade_seq)`.
///
/// Records outside `window` are dropped, as is any record whose `trade_seq` was already
/// kept.
#[must_use]
pub fn merge_pages(pages: Vec<Vec<TradeRecord>>, window: Window) -> Vec<TradeRecord> {
    let mut trades: Vec<TradeRecord> = pages
        .into_iter()
        .flatten()
        .filter(|trade| window.contains(trade))
        .collect();
    trades.sort_by_key(TradeRecord::sort_key);

    let mut seen = HashSet::with_capacity(trades.len());
    trades.retain(|trade| seen.insert(trade.trade_seq));
    trades
}
