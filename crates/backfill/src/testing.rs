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

//! An in-memory [`TradeSource`] over synthetic tapes, for tests and dry runs.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use ustr::Ustr;

use crate::{
    error::FetchError,
    model::{SeqWindow, TimeWindow, TradeDirection, TradeRecord},
    source::TradeSource,
};

/// Returns a synthetic trade for `instrument` with the given sequence and timestamp.
#[must_use]
pub fn stub_trade(instrument: &str, trade_seq: i64, timestamp: i64) -> TradeRecord {
    TradeRecord {
        trade_seq,
        trade_id: Ustr::from(&format!("T-{trade_seq}")),
        timestamp,
        tick_direction: (trade_seq % 4) as i8,
        price: Decimal::new(600_000 + trade_seq % 1_000, 1),
        mark_price: Decimal::new(600_000, 1),
        iv: None,
        instrument_name: Ustr::from(instrument),
        index_price: Decimal::new(599_900, 1),
        direction: if trade_seq % 2 == 0 {
            TradeDirection::Buy
        } else {
            TradeDirection::Sell
        },
        contracts: Some(Decimal::from(10)),
        amount: Decimal::from(10),
        block_trade_leg_count: None,
        block_trade_id: None,
        block_rfq_id: None,
        combo_id: None,
        combo_trade_id: None,
        liquidation: None,
    }
}

/// A [`TradeSource`] which serves pages from in-memory tapes.
///
/// Time queries return the newest `count` trades of the range, sequence queries the
/// oldest `count`, both in ascending order. Every call is counted, and the number of
/// calls running at once is tracked so tests can observe admission limits.
#[derive(Debug, Default)]
pub struct StubTradeSource {
    tapes: HashMap<Ustr, Vec<TradeRecord>>,
    failing_instruments: HashMap<Ustr, FetchError>,
    failing_ranges: Vec<(Ustr, TimeWindow, FetchError)>,
    latency: Option<(Duration, u64)>,
    requests: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl StubTradeSource {
    /// Creates an empty source; every instrument has no trades.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source with one tape of `(trade_seq, timestamp)` pairs.
    #[must_use]
    pub fn with_tape(instrument: &str, tape: impl IntoIterator<Item = (i64, i64)>) -> Self {
        Self::new().add_tape(instrument, tape)
    }

    /// Adds a tape of `(trade_seq, timestamp)` pairs for `instrument`.
    #[must_use]
    pub fn add_tape(
        mut self,
        instrument: &str,
        tape: impl IntoIterator<Item = (i64, i64)>,
    ) -> Self {
        let mut trades: Vec<TradeRecord> = tape
            .into_iter()
            .map(|(seq, ts)| stub_trade(instrument, seq, ts))
            .collect();
        trades.sort_by_key(TradeRecord::sort_key);
        self.tapes.insert(Ustr::from(instrument), trades);
        self
    }

    /// Makes every call for `instrument` fail with `error`.
    #[must_use]
    pub fn failing_instrument(mut self, instrument: &str, error: FetchError) -> Self {
        self.failing_instruments
            .insert(Ustr::from(instrument), error);
        self
    }

    /// Makes time queries for `instrument` starting inside `range` fail with `error`.
    #[must_use]
    pub fn failing_range(mut self, instrument: &str, range: TimeWindow, error: FetchError) -> Self {
        self.failing_ranges
            .push((Ustr::from(instrument), range, error));
        self
    }

    /// Delays each call by `base` plus a deterministic spread of up to `spread_ms`.
    #[must_use]
    pub fn with_latency(mut self, base: Duration, spread_ms: u64) -> Self {
        self.latency = Some((base, spread_ms));
        self
    }

    /// Returns the number of calls received.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Returns the highest number of calls observed running at once.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, instrument: &str) -> Result<CallGuard<'_>, FetchError> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        let guard = CallGuard {
            in_flight: &self.in_flight,
        };

        if let Some((base, spread_ms)) = self.latency {
            let spread = if spread_ms == 0 {
                0
            } else {
                (n as u64).wrapping_mul(7_919) % (spread_ms + 1)
            };
            tokio::time::sleep(base + Duration::from_millis(spread)).await;
        }

        match self.failing_instruments.get(&Ustr::from(instrument)) {
            Some(error) => Err(error.clone()),
            None => Ok(guard),
        }
    }

    fn tape(&self, instrument: &str) -> &[TradeRecord] {
        self.tapes
            .get(&Ustr::from(instrument))
            .map_or(&[], Vec::as_slice)
    }
}

struct CallGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TradeSource for StubTradeSource {
    async fn fetch_trades_by_time(
        &self,
        instrument: &str,
        window: TimeWindow,
        count: usize,
    ) -> Result<Vec<TradeRecord>, FetchError> {
        let _guard = self.enter(instrument).await?;

        let name = Ustr::from(instrument);
        if let Some((_, _, error)) = self
            .failing_ranges
            .iter()
            .find(|(n, range, _)| *n == name && range.contains(window.start_ms))
        {
            return Err(error.clone());
        }

        let matching: Vec<&TradeRecord> = self
            .tape(instrument)
            .iter()
            .filter(|t| window.contains(t.timestamp))
            .collect();
        let skip = matching.len().saturating_sub(count);
        Ok(matching.into_iter().skip(skip).cloned().collect())
    }

    async fn fetch_trades_by_seq(
        &self,
        instrument: &str,
        window: SeqWindow,
        count: usize,
    ) -> Result<Vec<TradeRecord>, FetchError> {
        let _guard = self.enter(instrument).await?;

        let mut matching: Vec<TradeRecord> = self
            .tape(instrument)
            .iter()
            .filter(|t| window.contains(t.trade_seq))
            .cloned()
            .collect();
        matching.sort_by_key(|t| t.trade_seq);
        matching.truncate(count);
        Ok(matching)
    }

    async fn fetch_latest_seq(
        &self,
        instrument: &str,
        end_ms: i64,
    ) -> Result<Option<i64>, FetchError> {
        let _guard = self.enter(instrument).await?;

        Ok(self
            .tape(instrument)
            .iter()
            .filter(|t| t.timestamp <= end_ms)
            .map(|t| t.trade_seq)
            .max())
    }
}
