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

//! Data model for instruments, windows and trade records.

use std::fmt::Display;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay, EnumIter, EnumString};
use tapefill_core::ReferenceTime;
use ustr::Ustr;

use crate::error::FetchError;

/// The kind of an instrument.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    StrumDisplay,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    /// Options.
    Option,
    /// Futures, including perpetual swaps.
    Future,
}

/// The aggressor side of a trade.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    StrumDisplay,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    /// The buyer was the aggressor.
    Buy,
    /// The seller was the aggressor.
    Sell,
}

/// An instrument whose trade tape is to be reconstructed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    /// The venue instrument name, e.g. `BTC-27JUN25-100000-C`.
    pub name: Ustr,
    /// The instrument kind.
    pub kind: InstrumentKind,
    /// UNIX milliseconds at which the instrument was listed.
    pub creation_timestamp_ms: i64,
    /// UNIX milliseconds at which the instrument expires.
    pub expiration_timestamp_ms: i64,
}

impl Instrument {
    /// Creates a new [`Instrument`].
    #[must_use]
    pub fn new(
        name: &str,
        kind: InstrumentKind,
        creation_timestamp_ms: i64,
        expiration_timestamp_ms: i64,
    ) -> Self {
        Self {
            name: Ustr::from(name),
            kind,
            creation_timestamp_ms,
            expiration_timestamp_ms,
        }
    }

    /// Returns the valid trading range of the instrument.
    ///
    /// When a `reference` time is given the end is clamped to it. Returns `None` when the
    /// clamped range is empty, i.e. the instrument was listed after the reference time.
    #[must_use]
    pub fn valid_range(&self, reference: Option<ReferenceTime>) -> Option<TimeWindow> {
        let end_ms = match reference {
            Some(reference) => ReferenceTime::clamp(&reference, self.expiration_timestamp_ms),
            None => self.expiration_timestamp_ms,
        };
        TimeWindow::new(self.creation_timestamp_ms, end_ms).ok()
    }
}

/// A closed time interval `[start_ms, end_ms]` in UNIX milliseconds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive start.
    pub start_ms: i64,
    /// Inclusive end.
    pub end_ms: i64,
}

impl TimeWindow {
    /// Creates a new [`TimeWindow`].
    ///
    /// # Errors
    ///
    /// Returns an error if `start_ms > end_ms`.
    pub fn new(start_ms: i64, end_ms: i64) -> anyhow::Result<Self> {
        if start_ms > end_ms {
            anyhow::bail!("invalid time window: start {start_ms} > end {end_ms}");
        }
        Ok(Self { start_ms, end_ms })
    }

    /// Returns the number of milliseconds covered, both ends included.
    #[must_use]
    pub const fn len_ms(&self) -> i64 {
        self.end_ms.saturating_sub(self.start_ms).saturating_add(1)
    }

    /// Returns whether `timestamp_ms` lies inside the window.
    #[must_use]
    pub const fn contains(&self, timestamp_ms: i64) -> bool {
        self.start_ms <= timestamp_ms && timestamp_ms <= self.end_ms
    }
}

impl Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start_ms, self.end_ms)
    }
}

/// A closed interval `[start_seq, end_seq]` in trade sequence space.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeqWindow {
    /// Inclusive first sequence number.
    pub start_seq: i64,
    /// Inclusive last sequence number.
    pub end_seq: i64,
}

impl SeqWindow {
    /// Creates a new [`SeqWindow`].
    ///
    /// # Errors
    ///
    /// Returns an error if `start_seq > end_seq`.
    pub fn new(start_seq: i64, end_seq: i64) -> anyhow::Result<Self> {
        if start_seq > end_seq {
            anyhow::bail!("invalid sequence window: start {start_seq} > end {end_seq}");
        }
        Ok(Self { start_seq, end_seq })
    }

    /// Returns the number of sequence numbers covered, both ends included.
    #[must_use]
    pub const fn len(&self) -> i64 {
        self.end_seq.saturating_sub(self.start_seq).saturating_add(1)
    }

    /// Always false, a window holds at least one sequence number.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Returns whether `trade_seq` lies inside the window.
    #[must_use]
    pub const fn contains(&self, trade_seq: i64) -> bool {
        self.start_seq <= trade_seq && trade_seq <= self.end_seq
    }
}

impl Display for SeqWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[#{}, #{}]", self.start_seq, self.end_seq)
    }
}

/// A unit of planned work for one instrument.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Window {
    /// A window in time space.
    Time(TimeWindow),
    /// A window in trade sequence space.
    Seq(SeqWindow),
}

impl Window {
    /// Returns the bounds of the window.
    #[must_use]
    pub const fn bounds(&self) -> (i64, i64) {
        match self {
            Self::Time(w) => (w.start_ms, w.end_ms),
            Self::Seq(w) => (w.start_seq, w.end_seq),
        }
    }

    /// Returns whether `trade` belongs to this window.
    #[must_use]
    pub const fn contains(&self, trade: &TradeRecord) -> bool {
        match self {
            Self::Time(w) => w.contains(trade.timestamp),
            Self::Seq(w) => w.contains(trade.trade_seq),
        }
    }

    /// Returns the file stem suffix used when a window is persisted on its own.
    #[must_use]
    pub fn file_suffix(&self) -> String {
        match self {
            Self::Time(w) => format!("{}_{}", w.start_ms, w.end_ms),
            Self::Seq(w) => format!("{}-{}", w.start_seq, w.end_seq),
        }
    }
}

impl Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Time(w) => write!(f, "{w}"),
            Self::Seq(w) => write!(f, "{w}"),
        }
    }
}

impl From<TimeWindow> for Window {
    fn from(value: TimeWindow) -> Self {
        Self::Time(value)
    }
}

impl From<SeqWindow> for Window {
    fn from(value: SeqWindow) -> Self {
        Self::Seq(value)
    }
}

/// A single executed trade.
///
/// Field names follow the venue wire names so persisted files keep familiar column headers.
/// Records are ordered by `(timestamp, trade_seq)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Monotonic sequence number of the trade within its instrument.
    pub trade_seq: i64,
    /// Venue trade identifier.
    pub trade_id: Ustr,
    /// UNIX milliseconds of the execution.
    pub timestamp: i64,
    /// Tick direction (0 = plus tick, 1 = zero-plus, 2 = minus, 3 = zero-minus).
    pub tick_direction: i8,
    /// Execution price.
    pub price: Decimal,
    /// Mark price at the time of the trade.
    pub mark_price: Decimal,
    /// Implied volatility (options only).
    pub iv: Option<Decimal>,
    /// The instrument name.
    pub instrument_name: Ustr,
    /// Index price at the time of the trade.
    pub index_price: Decimal,
    /// Aggressor side.
    pub direction: TradeDirection,
    /// Trade size in contract units.
    pub contracts: Option<Decimal>,
    /// Trade amount.
    pub amount: Decimal,
    /// Number of legs if part of a block trade.
    pub block_trade_leg_count: Option<u32>,
    /// Block trade identifier.
    pub block_trade_id: Option<Ustr>,
    /// Block RFQ identifier.
    pub block_rfq_id: Option<i64>,
    /// Combo identifier.
    pub combo_id: Option<Ustr>,
    /// Combo trade identifier.
    pub combo_trade_id: Option<i64>,
    /// Liquidation flag (`M`, `T` or `MT`).
    pub liquidation: Option<Ustr>,
}

impl TradeRecord {
    /// Returns the ordering key `(timestamp, trade_seq)`.
    #[must_use]
    pub const fn sort_key(&self) -> (i64, i64) {
        (self.timestamp, self.trade_seq)
    }
}

/// The merged, ordered and deduplicated trades for one persisted unit.
#[derive(Clone, Debug, PartialEq)]
pub struct BackfillResult {
    /// The instrument the trades belong to.
    pub instrument: Instrument,
    /// The window covered, or `None` when the result spans the whole instrument.
    pub window: Option<Window>,
    /// The trades, sorted by `(timestamp, trade_seq)`.
    pub trades: Vec<TradeRecord>,
}

impl BackfillResult {
    /// Returns the file stem for this result.
    #[must_use]
    pub fn file_stem(&self) -> String {
        match &self.window {
            Some(window) => format!("{}_{}", self.instrument.name, window.file_suffix()),
            None => self.instrument.name.to_string(),
        }
    }
}

/// A window which terminally failed and so is missing from the output.
#[derive(Clone, Debug)]
pub struct WindowGap {
    /// The instrument name.
    pub instrument: Ustr,
    /// The missing window.
    pub window: Window,
    /// The terminal error.
    pub error: FetchError,
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("option", InstrumentKind::Option)]
    #[case("FUTURE", InstrumentKind::Future)]
    fn test_instrument_kind_from_str(#[case] input: &str, #[case] expected: InstrumentKind) {
        assert_eq!(InstrumentKind::from_str(input).unwrap(), expected);
    }

    #[rstest]
    fn test_instrument_kind_display() {
        assert_eq!(InstrumentKind::Future.to_string(), "future");
        assert_eq!(TradeDirection::Sell.as_ref(), "sell");
    }

    #[rstest]
    fn test_time_window_rejects_inverted_bounds() {
        assert!(TimeWindow::new(10, 9).is_err());
        assert_eq!(TimeWindow::new(10, 10).unwrap().len_ms(), 1);
    }

    #[rstest]
    fn test_valid_range_clamped_to_reference() {
        let instrument = Instrument::new("BTC-PERPETUAL", InstrumentKind::Future, 1_000, 9_000);

        let range = instrument
            .valid_range(Some(ReferenceTime::from_millis(5_000)))
            .unwrap();

        assert_eq!(range, TimeWindow::new(1_000, 5_000).unwrap());
        assert_eq!(
            instrument.valid_range(None).unwrap(),
            TimeWindow::new(1_000, 9_000).unwrap()
        );
    }

    #[rstest]
    fn test_valid_range_empty_when_listed_after_reference() {
        let instrument = Instrument::new("BTC-PERPETUAL", InstrumentKind::Future, 6_000, 9_000);
        assert!(
            instrument
                .valid_range(Some(ReferenceTime::from_millis(5_000)))
                .is_none()
        );
    }

    #[rstest]
    fn test_file_stem() {
        let instrument = Instrument::new("BTC-PERPETUAL", InstrumentKind::Future, 0, 10);
        let mut result = BackfillResult {
            instrument,
            window: None,
            trades: vec![],
        };
        assert_eq!(result.file_stem(), "BTC-PERPETUAL");

        result.window = Some(Window::Time(TimeWindow::new(0, 3_599_999).unwrap()));
        assert_eq!(result.file_stem(), "BTC-PERPETUAL_0_3599999");

        result.window = Some(Window::Seq(SeqWindow::new(1, 10_000).unwrap()));
        assert_eq!(result.file_stem(), "BTC-PERPETUAL_1-10000");
    }
}
