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

//! CSV output of backfill results.

use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use anyhow::Context;
use async_trait::async_trait;
use tapefill_backfill::{
    model::{BackfillResult, TradeRecord},
    sink::OutputSink,
};

use crate::partition::Partition;

/// The trade CSV header, in [`TradeRecord`] field order.
pub const TRADE_COLUMNS: [&str; 18] = [
    "trade_seq",
    "trade_id",
    "timestamp",
    "tick_direction",
    "price",
    "mark_price",
    "iv",
    "instrument_name",
    "index_price",
    "direction",
    "contracts",
    "amount",
    "block_trade_leg_count",
    "block_trade_id",
    "block_rfq_id",
    "combo_id",
    "combo_trade_id",
    "liquidation",
];

/// An [`OutputSink`] writing one CSV file per result into a partition directory.
///
/// Files are named `{file_stem}.csv`. Each file is written to a temporary sibling and then
/// renamed, so a crashed run never leaves a truncated file behind and re-running a backfill
/// replaces earlier output.
#[derive(Clone, Debug)]
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    /// Creates a new [`CsvSink`] for `partition` under `base_dir`, creating the directory tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition directory cannot be created.
    pub fn new(base_dir: &Path, partition: &Partition) -> anyhow::Result<Self> {
        let dir = partition.prepare_dirs(base_dir)?;
        Ok(Self { dir })
    }

    /// Returns the directory files are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the target path for `result`.
    #[must_use]
    pub fn path_for(&self, result: &BackfillResult) -> PathBuf {
        self.dir.join(format!("{}.csv", result.file_stem()))
    }
}

#[async_trait]
impl OutputSink for CsvSink {
    async fn persist(&self, result: &BackfillResult) -> anyhow::Result<()> {
        let path = self.path_for(result);
        let trades = result.trades.clone();
        let target = path.clone();

        tokio::task::spawn_blocking(move || write_trades_atomic(&target, &trades))
            .await
            .context("CSV writer task panicked")??;

        tracing::debug!("Wrote {} trades to {}", result.trades.len(), path.display());
        Ok(())
    }
}

/// Writes `trades` to `path` as CSV, replacing any existing file atomically.
///
/// The header is always written, so an instrument without trades yields a header-only file.
///
/// # Errors
///
/// Returns an error if the file cannot be written or renamed into place.
pub fn write_trades_atomic(path: &Path, trades: &[TradeRecord]) -> anyhow::Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    if let Err(e) = write_trades(&tmp_path, trades) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    std::fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "Failed to move {} to {}",
            tmp_path.display(),
            path.display()
        )
    })
}

fn write_trades(path: &Path, trades: &[TradeRecord]) -> anyhow::Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(file));

    writer.write_record(TRADE_COLUMNS)?;
    for trade in trades {
        writer.serialize(trade)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))
}

/// Reads a trade CSV previously written by [`CsvSink`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or a row does not decode.
pub fn read_trades(path: &Path) -> anyhow::Result<Vec<TradeRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    reader
        .deserialize()
        .map(|row| row.with_context(|| format!("Invalid row in {}", path.display())))
        .collect()
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tapefill_backfill::{
        model::{Instrument, InstrumentKind, TimeWindow, Window},
        testing::stub_trade,
    };

    use super::*;

    fn result(
        name: &str,
        window: Option<Window>,
        seqs: std::ops::RangeInclusive<i64>,
    ) -> BackfillResult {
        BackfillResult {
            instrument: Instrument::new(name, InstrumentKind::Future, 0, 1_000_000),
            window,
            trades: seqs.map(|seq| stub_trade(name, seq, 1_000 + seq)).collect(),
        }
    }

    fn sink(tmp: &Path) -> CsvSink {
        CsvSink::new(tmp, &Partition::new("BTC", InstrumentKind::Future, true)).unwrap()
    }

    #[rstest]
    #[tokio::test]
    async fn test_persist_round_trips_trades() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = sink(tmp.path());
        let result = result("BTC-PERPETUAL", None, 1..=5);

        sink.persist(&result).await.unwrap();

        let path = tmp.path().join("BTC/future/expired/BTC-PERPETUAL.csv");
        assert_eq!(read_trades(&path).unwrap(), result.trades);
    }

    #[rstest]
    #[tokio::test]
    async fn test_persist_per_window_file_name() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = sink(tmp.path());
        let window = Window::Time(TimeWindow::new(0, 3_599_999).unwrap());

        sink.persist(&result("BTC-PERPETUAL", Some(window), 1..=2))
            .await
            .unwrap();

        assert!(sink.dir().join("BTC-PERPETUAL_0_3599999.csv").is_file());
    }

    #[rstest]
    #[tokio::test]
    async fn test_empty_result_writes_header_only() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = sink(tmp.path());
        let result = result("BTC-1JAN25", None, 1..=0);

        sink.persist(&result).await.unwrap();

        let content = std::fs::read_to_string(sink.path_for(&result)).unwrap();
        assert_eq!(content, format!("{}\n", TRADE_COLUMNS.join(",")));
    }

    #[rstest]
    #[tokio::test]
    async fn test_persist_is_byte_identical_across_runs() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let result = result("ETH-PERPETUAL", None, 1..=50);

        sink(first.path()).persist(&result).await.unwrap();
        sink(second.path()).persist(&result).await.unwrap();
        let overwrite = sink(second.path());
        overwrite.persist(&result).await.unwrap();

        let a = std::fs::read(sink(first.path()).path_for(&result)).unwrap();
        let b = std::fs::read(overwrite.path_for(&result)).unwrap();
        assert_eq!(a, b);
        assert!(!overwrite.dir().join("ETH-PERPETUAL.csv.tmp").exists());
    }

    #[rstest]
    fn test_write_into_missing_directory_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("missing").join("X.csv");

        assert!(write_trades_atomic(&path, &[]).is_err());
        assert!(!tmp.path().join("missing").exists());
    }
}
