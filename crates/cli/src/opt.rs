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

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tapefill_backfill::{
    config::{BoundaryMode, PaginationMode},
    model::InstrumentKind,
};
use tapefill_deribit::common::enums::DeribitCurrency;

/// Main CLI structure for parsing command-line arguments and options.
#[derive(Debug, Parser)]
#[clap(version, about, author)]
pub struct TapefillCli {
    #[clap(subcommand)]
    pub command: Commands,
    /// Log progress at info level (`RUST_LOG` takes precedence).
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

/// Available top-level commands.
#[derive(Parser, Debug)]
pub enum Commands {
    /// Backfills the trade tapes of every matching instrument.
    Fetch(FetchOpt),
    /// Saves the instrument lists without fetching trades.
    Instruments(InstrumentsOpt),
    /// Merges the CSV files of a partition directory into `data.parquet`.
    Consolidate(ConsolidateOpt),
}

/// Instrument kind selection, where `all` expands to every kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Option,
    Future,
    All,
}

impl KindArg {
    /// Returns the selected kinds.
    #[must_use]
    pub fn kinds(self) -> Vec<InstrumentKind> {
        match self {
            Self::Option => vec![InstrumentKind::Option],
            Self::Future => vec![InstrumentKind::Future],
            Self::All => vec![InstrumentKind::Option, InstrumentKind::Future],
        }
    }
}

/// Expiry state selection, where `all` expands to expired and active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExpiredArg {
    True,
    False,
    All,
}

impl ExpiredArg {
    /// Returns the selected expiry states, `true` meaning expired.
    #[must_use]
    pub fn states(self) -> Vec<bool> {
        match self {
            Self::True => vec![true],
            Self::False => vec![false],
            Self::All => vec![true, false],
        }
    }
}

/// Which instruments to work on and where output goes.
#[derive(Parser, Debug, Clone)]
pub struct SelectionArgs {
    /// Settlement currency: BTC, ETH, USDC or USDT.
    #[arg(long)]
    pub currency: DeribitCurrency,
    /// Instrument kind.
    #[arg(long, value_enum, default_value_t = KindArg::Option)]
    pub kind: KindArg,
    /// Expired instruments, active ones, or both.
    #[arg(long, value_enum, default_value_t = ExpiredArg::True)]
    pub expired: ExpiredArg,
    /// Root directory of the output tree.
    #[arg(long, default_value = "./data")]
    pub base_dir: PathBuf,
    /// Overrides the API base URL (falls back to `TAPEFILL_BASE_URL`).
    #[arg(long)]
    pub base_url: Option<String>,
    /// HTTP request timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    /// Maximum retries for a failed request.
    #[arg(long, default_value_t = 4)]
    pub max_retries: u32,
}

/// Options for the `fetch` command.
#[derive(Parser, Debug, Clone)]
pub struct FetchOpt {
    #[clap(flatten)]
    pub selection: SelectionArgs,
    /// Pagination for futures: `time` or `sequence`. Options always use `time`.
    #[arg(long, default_value = "time")]
    pub pagination: PaginationMode,
    /// Boundary handling for time pagination: `inclusive` or `exclusive`.
    #[arg(long, default_value = "inclusive")]
    pub boundary: BoundaryMode,
    /// Splits futures time ranges into windows of this many hours (default 1).
    #[arg(long)]
    pub window_hours: Option<u32>,
    /// Writes one file per window instead of one per instrument (futures only).
    #[arg(long)]
    pub per_window: bool,
    /// Trades requested per page (at most 10000).
    #[arg(long)]
    pub page_size: Option<usize>,
    /// Global ceiling on in-flight requests.
    #[arg(long, default_value_t = 200)]
    pub max_in_flight: usize,
    /// Instruments fetched concurrently (derived from `--max-in-flight` when omitted).
    #[arg(long)]
    pub max_instruments: Option<usize>,
    /// Windows fetched concurrently per instrument.
    #[arg(long)]
    pub max_windows: Option<usize>,
    /// Deadline for one window in seconds.
    #[arg(long)]
    pub task_timeout_secs: Option<u64>,
    /// Consolidates each partition into `data.parquet` after fetching.
    #[arg(long)]
    pub save_parquet: bool,
}

/// Options for the `instruments` command.
#[derive(Parser, Debug, Clone)]
pub struct InstrumentsOpt {
    #[clap(flatten)]
    pub selection: SelectionArgs,
}

/// Options for the `consolidate` command.
#[derive(Parser, Debug, Clone)]
pub struct ConsolidateOpt {
    /// Partition directory holding the CSV files.
    pub dir: PathBuf,
}
