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

use anyhow::Context;
use futures::StreamExt;
use tapefill_backfill::{
    config::{BackfillConfig, Partitioning},
    model::{Instrument, InstrumentKind},
    orchestrator::{BackfillOrchestrator, InstrumentReport, SnapshotMode},
    summary::BackfillSummary,
};
use tapefill_core::ReferenceTime;
use tapefill_deribit::{
    common::parse::parse_instrument,
    http::{client::DeribitHttpClient, models::DeribitInstrument},
};
use tapefill_network::retry::RetryConfig;
use tapefill_persistence::{
    catalog::write_instrument_catalog, consolidate::consolidate_partition, partition::Partition,
    sink::CsvSink,
};
use tokio_util::sync::CancellationToken;

use crate::opt::{ConsolidateOpt, FetchOpt, InstrumentsOpt, SelectionArgs};

const HOUR_MS: i64 = 3_600_000;
const DEFAULT_WINDOWS_PER_INSTRUMENT: usize = 10;
const DEFAULT_FUTURE_WINDOW_HOURS: u32 = 1;

struct Catalog {
    partition: Partition,
    instruments: Vec<Instrument>,
}

pub(crate) async fn run_fetch(opt: FetchOpt) -> anyhow::Result<()> {
    let selection = &opt.selection;
    let states = selection.expired.states();

    let reference = ReferenceTime::capture();
    if states.contains(&false) {
        println!("Active instruments are backfilled up to {reference}");
    }

    let token = CancellationToken::new();
    cancel_on_ctrl_c(token.clone());

    let mut summary = BackfillSummary::default();
    let mut found = 0;

    'outer: for kind in selection.kind.kinds() {
        for &expired in &states {
            let client = create_client(selection, expired)?;
            let catalog = load_catalog(&client, selection, kind, expired).await?;
            if catalog.instruments.is_empty() {
                tracing::warn!("No {} instruments found", catalog.partition);
                continue;
            }
            found += catalog.instruments.len();

            let mode = if expired {
                SnapshotMode::Historical
            } else {
                SnapshotMode::Live(reference)
            };
            let sink = CsvSink::new(&selection.base_dir, &catalog.partition)?;
            let dir = sink.dir().to_path_buf();
            let orchestrator =
                BackfillOrchestrator::new(client, sink, backfill_config(&opt, kind))?
                    .with_cancellation_token(token.clone());

            tracing::info!(
                "Backfilling {} {} instruments into {}",
                catalog.instruments.len(),
                catalog.partition,
                dir.display()
            );
            let mut reports = std::pin::pin!(orchestrator.run(catalog.instruments, mode));
            while let Some(report) = reports.next().await {
                log_report(&report);
                summary.record(&report);
            }

            if opt.save_parquet {
                consolidate(dir).await?;
            }
            if token.is_cancelled() {
                break 'outer;
            }
        }
    }

    println!("{}", summary.to_table());

    if found == 0 {
        anyhow::bail!("No instruments found");
    }
    if !summary.is_success() {
        anyhow::bail!(
            "{} of {} instruments failed",
            summary.failed.len(),
            summary.instruments
        );
    }
    Ok(())
}

pub(crate) async fn run_instruments(opt: InstrumentsOpt) -> anyhow::Result<()> {
    let selection = &opt.selection;
    let mut found = 0;

    for kind in selection.kind.kinds() {
        for expired in selection.expired.states() {
            let client = create_client(selection, expired)?;
            let catalog = load_catalog(&client, selection, kind, expired).await?;
            println!(
                "{}: {} instruments saved to {}",
                catalog.partition,
                catalog.instruments.len(),
                catalog.partition.catalog_path(&selection.base_dir).display()
            );
            found += catalog.instruments.len();
        }
    }

    if found == 0 {
        anyhow::bail!("No instruments found");
    }
    Ok(())
}

pub(crate) async fn run_consolidate(opt: &ConsolidateOpt) -> anyhow::Result<()> {
    consolidate(opt.dir.clone()).await
}

/// Builds the backfill configuration for one instrument kind.
///
/// Options are always fetched by time over their whole range, one file per instrument.
/// Futures are split into hourly time windows unless `--window-hours` says otherwise.
pub(crate) fn backfill_config(opt: &FetchOpt, kind: InstrumentKind) -> BackfillConfig {
    let max_windows = opt
        .max_windows
        .unwrap_or_else(|| DEFAULT_WINDOWS_PER_INSTRUMENT.min(opt.max_in_flight))
        .max(1);
    let max_instruments = opt
        .max_instruments
        .unwrap_or_else(|| (opt.max_in_flight / max_windows).max(1));

    let mut config = BackfillConfig {
        boundary: opt.boundary,
        max_in_flight: opt.max_in_flight,
        max_instruments,
        max_windows_per_instrument: max_windows,
        ..Default::default()
    };
    if let Some(page_size) = opt.page_size {
        config.page_size = page_size;
    }
    if let Some(secs) = opt.task_timeout_secs {
        config.task_timeout_ms = Some(secs.saturating_mul(1_000));
    }

    if kind == InstrumentKind::Future {
        config.pagination = opt.pagination;
        let hours = opt.window_hours.unwrap_or(DEFAULT_FUTURE_WINDOW_HOURS);
        config.chunk_ms = Some(i64::from(hours) * HOUR_MS);
        if opt.per_window {
            config.partitioning = Partitioning::PerWindow;
        }
    }
    config
}

fn create_client(selection: &SelectionArgs, expired: bool) -> anyhow::Result<DeribitHttpClient> {
    let retry_config = RetryConfig {
        max_retries: selection.max_retries,
        ..Default::default()
    };
    let client = DeribitHttpClient::from_env(
        selection.base_url.clone(),
        selection.timeout_secs,
        retry_config,
    )?;
    Ok(client.with_include_old(expired))
}

async fn load_catalog(
    client: &DeribitHttpClient,
    selection: &SelectionArgs,
    kind: InstrumentKind,
    expired: bool,
) -> anyhow::Result<Catalog> {
    let partition = Partition::new(selection.currency.as_ref(), kind, expired);
    let raw = client
        .request_instruments(selection.currency, kind, expired)
        .await
        .with_context(|| format!("Failed to request {partition} instruments"))?;

    let rows: Vec<_> = raw.iter().map(DeribitInstrument::to_row).collect();
    write_instrument_catalog(&selection.base_dir, &partition, &rows)?;

    let instruments = raw
        .iter()
        .filter_map(|instrument| match parse_instrument(instrument) {
            Ok(instrument) => Some(instrument),
            Err(e) => {
                tracing::warn!("Skipping {}: {e}", instrument.instrument_name);
                None
            }
        })
        .collect();

    Ok(Catalog {
        partition,
        instruments,
    })
}

async fn consolidate(dir: PathBuf) -> anyhow::Result<()> {
    let consolidation = tokio::task::spawn_blocking(move || consolidate_partition(&dir))
        .await
        .context("Consolidation task panicked")??;

    match consolidation {
        Some(c) => println!(
            "Consolidated {} rows from {} files into {}",
            c.rows,
            c.files,
            c.path.display()
        ),
        None => println!("No CSV files to consolidate"),
    }
    Ok(())
}

fn log_report(report: &InstrumentReport) {
    let name = report.instrument.name;
    match &report.error {
        Some(error) => tracing::error!("{name} {}: {error}", report.state),
        None if report.is_partial() => tracing::warn!(
            "{name} persisted {} trades with {} missing windows",
            report.trades,
            report.gaps.len()
        ),
        None => tracing::info!("{name} persisted {} trades", report.trades),
    }
}

fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, canceling backfill");
            token.cancel();
        }
    });
}
