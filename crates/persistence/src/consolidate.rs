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

//! Consolidation of a partition's CSV files into a single Parquet file.

use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use arrow::{
    csv::ReaderBuilder,
    datatypes::{DataType, Field, Schema, SchemaRef},
};
use parquet::{
    arrow::ArrowWriter,
    basic::{Compression, ZstdLevel},
    file::properties::WriterProperties,
};

use crate::partition::PARQUET_FILE_NAME;

const ROWS_PER_GROUP: usize = 100_000;

/// Returns the fixed Arrow schema of trade CSV files.
#[must_use]
pub fn trade_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("trade_seq", DataType::Int64, false),
        Field::new("trade_id", DataType::Utf8, false),
        Field::new("timestamp", DataType::Int64, false),
        Field::new("tick_direction", DataType::Int8, false),
        Field::new("price", DataType::Float64, false),
        Field::new("mark_price", DataType::Float64, false),
        Field::new("iv", DataType::Float64, true),
        Field::new("instrument_name", DataType::Utf8, false),
        Field::new("index_price", DataType::Float64, false),
        Field::new("direction", DataType::Utf8, false),
        Field::new("contracts", DataType::Float64, true),
        Field::new("amount", DataType::Float64, false),
        Field::new("block_trade_leg_count", DataType::UInt32, true),
        Field::new("block_trade_id", DataType::Utf8, true),
        Field::new("block_rfq_id", DataType::Int64, true),
        Field::new("combo_id", DataType::Utf8, true),
        Field::new("combo_trade_id", DataType::Int64, true),
        Field::new("liquidation", DataType::Utf8, true),
    ]))
}

/// Outcome of consolidating one partition directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Consolidation {
    /// The Parquet file written.
    pub path: PathBuf,
    /// Number of CSV files merged.
    pub files: usize,
    /// Number of rows written.
    pub rows: usize,
}

/// Merges every `*.csv` file in `dir` into `{dir}/data.parquet` using zstd compression.
///
/// Files are merged in file name order. Returns `None` when `dir` holds no CSV files.
/// On failure the partially written Parquet file is removed.
///
/// # Errors
///
/// Returns an error if a CSV file does not match the trade schema or the output cannot
/// be written.
pub fn consolidate_partition(dir: &Path) -> anyhow::Result<Option<Consolidation>> {
    let files = list_csv_files(dir)?;
    if files.is_empty() {
        tracing::warn!("No CSV files to consolidate in {}", dir.display());
        return Ok(None);
    }

    let path = dir.join(PARQUET_FILE_NAME);
    match write_parquet(&path, &files) {
        Ok(rows) => {
            tracing::info!(
                "Consolidated {} files ({rows} rows) into {}",
                files.len(),
                path.display()
            );
            Ok(Some(Consolidation {
                path,
                files: files.len(),
                rows,
            }))
        }
        Err(e) => {
            if path.exists() {
                let _ = std::fs::remove_file(&path);
            }
            Err(e)
        }
    }
}

fn list_csv_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn write_parquet(path: &Path, files: &[PathBuf]) -> anyhow::Result<usize> {
    let schema = trade_schema();
    let writer_props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .set_max_row_group_size(ROWS_PER_GROUP)
        .build();

    let output =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(output, schema.clone(), Some(writer_props))?;

    let mut rows = 0;
    for file_path in files {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open {}", file_path.display()))?;
        let reader = ReaderBuilder::new(schema.clone())
            .with_header(true)
            .build(file)?;

        for batch in reader {
            let batch = batch.with_context(|| format!("Invalid CSV {}", file_path.display()))?;
            rows += batch.num_rows();
            writer.write(&batch)?;
        }
    }
    writer.close()?;

    Ok(rows)
}
