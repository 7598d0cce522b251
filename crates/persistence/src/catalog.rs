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

//! The instrument catalog CSV written alongside each partition.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use anyhow::Context;

use crate::partition::Partition;

/// Columns written first when present, in this order. Any other columns follow sorted.
const LEADING_COLUMNS: [&str; 5] = [
    "instrument_name",
    "kind",
    "creation_timestamp",
    "expiration_timestamp",
    "is_active",
];

/// Writes the instrument list of `partition` to
/// `{base}/{currency}/{kind}/{currency}-{expired|active}-{kind}-list.csv`.
///
/// Rows keep their input order. The header is the union of all row keys, and a row
/// missing a column gets an empty value.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot be written.
pub fn write_instrument_catalog(
    base_dir: &Path,
    partition: &Partition,
    rows: &[BTreeMap<String, String>],
) -> anyhow::Result<PathBuf> {
    let path = partition.catalog_path(base_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let columns = catalog_columns(rows);
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    if !columns.is_empty() {
        writer.write_record(&columns)?;
    }
    for row in rows {
        writer.write_record(
            columns
                .iter()
                .map(|column| row.get(column).map_or("", String::as_str)),
        )?;
    }
    writer.flush()?;

    tracing::info!(
        "Saved {} {partition} instruments to {}",
        rows.len(),
        path.display()
    );
    Ok(path)
}

fn catalog_columns(rows: &[BTreeMap<String, String>]) -> Vec<String> {
    let keys: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();

    let leading = LEADING_COLUMNS.iter().filter(|c| keys.contains(*c)).copied();
    let rest = keys.iter().filter(|c| !LEADING_COLUMNS.contains(*c)).copied();
    leading.chain(rest).map(str::to_string).collect()
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tapefill_backfill::model::InstrumentKind;

    use super::*;

    fn row(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[rstest]
    fn test_write_instrument_catalog() {
        let tmp = tempfile::tempdir().unwrap();
        let partition = Partition::new("BTC", InstrumentKind::Option, true);
        let rows = vec![
            row(&[
                ("instrument_name", "BTC-1JAN25-100000-C"),
                ("kind", "option"),
                ("strike", "100000.0"),
            ]),
            row(&[
                ("instrument_name", "BTC-1JAN25-90000-P"),
                ("kind", "option"),
                ("option_type", "put"),
            ]),
        ];

        let path = write_instrument_catalog(tmp.path(), &partition, &rows).unwrap();

        assert_eq!(
            path,
            tmp.path().join("BTC/option/BTC-expired-option-list.csv")
        );
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "instrument_name,kind,option_type,strike\n\
             BTC-1JAN25-100000-C,option,,100000.0\n\
             BTC-1JAN25-90000-P,option,put,\n"
        );
    }

    #[rstest]
    fn test_empty_catalog_writes_empty_file() {
        let tmp = tempfile::tempdir().unwrap();
        let partition = Partition::new("ETH", InstrumentKind::Future, false);

        let path = write_instrument_catalog(tmp.path(), &partition, &[]).unwrap();

        assert!(path.is_file());
    }
}
