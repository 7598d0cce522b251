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

//! Directory layout of persisted output.

use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use anyhow::Context;
use tapefill_backfill::model::InstrumentKind;
use ustr::Ustr;

/// File name of the consolidated Parquet file inside a partition directory.
pub const PARQUET_FILE_NAME: &str = "data.parquet";

/// Identifies one `(currency, kind, expiry state)` slice of the output tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Partition {
    /// The settlement currency, e.g. `BTC`.
    pub currency: Ustr,
    /// The instrument kind.
    pub kind: InstrumentKind,
    /// Whether the partition holds expired instruments.
    pub expired: bool,
}

impl Partition {
    /// Creates a new [`Partition`].
    #[must_use]
    pub fn new(currency: &str, kind: InstrumentKind, expired: bool) -> Self {
        Self {
            currency: Ustr::from(currency),
            kind,
            expired,
        }
    }

    /// Returns `expired` or `active`.
    #[must_use]
    pub const fn state(&self) -> &'static str {
        if self.expired { "expired" } else { "active" }
    }

    /// Returns `{base}/{currency}/{kind}`.
    #[must_use]
    pub fn kind_dir(&self, base_dir: &Path) -> PathBuf {
        base_dir
            .join(self.currency.as_str())
            .join(self.kind.as_ref())
    }

    /// Returns `{base}/{currency}/{kind}/{expired|active}`, where trade files live.
    #[must_use]
    pub fn dir(&self, base_dir: &Path) -> PathBuf {
        self.kind_dir(base_dir).join(self.state())
    }

    /// Returns the path of the instrument catalog CSV for this partition.
    #[must_use]
    pub fn catalog_path(&self, base_dir: &Path) -> PathBuf {
        self.kind_dir(base_dir).join(format!(
            "{}-{}-{}-list.csv",
            self.currency,
            self.state(),
            self.kind
        ))
    }

    /// Creates the partition directory tree under `base_dir` if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn prepare_dirs(&self, base_dir: &Path) -> anyhow::Result<PathBuf> {
        let dir = self.dir(base_dir);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        Ok(dir)
    }
}

impl Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.currency, self.kind, self.state())
    }
}
