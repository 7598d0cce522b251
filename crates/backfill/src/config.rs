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

//! Immutable configuration for a backfill run.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::ConfigError;

/// Largest page the venue serves in one call.
pub const MAX_PAGE_SIZE: usize = 10_000;

/// How windows are laid out and walked.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaginationMode {
    /// Backward pagination over time windows.
    #[default]
    Time,
    /// Forward pagination over trade sequence windows.
    Sequence,
}

/// How the cursor moves after a full time page.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BoundaryMode {
    /// The next page ends at the oldest timestamp of the previous page, re-fetching that
    /// millisecond. Trades sharing it are kept once by `trade_seq`.
    #[default]
    Inclusive,
    /// The next page ends one millisecond before the oldest timestamp of the previous page.
    Exclusive,
}

/// How results are grouped for the output sink.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive, serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Partitioning {
    /// One result per instrument.
    #[default]
    PerInstrument,
    /// One result per window.
    PerWindow,
}

/// Configuration for a backfill run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    /// Page size requested per call, at most [`MAX_PAGE_SIZE`].
    pub page_size: usize,
    /// Time window length in milliseconds, `None` for one window per instrument.
    pub chunk_ms: Option<i64>,
    /// Pagination mode.
    pub pagination: PaginationMode,
    /// Cursor policy for time pagination.
    pub boundary: BoundaryMode,
    /// Output grouping.
    pub partitioning: Partitioning,
    /// Global ceiling on simultaneously in-flight requests.
    pub max_in_flight: usize,
    /// Instruments processed concurrently.
    pub max_instruments: usize,
    /// Windows processed concurrently per instrument.
    pub max_windows_per_instrument: usize,
    /// Deadline for a single window in milliseconds.
    pub task_timeout_ms: Option<u64>,
    /// Maximum number of pages walked for one window.
    pub max_pages_per_window: usize,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            chunk_ms: None,
            pagination: PaginationMode::Time,
            boundary: BoundaryMode::Inclusive,
            partitioning: Partitioning::PerInstrument,
            max_in_flight: 200,
            max_instruments: 20,
            max_windows_per_instrument: 10,
            task_timeout_ms: Some(30 * 60 * 1_000),
            max_pages_per_window: 100_000,
        }
    }
}

impl BackfillConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a count is zero, the page size exceeds [`MAX_PAGE_SIZE`],
    /// or `max_instruments * max_windows_per_instrument > max_in_flight`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::NotPositive("page_size"));
        }
        if self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::PageSizeTooLarge {
                page_size: self.page_size,
                max: MAX_PAGE_SIZE,
            });
        }
        if self.chunk_ms.is_some_and(|chunk| chunk <= 0) {
            return Err(ConfigError::NotPositive("chunk_ms"));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::NotPositive("max_in_flight"));
        }
        if self.max_instruments == 0 {
            return Err(ConfigError::NotPositive("max_instruments"));
        }
        if self.max_windows_per_instrument == 0 {
            return Err(ConfigError::NotPositive("max_windows_per_instrument"));
        }
        if self.task_timeout_ms == Some(0) {
            return Err(ConfigError::NotPositive("task_timeout_ms"));
        }
        if self.max_pages_per_window == 0 {
            return Err(ConfigError::NotPositive("max_pages_per_window"));
        }

        let fan_out = self
            .max_instruments
            .saturating_mul(self.max_windows_per_instrument);
        if fan_out > self.max_in_flight {
            return Err(ConfigError::FanOutExceedsBudget {
                instruments: self.max_instruments,
                windows: self.max_windows_per_instrument,
                in_flight: self.max_in_flight,
            });
        }

        Ok(())
    }

    /// Returns the window deadline as a [`Duration`].
    #[must_use]
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_ms.map(Duration::from_millis)
    }

    /// Returns the span of one sequence window.
    #[must_use]
    pub const fn seq_span(&self) -> i64 {
        self.page_size as i64
    }
}
