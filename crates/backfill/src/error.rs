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

//! Error types for fetching and backfilling.

use thiserror::Error;

/// A failure to fetch one page, or to complete one window.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Transport failure such as a reset connection or an HTTP 5xx.
    #[error("transient error: {0}")]
    Transient(String),
    /// The venue throttled the request.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// An attempt or task exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),
    /// The response could not be decoded or is missing its result.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The venue returned an error which retrying will not fix.
    #[error("venue error {code}: {message}")]
    Venue {
        /// The venue error code.
        code: i64,
        /// The venue error message.
        message: String,
    },
    /// Pagination did not terminate within the configured page ceiling.
    #[error("page ceiling of {0} requests reached")]
    PageCeiling(usize),
    /// A full page held a single millisecond, so the time cursor cannot advance.
    #[error("saturated timestamp {0}: a full page shares one millisecond")]
    SaturatedTimestamp(i64),
    /// The run was canceled.
    #[error("canceled: {0}")]
    Canceled(String),
}

impl FetchError {
    /// Returns whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transient(_) | Self::RateLimited(_) | Self::Timeout(_)
        )
    }

    /// Returns whether the error is due to rate limiting.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

/// An invalid [`BackfillConfig`](crate::config::BackfillConfig).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A setting which must be positive was zero or negative.
    #[error("'{0}' must be positive")]
    NotPositive(&'static str),
    /// Nested fan-out could exceed the global request ceiling.
    #[error(
        "max_instruments ({instruments}) * max_windows_per_instrument ({windows}) exceeds max_in_flight ({in_flight})"
    )]
    FanOutExceedsBudget {
        /// Concurrent instruments.
        instruments: usize,
        /// Concurrent windows per instrument.
        windows: usize,
        /// Global in-flight ceiling.
        in_flight: usize,
    },
    /// The page size is above what the venue serves.
    #[error("page_size {page_size} exceeds the venue maximum of {max}")]
    PageSizeTooLarge {
        /// Requested page size.
        page_size: usize,
        /// Venue maximum.
        max: usize,
    },
}
