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

//! The frozen reference time for a backfill run.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::datetime::{unix_millis_now, unix_millis_to_iso8601};

/// A point in time captured once at the start of a run.
///
/// Instruments which are still trading have no meaningful end of history, so their
/// expiration timestamp is clamped to this value. Capturing it once keeps every
/// instrument of a run consistent with the same cut-off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReferenceTime(i64);

impl ReferenceTime {
    /// Captures the current wall clock time.
    #[must_use]
    pub fn capture() -> Self {
        Self(unix_millis_now())
    }

    /// Creates a reference time from UNIX milliseconds.
    #[must_use]
    pub const fn from_millis(unix_millis: i64) -> Self {
        Self(unix_millis)
    }

    /// Returns the reference time as UNIX milliseconds.
    #[must_use]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Clamps `end_millis` so it never lies beyond the reference time.
    #[must_use]
    pub fn clamp(&self, end_millis: i64) -> i64 {
        end_millis.min(self.0)
    }
}

impl Display for ReferenceTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", unix_millis_to_iso8601(self.0))
    }
}
