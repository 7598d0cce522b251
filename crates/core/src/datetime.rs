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

//! Common date and time functions for millisecond UNIX timestamps.

use chrono::{DateTime, SecondsFormat, Utc};

/// Number of milliseconds in one second.
pub const MILLISECONDS_IN_SECOND: i64 = 1_000;

/// Number of milliseconds in one minute.
pub const MILLISECONDS_IN_MINUTE: i64 = 60 * MILLISECONDS_IN_SECOND;

/// Number of milliseconds in one hour.
pub const MILLISECONDS_IN_HOUR: i64 = 60 * MILLISECONDS_IN_MINUTE;

/// Number of milliseconds in one day.
pub const MILLISECONDS_IN_DAY: i64 = 24 * MILLISECONDS_IN_HOUR;

/// Returns the current UNIX time in milliseconds.
#[must_use]
pub fn unix_millis_now() -> i64 {
    Utc::now().timestamp_millis()
}

/// Converts a UNIX milliseconds timestamp to a UTC datetime.
///
/// Returns `None` if the timestamp is out of range for [`DateTime<Utc>`].
#[must_use]
pub fn millis_to_datetime_utc(unix_millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(unix_millis)
}

/// Converts a UNIX milliseconds timestamp to an ISO 8601 (RFC 3339) format string
/// with millisecond precision.
///
/// Out of range timestamps are rendered as the raw integer.
#[must_use]
pub fn unix_millis_to_iso8601(unix_millis: i64) -> String {
    match millis_to_datetime_utc(unix_millis) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => unix_millis.to_string(),
    }
}

/// Converts an ISO 8601 (RFC 3339) string to UNIX milliseconds.
///
/// # Errors
///
/// Returns an error if the string is not a valid RFC 3339 timestamp.
pub fn iso8601_to_unix_millis(date_string: &str) -> anyhow::Result<i64> {
    DateTime::parse_from_rfc3339(date_string)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| anyhow::anyhow!("Failed to parse ISO 8601 string '{date_string}': {e}"))
}
