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

//! Core constants for the Deribit history API.

/// The Deribit history API base URL, which also serves expired instruments.
pub const DERIBIT_HISTORY_URL: &str = "https://history.deribit.com/api/v2";

/// Environment variable overriding [`DERIBIT_HISTORY_URL`].
pub const DERIBIT_BASE_URL_ENV: &str = "TAPEFILL_BASE_URL";

/// Maximum number of trades returned by one request.
pub const DERIBIT_MAX_COUNT: usize = 10_000;

/// JSON-RPC error code for `too_many_requests`.
pub const DERIBIT_TOO_MANY_REQUESTS: i64 = 10_028;

/// JSON-RPC error code for `retry`.
pub const DERIBIT_RETRY: i64 = 10_040;

/// JSON-RPC error codes for which the same request may succeed later.
pub const DERIBIT_RETRYABLE_CODES: [i64; 2] = [DERIBIT_TOO_MANY_REQUESTS, DERIBIT_RETRY];

/// Default per-request timeout in seconds.
pub const DERIBIT_DEFAULT_TIMEOUT_SECS: u64 = 60;
