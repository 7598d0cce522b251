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

//! Adapter for the [Deribit](https://www.deribit.com) history API.
//!
//! The `tapefill-deribit` crate provides an HTTP client for the public, unauthenticated
//! history endpoints at <https://history.deribit.com/api/v2>, which serve the complete
//! trade tape of live and expired options and futures:
//!
//! - `public/get_instruments` lists the instruments of a currency and kind.
//! - `public/get_last_trades_by_instrument_and_time` pages trades by time.
//! - `public/get_last_trades_by_instrument` pages trades by sequence number.
//!
//! [`DeribitHttpClient`](http::client::DeribitHttpClient) implements
//! [`TradeSource`](tapefill_backfill::source::TradeSource), retrying transient failures
//! (transport errors, HTTP 429/5xx and the `too_many_requests`/`retry` error codes) with
//! bounded exponential backoff.
//!
//! The Deribit API reference can be found at <https://docs.deribit.com/>.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod common;
pub mod http;
