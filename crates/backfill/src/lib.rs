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

//! The backfill engine for reconstructing historical trade tapes.
//!
//! The `tapefill-backfill` crate turns a list of instruments into complete, ordered and
//! duplicate-free trade sequences, fetched from a paginated and rate-limited
//! [`TradeSource`](source::TradeSource):
//!
//! - [`planner`]: splits an instrument's valid range into bounded windows.
//! - [`walker`]: paginates one window backward in time or forward in sequence space.
//! - [`scheduler`]: bounds in-flight requests with one global admission budget.
//! - [`orchestrator`]: drives each instrument through its lifecycle and hands results to
//!   an [`OutputSink`](sink::OutputSink).
//! - [`summary`]: totals and gaps for the end of a run.
//!
//! [`testing`] provides an in-memory source with synthetic tapes.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod planner;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod summary;
pub mod testing;
pub mod walker;
