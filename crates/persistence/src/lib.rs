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

//! Durable output for reconstructed trade tapes.
//!
//! The `tapefill-persistence` crate writes backfill results to disk using a
//! `{base}/{currency}/{kind}/{expired|active}/` partition layout:
//!
//! - [`sink`]: a CSV [`OutputSink`](tapefill_backfill::sink::OutputSink) with atomic file replacement.
//! - [`catalog`]: the per-partition instrument list CSV.
//! - [`consolidate`]: merges every CSV of a partition into a single `data.parquet`.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod catalog;
pub mod consolidate;
pub mod partition;
pub mod sink;
