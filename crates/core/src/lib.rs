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

//! Core foundational types and utilities for the `tapefill` backfill engine.
//!
//! The `tapefill-core` crate is deliberately small. It supplies the building blocks shared
//! by every other crate in the workspace:
//!
//! - Version and user agent constants.
//! - Millisecond timestamp conversions and formatting.
//! - The frozen reference time used to snapshot live instruments.
//! - A table-driven finite-state machine.
//! - Environment variable helpers.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod consts;
pub mod datetime;
pub mod env;
pub mod fsm;
pub mod time;

// Re-exports
pub use crate::time::ReferenceTime;
