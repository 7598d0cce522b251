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

//! Splits an instrument's range into bounded windows.
//!
//! Windows are pairwise disjoint, contiguous and cover the input range exactly. Sizing
//! only affects parallelism and per-request work; a window holding more trades than fit
//! on one page is still fully recovered by pagination.

use crate::model::{SeqWindow, TimeWindow};

/// Plans time and sequence windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowPlanner {
    chunk_ms: Option<i64>,
    seq_span: i64,
}

impl WindowPlanner {
    /// Creates a new [`WindowPlanner`].
    ///
    /// A `chunk_ms` of `None` plans the whole range as a single time window. Non-positive
    /// sizes are treated as one.
    #[must_use]
    pub fn new(chunk_ms: Option<i64>, seq_span: i64) -> Self {
        Self {
            chunk_ms: chunk_ms.map(|chunk| chunk.max(1)),
            seq_span: seq_span.max(1),
        }
    }

    /// Plans `range` into time windows no longer than the chunk size.
    #[must_use]
    pub fn plan(&self, range: TimeWindow) -> Vec<TimeWindow> {
        match self.chunk_ms {
            None => vec![range],
            Some(chunk) => split(range.start_ms, range.end_ms, chunk)
                .map(|(start_ms, end_ms)| TimeWindow { start_ms, end_ms })
                .collect(),
        }
    }

    /// Plans `range` into sequence windows no longer than the sequence span.
    #[must_use]
    pub fn plan_seq(&self, range: SeqWindow) -> Vec<SeqWindow> {
        split(range.start_seq, range.end_seq, self.seq_span)
            .map(|(start_seq, end_seq)| SeqWindow { start_seq, end_seq })
            .collect()
    }
}

fn split(start: i64, end: i64, size: i64) -> impl Iterator<Item = (i64, i64)> {
    let mut next = Some(start);
    std::iter::from_fn(move || {
        let lo = next?;
        let hi = lo.saturating_add(size - 1).min(end);
        next = if hi >= end { None } else { Some(hi + 1) };
        Some((lo, hi))
    })
}
