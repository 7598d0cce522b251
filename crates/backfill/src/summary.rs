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

//! End-of-run summary of instrument reports.

use std::fmt::Display;

use tabled::{Table, Tabled, settings::Style};

use crate::{
    model::WindowGap,
    orchestrator::{InstrumentReport, InstrumentState},
};

#[derive(Tabled)]
struct SummaryRow {
    instruments: usize,
    persisted: usize,
    partial: usize,
    failed: usize,
    windows: String,
    trades: usize,
    requests: usize,
}

#[derive(Tabled)]
struct GapRow {
    instrument: String,
    window: String,
    error: String,
}

/// Totals over all instrument reports of a run.
#[derive(Clone, Debug, Default)]
pub struct BackfillSummary {
    /// Instruments processed.
    pub instruments: usize,
    /// Instruments persisted, including partial ones.
    pub persisted: usize,
    /// Instruments persisted with gaps.
    pub partial: usize,
    /// Instruments failed, with their reason.
    pub failed: Vec<(String, String)>,
    /// Windows planned.
    pub windows_planned: usize,
    /// Windows fetched successfully.
    pub windows_ok: usize,
    /// Trades persisted.
    pub trades: usize,
    /// Page requests made.
    pub requests: usize,
    /// Every failed window.
    pub gaps: Vec<WindowGap>,
}

impl BackfillSummary {
    /// Adds one instrument report.
    pub fn record(&mut self, report: &InstrumentReport) {
        self.instruments += 1;
        self.windows_planned += report.windows_planned;
        self.windows_ok += report.windows_ok;
        self.trades += report.trades;
        self.requests += report.requests;
        self.gaps.extend(report.gaps.iter().cloned());

        match report.state {
            InstrumentState::Persisted => {
                self.persisted += 1;
                if report.is_partial() {
                    self.partial += 1;
                }
            }
            _ => self.failed.push((
                report.instrument.name.to_string(),
                report.error.clone().unwrap_or_default(),
            )),
        }
    }

    /// Returns whether every instrument was persisted.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Renders the totals and the gaps as tables.
    #[must_use]
    pub fn to_table(&self) -> String {
        let totals = SummaryRow {
            instruments: self.instruments,
            persisted: self.persisted,
            partial: self.partial,
            failed: self.failed.len(),
            windows: format!("{}/{}", self.windows_ok, self.windows_planned),
            trades: self.trades,
            requests: self.requests,
        };
        let mut out = Table::new([totals]).with(Style::rounded()).to_string();

        if !self.gaps.is_empty() {
            let mut gaps: Vec<GapRow> = self
                .gaps
                .iter()
                .map(|gap| GapRow {
                    instrument: gap.instrument.to_string(),
                    window: gap.window.to_string(),
                    error: gap.error.to_string(),
                })
                .collect();
            gaps.sort_by(|a, b| (&a.instrument, &a.window).cmp(&(&b.instrument, &b.window)));
            out.push('\n');
            out.push_str(&Table::new(gaps).with(Style::rounded()).to_string());
        }

        out
    }
}

impl<'a> FromIterator<&'a InstrumentReport> for BackfillSummary {
    fn from_iter<I: IntoIterator<Item = &'a InstrumentReport>>(iter: I) -> Self {
        let mut summary = Self::default();
        for report in iter {
            summary.record(report);
        }
        summary
    }
}

impl Display for BackfillSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_table())
    }
}
