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

//! The seam between the engine and durable storage.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::model::BackfillResult;

/// Persists completed results.
///
/// Each result is handed over exactly once. Targets are unique per instrument or
/// window, so implementations need no coordination between concurrent calls.
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Persists `result`.
    ///
    /// # Errors
    ///
    /// Returns an error if the result could not be written.
    async fn persist(&self, result: &BackfillResult) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: OutputSink + ?Sized> OutputSink for Arc<T> {
    async fn persist(&self, result: &BackfillResult) -> anyhow::Result<()> {
        (**self).persist(result).await
    }
}

/// An [`OutputSink`] which keeps results in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    results: Mutex<Vec<BackfillResult>>,
    fail_on: Option<String>,
}

impl MemorySink {
    /// Creates a new empty [`MemorySink`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink which rejects every result whose file stem starts with `prefix`.
    #[must_use]
    pub fn failing_on(prefix: &str) -> Self {
        Self {
            results: Mutex::default(),
            fail_on: Some(prefix.to_string()),
        }
    }

    /// Returns the persisted results sorted by file stem.
    #[must_use]
    pub fn results(&self) -> Vec<BackfillResult> {
        let mut results = match self.results.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        results.sort_by_key(BackfillResult::file_stem);
        results
    }
}

#[async_trait]
impl OutputSink for MemorySink {
    async fn persist(&self, result: &BackfillResult) -> anyhow::Result<()> {
        let stem = result.file_stem();
        if let Some(prefix) = &self.fail_on
            && stem.starts_with(prefix.as_str())
        {
            anyhow::bail!("rejected {stem}");
        }

        self.results
            .lock()
            .map_err(|e| anyhow::anyhow!("sink lock poisoned: {e}"))?
            .push(result.clone());
        Ok(())
    }
}
