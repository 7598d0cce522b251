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

//! The seam between the engine and a venue's trade history API.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::FetchError,
    model::{SeqWindow, TimeWindow, TradeRecord},
};

/// A source of historical trade pages.
///
/// Each call is a single bounded request; implementations retry transient failures
/// internally and surface only terminal errors.
#[async_trait]
pub trait TradeSource: Send + Sync {
    /// Fetches up to `count` of the most recent trades inside `window`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request terminally fails.
    async fn fetch_trades_by_time(
        &self,
        instrument: &str,
        window: TimeWindow,
        count: usize,
    ) -> Result<Vec<TradeRecord>, FetchError>;

    /// Fetches up to `count` trades with sequence numbers inside `window`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request terminally fails.
    async fn fetch_trades_by_seq(
        &self,
        instrument: &str,
        window: SeqWindow,
        count: usize,
    ) -> Result<Vec<TradeRecord>, FetchError>;

    /// Returns the sequence number of the last trade at or before `end_ms`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the request terminally fails.
    async fn fetch_latest_seq(&self, instrument: &str, end_ms: i64)
    -> Result<Option<i64>, FetchError>;
}

#[async_trait]
impl<T: TradeSource + ?Sized> TradeSource for Arc<T> {
    async fn fetch_trades_by_time(
        &self,
        instrument: &str,
        window: TimeWindow,
        count: usize,
    ) -> Result<Vec<TradeRecord>, FetchError> {
        (**self).fetch_trades_by_time(instrument, window, count).await
    }

    async fn fetch_trades_by_seq(
        &self,
        instrument: &str,
        window: SeqWindow,
        count: usize,
    ) -> Result<Vec<TradeRecord>, FetchError> {
        (**self).fetch_trades_by_seq(instrument, window, count).await
    }

    async fn fetch_latest_seq(
        &self,
        instrument: &str,
        end_ms: i64,
    ) -> Result<Option<i64>, FetchError> {
        (**self).fetch_latest_seq(instrument, end_ms).await
    }
}

#[async_trait]
impl<T: TradeSource + ?Sized> TradeSource for &T {
    async fn fetch_trades_by_time(
        &self,
        instrument: &str,
        window: TimeWindow,
        count: usize,
    ) -> Result<Vec<TradeRecord>, FetchError> {
        (**self).fetch_trades_by_time(instrument, window, count).await
    }

    async fn fetch_trades_by_seq(
        &self,
        instrument: &str,
        window: SeqWindow,
        count: usize,
    ) -> Result<Vec<TradeRecord>, FetchError> {
        (**self).fetch_trades_by_seq(instrument, window, count).await
    }

    async fn fetch_latest_seq(
        &self,
        instrument: &str,
        end_ms: i64,
    ) -> Result<Option<i64>, FetchError> {
        (**self).fetch_latest_seq(instrument, end_ms).await
    }
}
