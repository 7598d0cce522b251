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

//! Provides the HTTP client for the [Deribit](https://www.deribit.com) history API.
//!
//! The history API serves the full trade tape of live and expired instruments without
//! authentication. Deribit API reference <https://docs.deribit.com/>.

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Serialize, de::DeserializeOwned};
use tapefill_backfill::{
    error::FetchError,
    model::{InstrumentKind, SeqWindow, TimeWindow, TradeRecord},
    source::TradeSource,
};
use tapefill_core::env::get_or_env_var_opt;
use tapefill_network::{
    http::{HttpClient, HttpResponse},
    retry::{CANCELED_MESSAGE, RetryConfig, RetryManager},
};
use tokio_util::sync::CancellationToken;

use super::{
    error::DeribitHttpError,
    models::{DeribitInstrument, DeribitResponse, DeribitTradesPage},
    query::{
        GetInstrumentsParams, GetInstrumentsParamsBuilder, GetTradesBySeqParams,
        GetTradesBySeqParamsBuilder, GetTradesByTimeParams, GetTradesByTimeParamsBuilder,
    },
};
use crate::common::{
    consts::{DERIBIT_BASE_URL_ENV, DERIBIT_DEFAULT_TIMEOUT_SECS, DERIBIT_HISTORY_URL},
    enums::{DeribitCurrency, DeribitInstrumentKind},
    parse::parse_trade,
};

const MAX_ERROR_BODY_LEN: usize = 512;

/// Inner HTTP client implementation containing the actual HTTP logic.
pub struct DeribitHttpInnerClient {
    base_url: String,
    client: HttpClient,
    retry_manager: RetryManager<DeribitHttpError>,
    cancellation_token: CancellationToken,
}

impl Debug for DeribitHttpInnerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(DeribitHttpInnerClient))
            .field("base_url", &self.base_url)
            .field("retry_config", self.retry_manager.config())
            .finish()
    }
}

impl DeribitHttpInnerClient {
    /// Creates a new [`DeribitHttpInnerClient`], using the history URL by default.
    ///
    /// # Errors
    ///
    /// Returns an error if the retry configuration is invalid or the HTTP client cannot
    /// be built.
    pub fn new(
        base_url: Option<String>,
        timeout_secs: Option<u64>,
        retry_config: RetryConfig,
    ) -> Result<Self, DeribitHttpError> {
        let retry_manager = RetryManager::new(retry_config).map_err(|e| {
            DeribitHttpError::ValidationError(format!("Failed to create retry manager: {e}"))
        })?;
        let client = HttpClient::new(
            std::collections::HashMap::new(),
            Some(timeout_secs.unwrap_or(DERIBIT_DEFAULT_TIMEOUT_SECS)),
        )?;

        Ok(Self {
            base_url: base_url
                .unwrap_or_else(|| DERIBIT_HISTORY_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            client,
            retry_manager,
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Cancels all pending HTTP requests.
    pub fn cancel_all_requests(&self) {
        self.cancellation_token.cancel();
    }

    /// Returns the cancellation token for this client.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send_request<T: DeserializeOwned>(&self, path: &str) -> Result<T, DeribitHttpError> {
        let url = format!("{}{path}", self.base_url);

        let operation = || {
            let url = url.clone();
            async move {
                tracing::trace!("GET {url}");
                let response = self.client.get(url).await?;
                parse_response(&response)
            }
        };

        let should_retry = |error: &DeribitHttpError| -> bool { error.is_retryable() };
        let retry_after = |error: &DeribitHttpError| error.retry_after();

        let create_error = |msg: String| -> DeribitHttpError {
            if msg == CANCELED_MESSAGE {
                DeribitHttpError::Canceled("Request canceled".to_string())
            } else if msg.contains("timed out") {
                DeribitHttpError::Timeout(msg)
            } else {
                DeribitHttpError::NetworkError(msg)
            }
        };

        self.retry_manager
            .execute_with_retry_after(
                path,
                operation,
                should_retry,
                retry_after,
                create_error,
                &self.cancellation_token,
            )
            .await
    }

    fn build_path<S: Serialize>(base: &str, params: &S) -> Result<String, DeribitHttpError> {
        let query = serde_urlencoded::to_string(params)
            .map_err(|e| DeribitHttpError::ValidationError(e.to_string()))?;
        if query.is_empty() {
            Ok(base.to_owned())
        } else {
            Ok(format!("{base}?{query}"))
        }
    }

    /// Requests the instruments of a currency and kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the request terminally fails.
    ///
    /// # References
    ///
    /// - <https://docs.deribit.com/#public-get_instruments>
    pub async fn http_get_instruments(
        &self,
        params: &GetInstrumentsParams,
    ) -> Result<Vec<DeribitInstrument>, DeribitHttpError> {
        let path = Self::build_path("/public/get_instruments", params)?;
        self.send_request(&path).await
    }

    /// Requests the most recent trades inside a time range.
    ///
    /// # Errors
    ///
    /// Returns an error if the request terminally fails.
    ///
    /// # References
    ///
    /// - <https://docs.deribit.com/#public-get_last_trades_by_instrument_and_time>
    pub async fn http_get_trades_by_time(
        &self,
        params: &GetTradesByTimeParams,
    ) -> Result<DeribitTradesPage, DeribitHttpError> {
        let path = Self::build_path("/public/get_last_trades_by_instrument_and_time", params)?;
        self.send_request(&path).await
    }

    /// Requests trades inside a sequence range, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request terminally fails.
    ///
    /// # References
    ///
    /// - <https://docs.deribit.com/#public-get_last_trades_by_instrument>
    pub async fn http_get_trades_by_seq(
        &self,
        params: &GetTradesBySeqParams,
    ) -> Result<DeribitTradesPage, DeribitHttpError> {
        let path = Self::build_path("/public/get_last_trades_by_instrument", params)?;
        self.send_request(&path).await
    }
}

/// Decodes a JSON-RPC response into its `result`.
///
/// HTTP 429 is rate limiting whatever the body. A JSON-RPC `error` takes precedence over
/// the status code; any other non-success status is unexpected.
fn parse_response<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, DeribitHttpError> {
    if response.status == StatusCode::TOO_MANY_REQUESTS {
        return Err(DeribitHttpError::RateLimited {
            retry_after_secs: response.retry_after_secs(),
        });
    }

    let envelope: DeribitResponse<T> = match serde_json::from_slice(&response.body) {
        Ok(envelope) => envelope,
        Err(e) if response.status.is_success() => return Err(e.into()),
        Err(_) => return Err(unexpected_status(response)),
    };

    if let Some(error) = envelope.error {
        return Err(error.into());
    }
    if !response.status.is_success() {
        return Err(unexpected_status(response));
    }

    envelope
        .result
        .ok_or_else(|| DeribitHttpError::MissingResult(truncated_body(response)))
}

fn unexpected_status(response: &HttpResponse) -> DeribitHttpError {
    DeribitHttpError::UnexpectedStatus {
        status: response.status.as_u16(),
        body: truncated_body(response),
    }
}

fn truncated_body(response: &HttpResponse) -> String {
    let body = String::from_utf8_lossy(&response.body);
    match body.char_indices().nth(MAX_ERROR_BODY_LEN) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.into_owned(),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Outer Client
////////////////////////////////////////////////////////////////////////////////

/// Provides a HTTP client for the [Deribit](https://www.deribit.com) history API.
///
/// Implements [`TradeSource`] so it can be driven by the backfill engine.
#[derive(Clone)]
pub struct DeribitHttpClient {
    pub(crate) inner: Arc<DeribitHttpInnerClient>,
    include_old: bool,
}

impl Debug for DeribitHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(DeribitHttpClient))
            .field("inner", &self.inner)
            .field("include_old", &self.include_old)
            .finish()
    }
}

impl DeribitHttpClient {
    /// Creates a new [`DeribitHttpClient`].
    ///
    /// # Errors
    ///
    /// Returns an error if the retry configuration is invalid or the HTTP client cannot
    /// be built.
    pub fn new(
        base_url: Option<String>,
        timeout_secs: Option<u64>,
        retry_config: RetryConfig,
    ) -> Result<Self, DeribitHttpError> {
        Ok(Self {
            inner: Arc::new(DeribitHttpInnerClient::new(
                base_url,
                timeout_secs,
                retry_config,
            )?),
            include_old: false,
        })
    }

    /// Creates a new [`DeribitHttpClient`] whose base URL may be overridden by the
    /// `TAPEFILL_BASE_URL` environment variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created.
    pub fn from_env(
        base_url: Option<String>,
        timeout_secs: Option<u64>,
        retry_config: RetryConfig,
    ) -> Result<Self, DeribitHttpError> {
        let base_url = get_or_env_var_opt(base_url, DERIBIT_BASE_URL_ENV);
        Self::new(base_url, timeout_secs, retry_config)
    }

    /// Sets whether trade queries include trades older than the live retention window.
    ///
    /// Required for expired instruments.
    #[must_use]
    pub fn with_include_old(mut self, include_old: bool) -> Self {
        self.include_old = include_old;
        self
    }

    /// Returns whether trade queries include old trades.
    #[must_use]
    pub const fn include_old(&self) -> bool {
        self.include_old
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.inner.base_url()
    }

    /// Cancels all pending HTTP requests.
    pub fn cancel_all_requests(&self) {
        self.inner.cancel_all_requests();
    }

    /// Returns the cancellation token for this client.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        self.inner.cancellation_token()
    }

    /// Requests the instruments of `currency` and `kind`, either expired or active.
    ///
    /// # Errors
    ///
    /// Returns an error if the request terminally fails.
    pub async fn request_instruments(
        &self,
        currency: DeribitCurrency,
        kind: InstrumentKind,
        expired: bool,
    ) -> Result<Vec<DeribitInstrument>, DeribitHttpError> {
        let params = GetInstrumentsParamsBuilder::default()
            .currency(currency)
            .kind(DeribitInstrumentKind::from(kind))
            .expired(expired)
            .build()
            .map_err(|e| DeribitHttpError::ValidationError(e.to_string()))?;

        let instruments = self.inner.http_get_instruments(&params).await?;
        tracing::debug!(
            "Received {} {currency} {kind} instruments (expired={expired})",
            instruments.len()
        );
        Ok(instruments)
    }

    /// Requests up to `count` of the most recent trades inside `window`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request terminally fails.
    pub async fn request_trades_by_time(
        &self,
        instrument: &str,
        window: TimeWindow,
        count: usize,
    ) -> Result<Vec<TradeRecord>, DeribitHttpError> {
        let params = GetTradesByTimeParamsBuilder::default()
            .instrument_name(instrument)
            .start_timestamp(window.start_ms)
            .end_timestamp(window.end_ms)
            .count(count)
            .include_old(self.include_old)
            .build()
            .map_err(|e| DeribitHttpError::ValidationError(e.to_string()))?;

        let page = self.inner.http_get_trades_by_time(&params).await?;
        Ok(page.trades.iter().map(parse_trade).collect())
    }

    /// Requests up to `count` trades inside `window`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request terminally fails.
    pub async fn request_trades_by_seq(
        &self,
        instrument: &str,
        window: SeqWindow,
        count: usize,
    ) -> Result<Vec<TradeRecord>, DeribitHttpError> {
        let params = GetTradesBySeqParamsBuilder::default()
            .instrument_name(instrument)
            .start_seq(window.start_seq)
            .end_seq(window.end_seq)
            .count(count)
            .include_old(self.include_old)
            .build()
            .map_err(|e| DeribitHttpError::ValidationError(e.to_string()))?;

        let page = self.inner.http_get_trades_by_seq(&params).await?;
        Ok(page.trades.iter().map(parse_trade).collect())
    }
}

#[async_trait]
impl TradeSource for DeribitHttpClient {
    async fn fetch_trades_by_time(
        &self,
        instrument: &str,
        window: TimeWindow,
        count: usize,
    ) -> Result<Vec<TradeRecord>, FetchError> {
        Ok(self.request_trades_by_time(instrument, window, count).await?)
    }

    async fn fetch_trades_by_seq(
        &self,
        instrument: &str,
        window: SeqWindow,
        count: usize,
    ) -> Result<Vec<TradeRecord>, FetchError> {
        Ok(self.request_trades_by_seq(instrument, window, count).await?)
    }

    async fn fetch_latest_seq(
        &self,
        instrument: &str,
        end_ms: i64,
    ) -> Result<Option<i64>, FetchError> {
        let window = TimeWindow {
            start_ms: 0,
            end_ms: end_ms.max(0),
        };
        let trades = self.request_trades_by_time(instrument, window, 1).await?;
        Ok(trades.iter().map(|t| t.trade_seq).max())
    }
}
