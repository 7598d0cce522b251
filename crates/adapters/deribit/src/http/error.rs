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

//! Error types for the Deribit HTTP client.
//!
//! Errors are classified into transient failures, which the client retries, and
//! terminal ones. The classification is shared with the backfill engine through the
//! conversion into [`FetchError`].

use std::time::Duration;

use tapefill_backfill::error::FetchError;
use tapefill_network::http::HttpClientError;
use thiserror::Error;

use crate::{common::consts::DERIBIT_RETRYABLE_CODES, http::models::DeribitErrorMsg};

/// A typed error enumeration for the Deribit HTTP client.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeribitHttpError {
    /// The request or its response was lost at the transport level.
    #[error("Network error: {0}")]
    NetworkError(String),
    /// An attempt exceeded its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),
    /// HTTP 429.
    #[error("Rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },
    /// Any other non-success HTTP status without a JSON-RPC error body.
    #[error("Unexpected HTTP status code {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    /// A JSON-RPC error object returned by Deribit.
    #[error("Deribit error {code}: {message}")]
    DeribitError { code: i64, message: String },
    /// The envelope had neither `result` nor `error`.
    #[error("Missing result: {0}")]
    MissingResult(String),
    /// The body could not be decoded.
    #[error("JSON error: {0}")]
    JsonError(String),
    /// Query parameters failed validation.
    #[error("Parameter validation error: {0}")]
    ValidationError(String),
    /// The request was canceled.
    #[error("Request canceled: {0}")]
    Canceled(String),
}

impl DeribitHttpError {
    /// Returns whether the same request may succeed if retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError(_) | Self::Timeout(_) | Self::RateLimited { .. } => true,
            Self::UnexpectedStatus { status, .. } => *status >= 500,
            Self::DeribitError { code, .. } => DERIBIT_RETRYABLE_CODES.contains(code),
            Self::MissingResult(_)
            | Self::JsonError(_)
            | Self::ValidationError(_)
            | Self::Canceled(_) => false,
        }
    }

    /// Returns the minimum wait the server asked for before the next request.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_secs } => retry_after_secs.map(Duration::from_secs),
            _ => None,
        }
    }
}

impl From<HttpClientError> for DeribitHttpError {
    fn from(error: HttpClientError) -> Self {
        match error {
            HttpClientError::TimeoutError(msg) => Self::Timeout(msg),
            HttpClientError::ConfigError(msg) => Self::ValidationError(msg),
            other => Self::NetworkError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DeribitHttpError {
    fn from(error: serde_json::Error) -> Self {
        Self::JsonError(error.to_string())
    }
}

impl From<DeribitErrorMsg> for DeribitHttpError {
    fn from(error: DeribitErrorMsg) -> Self {
        Self::DeribitError {
            code: error.code,
            message: error.message,
        }
    }
}

impl From<DeribitHttpError> for FetchError {
    fn from(error: DeribitHttpError) -> Self {
        let text = error.to_string();
        match error {
            DeribitHttpError::NetworkError(_) => Self::Transient(text),
            DeribitHttpError::Timeout(_) => Self::Timeout(text),
            DeribitHttpError::RateLimited { .. } => Self::RateLimited(text),
            DeribitHttpError::UnexpectedStatus { status, body } if status >= 500 => {
                Self::Transient(format!("HTTP {status}: {body}"))
            }
            DeribitHttpError::UnexpectedStatus { status, body } => Self::Venue {
                code: i64::from(status),
                message: body,
            },
            DeribitHttpError::DeribitError { code, .. }
                if DERIBIT_RETRYABLE_CODES.contains(&code) =>
            {
                Self::RateLimited(text)
            }
            DeribitHttpError::DeribitError { code, message } => Self::Venue { code, message },
            DeribitHttpError::MissingResult(_)
            | DeribitHttpError::JsonError(_)
            | DeribitHttpError::ValidationError(_) => Self::Malformed(text),
            DeribitHttpError::Canceled(_) => Self::Canceled(text),
        }
    }
}
