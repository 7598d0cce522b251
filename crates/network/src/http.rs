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

//! A thin asynchronous HTTP client over `reqwest`.
//!
//! Venue adapters own request building and response decoding; this module only moves
//! bytes and classifies transport failures.

use std::{collections::HashMap, time::Duration};

use reqwest::{
    Method, StatusCode,
    header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT},
};
use tapefill_core::consts::TAPEFILL_USER_AGENT;

/// Errors returned by [`HttpClient`].
#[derive(Debug, thiserror::Error)]
pub enum HttpClientError {
    /// The request did not complete before the client timeout.
    #[error("HTTP request timed out: {0}")]
    TimeoutError(String),
    /// A connection could not be established or was reset.
    #[error("HTTP connection error: {0}")]
    ConnectionError(String),
    /// The client was misconfigured, e.g. an invalid header.
    #[error("HTTP client configuration error: {0}")]
    ConfigError(String),
    /// Any other transport level failure.
    #[error("HTTP error: {0}")]
    Error(String),
}

impl From<reqwest::Error> for HttpClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::TimeoutError(error.to_string())
        } else if error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if error.is_builder() {
            Self::ConfigError(error.to_string())
        } else {
            Self::Error(error.to_string())
        }
    }
}

/// A raw HTTP response.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// The response status code.
    pub status: StatusCode,
    /// The response headers, lower-cased names.
    pub headers: HashMap<String, String>,
    /// The raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns the value of the `retry-after` header in seconds, if present.
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.headers
            .get("retry-after")
            .and_then(|value| value.trim().parse().ok())
    }
}

/// An HTTP client with default headers and a request timeout.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Creates a new [`HttpClient`].
    ///
    /// # Errors
    ///
    /// Returns an error if a header is invalid or the TLS backend fails to initialize.
    pub fn new(
        headers: HashMap<String, String>,
        timeout_secs: Option<u64>,
    ) -> Result<Self, HttpClientError> {
        let mut header_map = HeaderMap::new();
        header_map.insert(
            USER_AGENT,
            HeaderValue::from_str(TAPEFILL_USER_AGENT.as_str())
                .map_err(|e| HttpClientError::ConfigError(e.to_string()))?,
        );
        for (key, value) in &headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| HttpClientError::ConfigError(format!("header '{key}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| HttpClientError::ConfigError(format!("header '{key}': {e}")))?;
            header_map.insert(name, value);
        }

        let mut builder = reqwest::Client::builder().default_headers(header_map);
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Sends a request and collects the full response body.
    ///
    /// Non-success status codes are returned as a normal [`HttpResponse`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails at the transport level.
    pub async fn request(
        &self,
        method: Method,
        url: String,
        headers: Option<HashMap<String, String>>,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, HttpClientError> {
        let mut request = self.client.request(method, url);
        for (key, value) in headers.unwrap_or_default() {
            request = request.header(key, value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    /// Sends a `GET` request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails at the transport level.
    pub async fn get(&self, url: String) -> Result<HttpResponse, HttpClientError> {
        self.request(Method::GET, url, None, None).await
    }
}
