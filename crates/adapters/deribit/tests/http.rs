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

//! Integration tests for the Deribit HTTP client using a mock server.

use std::{
    collections::HashMap,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use rstest::rstest;
use serde_json::{Value, json};
use tapefill_backfill::{
    config::BackfillConfig,
    error::FetchError,
    model::{Instrument, InstrumentKind, SeqWindow, TimeWindow},
    orchestrator::{BackfillOrchestrator, InstrumentState, SnapshotMode},
    sink::MemorySink,
    source::TradeSource,
};
use tapefill_deribit::{
    common::{enums::DeribitCurrency, parse::parse_instrument},
    http::{client::DeribitHttpClient, error::DeribitHttpError},
};
use tapefill_network::retry::RetryConfig;

const TAPE_LEN: i64 = 25;

#[derive(Clone, Default)]
struct TestServerState {
    requests: Arc<Mutex<HashMap<String, usize>>>,
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

impl TestServerState {
    /// Records a request and returns how many were made for `key`, this one included.
    fn record(&self, key: &str, query: &HashMap<String, String>) -> usize {
        self.queries.lock().unwrap().push(query.clone());
        let mut requests = self.requests.lock().unwrap();
        let count = requests.entry(key.to_string()).or_default();
        *count += 1;
        *count
    }

    fn count(&self, key: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or_default()
    }
}

fn load_test_data(file_name: &str) -> Value {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_data")
        .join(file_name);
    let content = std::fs::read_to_string(path).expect("Failed to read test data");
    serde_json::from_str(&content).expect("Failed to parse test data")
}

fn trade_json(instrument: &str, seq: i64) -> Value {
    json!({
        "trade_seq": seq,
        "trade_id": format!("{seq}"),
        "timestamp": 1_000 + seq,
        "tick_direction": 0,
        "price": 65000.5,
        "mark_price": 65001.0,
        "instrument_name": instrument,
        "index_price": 64999.0,
        "direction": if seq % 2 == 0 { "buy" } else { "sell" },
        "amount": 10.0,
        "contracts": 1.0
    })
}

fn trades_result(trades: Vec<Value>) -> Json<Value> {
    Json(json!({
        "jsonrpc": "2.0",
        "result": { "trades": trades, "has_more": false },
        "usIn": 1,
        "usOut": 2
    }))
}

fn param<T: std::str::FromStr>(query: &HashMap<String, String>, key: &str) -> T
where
    T::Err: std::fmt::Debug,
{
    query[key].parse().unwrap()
}

async fn handle_get_instruments(
    State(state): State<TestServerState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.record("instruments", &query);
    Json(load_test_data("http_get_instruments.json")).into_response()
}

async fn handle_trades_by_time(
    State(state): State<TestServerState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let instrument = query["instrument_name"].clone();
    let attempt = state.record(&instrument, &query);

    match instrument.as_str() {
        "RATE-LIMITED" if attempt == 1 => {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                [("retry-after", "0")],
                "Too Many Requests",
            )
                .into_response();
        }
        "SLOW-DOWN" if attempt == 1 => {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                [("retry-after", "1")],
                "Too Many Requests",
            )
                .into_response();
        }
        "CODE-10028" if attempt == 1 => {
            return (
                StatusCode::BAD_REQUEST,
                Json(load_test_data("http_error_too_many_requests.json")),
            )
                .into_response();
        }
        "SERVER-ERROR" => {
            return (StatusCode::BAD_GATEWAY, "bad gateway").into_response();
        }
        "BROKEN" => {
            return Json(json!({ "jsonrpc": "2.0", "usIn": 1, "usOut": 2 })).into_response();
        }
        "UNKNOWN" => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "jsonrpc": "2.0",
                    "error": { "code": 13020, "message": "not_found" }
                })),
            )
                .into_response();
        }
        _ => {}
    }

    let start: i64 = param(&query, "start_timestamp");
    let end: i64 = param(&query, "end_timestamp");
    let count: i64 = param(&query, "count");
    let mut trades: Vec<Value> = (1..=TAPE_LEN)
        .filter(|seq| (start..=end).contains(&(1_000 + seq)))
        .map(|seq| trade_json(&instrument, seq))
        .collect();
    let skip = trades.len().saturating_sub(count as usize);
    trades.drain(..skip);
    trades_result(trades).into_response()
}

async fn handle_trades_by_seq(
    State(state): State<TestServerState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let instrument = query["instrument_name"].clone();
    state.record(&instrument, &query);

    let start: i64 = param(&query, "start_seq");
    let end: i64 = param(&query, "end_seq");
    let count: usize = param(&query, "count");
    let trades = (start.max(1)..=end.min(TAPE_LEN))
        .take(count)
        .map(|seq| trade_json(&instrument, seq))
        .collect();
    trades_result(trades).into_response()
}

async fn start_mock_server(state: TestServerState) -> SocketAddr {
    let router = Router::new()
        .route("/api/v2/public/get_instruments", get(handle_get_instruments))
        .route(
            "/api/v2/public/get_last_trades_by_instrument_and_time",
            get(handle_trades_by_time),
        )
        .route(
            "/api/v2/public/get_last_trades_by_instrument",
            get(handle_trades_by_seq),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn fast_retry_config() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_delay_ms: 10,
        max_delay_ms: 50,
        backoff_factor: 2.0,
        jitter_ms: 0,
        operation_timeout_ms: Some(5_000),
        immediate_first: false,
        max_elapsed_ms: Some(10_000),
    }
}

async fn setup() -> (TestServerState, DeribitHttpClient) {
    let state = TestServerState::default();
    let addr = start_mock_server(state.clone()).await;
    let client = DeribitHttpClient::new(
        Some(format!("http://{addr}/api/v2")),
        Some(5),
        fast_retry_config(),
    )
    .unwrap()
    .with_include_old(true);
    (state, client)
}

#[rstest]
#[tokio::test]
async fn test_request_instruments() {
    let (state, client) = setup().await;

    let instruments = client
        .request_instruments(DeribitCurrency::Btc, InstrumentKind::Option, true)
        .await
        .unwrap();

    assert_eq!(instruments.len(), 2);
    assert_eq!(parse_instrument(&instruments[0]).unwrap().kind, InstrumentKind::Option);
    let query = state.queries.lock().unwrap()[0].clone();
    assert_eq!(query["currency"], "BTC");
    assert_eq!(query["kind"], "option");
    assert_eq!(query["expired"], "true");
}

#[rstest]
#[tokio::test]
async fn test_trades_by_time_sends_inclusive_bounds() {
    let (state, client) = setup().await;
    let window = TimeWindow::new(1_005, 1_009).unwrap();

    let trades = client
        .fetch_trades_by_time("BTC-PERPETUAL", window, 10_000)
        .await
        .unwrap();

    let seqs: Vec<i64> = trades.iter().map(|t| t.trade_seq).collect();
    assert_eq!(seqs, vec![5, 6, 7, 8, 9]);
    let query = state.queries.lock().unwrap()[0].clone();
    assert_eq!(query["start_timestamp"], "1005");
    assert_eq!(query["end_timestamp"], "1009");
    assert_eq!(query["include_old"], "true");
}

#[rstest]
#[tokio::test]
async fn test_http_429_is_retried() {
    let (state, client) = setup().await;

    let trades = client
        .fetch_trades_by_time("RATE-LIMITED", TimeWindow::new(0, 5_000).unwrap(), 100)
        .await
        .unwrap();

    assert_eq!(trades.len(), TAPE_LEN as usize);
    assert_eq!(state.count("RATE-LIMITED"), 2);
}

#[rstest]
#[tokio::test]
async fn test_http_429_waits_for_retry_after() {
    let (state, client) = setup().await;

    let start = std::time::Instant::now();
    let trades = client
        .fetch_trades_by_time("SLOW-DOWN", TimeWindow::new(0, 5_000).unwrap(), 100)
        .await
        .unwrap();

    // Backoff alone would retry after 10ms
    assert!(start.elapsed() >= std::time::Duration::from_secs(1));
    assert_eq!(trades.len(), TAPE_LEN as usize);
    assert_eq!(state.count("SLOW-DOWN"), 2);
}

#[rstest]
#[tokio::test]
async fn test_rate_limit_error_code_is_retried() {
    let (state, client) = setup().await;

    let trades = client
        .fetch_trades_by_time("CODE-10028", TimeWindow::new(0, 5_000).unwrap(), 100)
        .await
        .unwrap();

    assert_eq!(trades.len(), TAPE_LEN as usize);
    assert_eq!(state.count("CODE-10028"), 2);
}

#[rstest]
#[tokio::test]
async fn test_server_error_exhausts_bounded_retries() {
    let (state, client) = setup().await;

    let result = client
        .request_trades_by_time("SERVER-ERROR", TimeWindow::new(0, 5_000).unwrap(), 100)
        .await;

    assert!(matches!(
        result,
        Err(DeribitHttpError::UnexpectedStatus { status: 502, .. })
    ));
    assert_eq!(state.count("SERVER-ERROR"), 3);
}

#[rstest]
#[tokio::test]
async fn test_missing_result_is_not_retried() {
    let (state, client) = setup().await;

    let result = client
        .fetch_trades_by_time("BROKEN", TimeWindow::new(0, 5_000).unwrap(), 100)
        .await;

    assert!(matches!(result, Err(FetchError::Malformed(_))));
    assert_eq!(state.count("BROKEN"), 1);
}

#[rstest]
#[tokio::test]
async fn test_venue_error_is_not_retried() {
    let (state, client) = setup().await;

    let result = client
        .fetch_trades_by_time("UNKNOWN", TimeWindow::new(0, 5_000).unwrap(), 100)
        .await;

    assert_eq!(
        result.unwrap_err(),
        FetchError::Venue {
            code: 13_020,
            message: "not_found".to_string(),
        }
    );
    assert_eq!(state.count("UNKNOWN"), 1);
}

#[rstest]
#[tokio::test]
async fn test_trades_by_seq_and_latest_seq() {
    let (_state, client) = setup().await;

    let trades = client
        .fetch_trades_by_seq("BTC-PERPETUAL", SeqWindow::new(20, 40).unwrap(), 3)
        .await
        .unwrap();
    let latest = client.fetch_latest_seq("BTC-PERPETUAL", 1_012).await.unwrap();

    let seqs: Vec<i64> = trades.iter().map(|t| t.trade_seq).collect();
    assert_eq!(seqs, vec![20, 21, 22]);
    assert_eq!(latest, Some(12));
}

#[rstest]
#[tokio::test]
async fn test_backfill_against_mock_server() {
    let (state, client) = setup().await;
    let sink = Arc::new(MemorySink::new());
    let config = BackfillConfig {
        page_size: 10,
        max_in_flight: 4,
        max_instruments: 2,
        max_windows_per_instrument: 2,
        ..Default::default()
    };
    let orchestrator = BackfillOrchestrator::new(client, sink.clone(), config).unwrap();
    let instrument = Instrument::new("BTC-PERPETUAL", InstrumentKind::Future, 0, 10_000);

    let reports = orchestrator
        .run_to_end(vec![instrument], SnapshotMode::Historical)
        .await;

    assert_eq!(reports[0].state, InstrumentState::Persisted);
    assert_eq!(reports[0].requests, 3);
    assert_eq!(state.count("BTC-PERPETUAL"), 3);
    let seqs: Vec<i64> = sink.results()[0].trades.iter().map(|t| t.trade_seq).collect();
    assert_eq!(seqs, (1..=TAPE_LEN).collect::<Vec<_>>());
}
