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

use tapefill_backfill::{model::InstrumentKind, source::TradeSource};
use tapefill_core::datetime::unix_millis_now;
use tapefill_deribit::{
    common::{enums::DeribitCurrency, parse::parse_instrument},
    http::client::DeribitHttpClient,
};
use tapefill_network::retry::RetryConfig;
use tracing::level_filters::LevelFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    let client = DeribitHttpClient::from_env(None, None, RetryConfig::default())?;

    let instruments = client
        .request_instruments(DeribitCurrency::Btc, InstrumentKind::Future, false)
        .await?;
    for instrument in instruments.iter().take(5) {
        tracing::info!("{:?}", parse_instrument(instrument)?);
    }

    let now = unix_millis_now();
    match client.fetch_latest_seq("BTC-PERPETUAL", now).await {
        Ok(seq) => tracing::info!("BTC-PERPETUAL latest trade_seq: {seq:?}"),
        Err(e) => tracing::error!("{e}"),
    }

    Ok(())
}
