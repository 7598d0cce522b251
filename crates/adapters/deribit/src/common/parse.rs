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

//! Conversion from Deribit payloads into engine types.

use serde::{Deserialize, Deserializer};
use tapefill_backfill::model::{Instrument, InstrumentKind, TradeRecord};
use ustr::Ustr;

use crate::http::models::{DeribitInstrument, DeribitTrade};

/// Deserializes a JSON string or integer into a [`Ustr`].
///
/// # Errors
///
/// Returns an error if the value is neither a string nor an integer.
pub fn deserialize_string_or_number<'de, D>(deserializer: D) -> Result<Ustr, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Int(i64),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => Ustr::from(&s),
        StringOrNumber::Int(n) => Ustr::from(&n.to_string()),
    })
}

/// Parses a Deribit trade into a [`TradeRecord`].
#[must_use]
pub fn parse_trade(trade: &DeribitTrade) -> TradeRecord {
    TradeRecord {
        trade_seq: trade.trade_seq,
        trade_id: trade.trade_id,
        timestamp: trade.timestamp,
        tick_direction: trade.tick_direction,
        price: trade.price,
        mark_price: trade.mark_price,
        iv: trade.iv,
        instrument_name: trade.instrument_name,
        index_price: trade.index_price,
        direction: trade.direction.into(),
        contracts: trade.contracts,
        amount: trade.amount,
        block_trade_leg_count: trade.block_trade_leg_count,
        block_trade_id: trade.block_trade_id,
        block_rfq_id: trade.block_rfq_id,
        combo_id: trade.combo_id,
        combo_trade_id: trade.combo_trade_id,
        liquidation: trade.liquidation,
    }
}

/// Parses a Deribit instrument into an [`Instrument`].
///
/// # Errors
///
/// Returns an error if the instrument is not an option or a future, or if it expires
/// before it was listed.
pub fn parse_instrument(instrument: &DeribitInstrument) -> anyhow::Result<Instrument> {
    let kind = InstrumentKind::try_from(instrument.kind)?;
    if instrument.expiration_timestamp < instrument.creation_timestamp {
        anyhow::bail!(
            "instrument {} expires ({}) before creation ({})",
            instrument.instrument_name,
            instrument.expiration_timestamp,
            instrument.creation_timestamp,
        );
    }

    Ok(Instrument::new(
        instrument.instrument_name.as_str(),
        kind,
        instrument.creation_timestamp,
        instrument.expiration_timestamp,
    ))
}
