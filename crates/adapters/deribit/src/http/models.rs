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

//! Data transfer objects for the Deribit history API.
//!
//! Responses use a JSON-RPC envelope: either `result` or `error` is present.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ustr::Ustr;

use crate::common::{
    enums::{DeribitDirection, DeribitInstrumentKind},
    parse::deserialize_string_or_number,
};

/// The JSON-RPC response envelope.
#[derive(Clone, Debug, Deserialize)]
pub struct DeribitResponse<T> {
    /// The payload of a successful call.
    pub result: Option<T>,
    /// The error of a failed call.
    pub error: Option<DeribitErrorMsg>,
    /// Server receive time in microseconds.
    #[serde(rename = "usIn")]
    pub us_in: Option<u64>,
    /// Server send time in microseconds.
    #[serde(rename = "usOut")]
    pub us_out: Option<u64>,
}

/// A JSON-RPC error object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeribitErrorMsg {
    /// The error code, e.g. `10028` for `too_many_requests`.
    pub code: i64,
    /// The error message.
    pub message: String,
    /// Additional error data.
    #[serde(default)]
    pub data: Option<Value>,
}

/// One instrument from `public/get_instruments`.
///
/// Fields the engine does not use are kept in `extra` so the instrument catalog can be
/// saved with every column Deribit reports.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeribitInstrument {
    /// The instrument name.
    pub instrument_name: Ustr,
    /// The instrument kind.
    pub kind: DeribitInstrumentKind,
    /// UNIX milliseconds of listing.
    pub creation_timestamp: i64,
    /// UNIX milliseconds of expiry; far in the future for perpetuals.
    pub expiration_timestamp: i64,
    /// Whether the instrument is still trading.
    #[serde(default)]
    pub is_active: bool,
    /// Every other field of the payload.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DeribitInstrument {
    /// Returns the instrument as a flat row of column name to text value.
    #[must_use]
    pub fn to_row(&self) -> BTreeMap<String, String> {
        let mut row: BTreeMap<String, String> = self
            .extra
            .iter()
            .map(|(key, value)| (key.clone(), value_to_text(value)))
            .collect();
        row.insert("instrument_name".to_string(), self.instrument_name.to_string());
        row.insert("kind".to_string(), self.kind.to_string());
        row.insert(
            "creation_timestamp".to_string(),
            self.creation_timestamp.to_string(),
        );
        row.insert(
            "expiration_timestamp".to_string(),
            self.expiration_timestamp.to_string(),
        );
        row.insert("is_active".to_string(), self.is_active.to_string());
        row
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The result of the trade history endpoints.
#[derive(Clone, Debug, Deserialize)]
pub struct DeribitTradesPage {
    /// The trades of this page.
    pub trades: Vec<DeribitTrade>,
    /// Reported by Deribit but unreliable; pagination never relies on it.
    #[serde(default)]
    pub has_more: bool,
}

/// One trade from the trade history endpoints.
#[derive(Clone, Debug, Deserialize)]
pub struct DeribitTrade {
    pub trade_seq: i64,
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub trade_id: Ustr,
    pub timestamp: i64,
    pub tick_direction: i8,
    pub price: Decimal,
    pub mark_price: Decimal,
    #[serde(default)]
    pub iv: Option<Decimal>,
    pub instrument_name: Ustr,
    pub index_price: Decimal,
    pub direction: DeribitDirection,
    #[serde(default)]
    pub contracts: Option<Decimal>,
    pub amount: Decimal,
    #[serde(default)]
    pub block_trade_leg_count: Option<u32>,
    #[serde(default)]
    pub block_trade_id: Option<Ustr>,
    #[serde(default)]
    pub block_rfq_id: Option<i64>,
    #[serde(default)]
    pub combo_id: Option<Ustr>,
    #[serde(default)]
    pub combo_trade_id: Option<i64>,
    #[serde(default)]
    pub liquidation: Option<Ustr>,
}
