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

//! Builder types for Deribit history API query parameters.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::common::{
    consts::DERIBIT_MAX_COUNT,
    enums::{DeribitCurrency, DeribitInstrumentKind},
};

/// Query parameters for `GET /public/get_instruments`.
///
/// # References
/// - <https://docs.deribit.com/#public-get_instruments>
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Builder)]
#[builder(setter(into), derive(Debug))]
pub struct GetInstrumentsParams {
    pub currency: DeribitCurrency,
    pub kind: DeribitInstrumentKind,
    #[builder(default)]
    pub expired: bool,
}

/// Query parameters for `GET /public/get_last_trades_by_instrument_and_time`.
///
/// Both timestamps are inclusive.
///
/// # References
/// - <https://docs.deribit.com/#public-get_last_trades_by_instrument_and_time>
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Builder)]
#[builder(setter(into), derive(Debug), build_fn(validate = "Self::validate"))]
pub struct GetTradesByTimeParams {
    pub instrument_name: String,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    #[builder(default = "DERIBIT_MAX_COUNT")]
    pub count: usize,
    #[builder(default)]
    pub include_old: bool,
}

impl GetTradesByTimeParamsBuilder {
    fn validate(&self) -> Result<(), String> {
        if let (Some(start), Some(end)) = (self.start_timestamp, self.end_timestamp)
            && start > end
        {
            return Err(format!(
                "start_timestamp ({start}) must not be after end_timestamp ({end})"
            ));
        }
        validate_count(self.count)
    }
}

/// Query parameters for `GET /public/get_last_trades_by_instrument`.
///
/// Both sequence numbers are inclusive.
///
/// # References
/// - <https://docs.deribit.com/#public-get_last_trades_by_instrument>
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Builder)]
#[builder(setter(into), derive(Debug), build_fn(validate = "Self::validate"))]
pub struct GetTradesBySeqParams {
    pub instrument_name: String,
    pub start_seq: i64,
    pub end_seq: i64,
    #[builder(default = "DERIBIT_MAX_COUNT")]
    pub count: usize,
    #[builder(default)]
    pub include_old: bool,
}

impl GetTradesBySeqParamsBuilder {
    fn validate(&self) -> Result<(), String> {
        if let (Some(start), Some(end)) = (self.start_seq, self.end_seq)
            && start > end
        {
            return Err(format!(
                "start_seq ({start}) must not be after end_seq ({end})"
            ));
        }
        validate_count(self.count)
    }
}

fn validate_count(count: Option<usize>) -> Result<(), String> {
    match count {
        Some(count) if count == 0 || count > DERIBIT_MAX_COUNT => Err(format!(
            "count must be between 1 and {DERIBIT_MAX_COUNT}, was {count}"
        )),
        _ => Ok(()),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_instruments_query_string() {
        let params = GetInstrumentsParamsBuilder::default()
            .currency(DeribitCurrency::Btc)
            .kind(DeribitInstrumentKind::Option)
            .expired(true)
            .build()
            .unwrap();

        assert_eq!(
            serde_urlencoded::to_string(&params).unwrap(),
            "currency=BTC&kind=option&expired=true"
        );
    }

    #[rstest]
    fn test_trades_by_time_query_string() {
        let params = GetTradesByTimeParamsBuilder::default()
            .instrument_name("BTC-PERPETUAL")
            .start_timestamp(1_000)
            .end_timestamp(3_600_999)
            .build()
            .unwrap();

        assert_eq!(
            serde_urlencoded::to_string(&params).unwrap(),
            "instrument_name=BTC-PERPETUAL&start_timestamp=1000&end_timestamp=3600999&count=10000&include_old=false"
        );
    }

    #[rstest]
    fn test_trades_by_time_rejects_inverted_range() {
        let result = GetTradesByTimeParamsBuilder::default()
            .instrument_name("BTC-PERPETUAL")
            .start_timestamp(2_000)
            .end_timestamp(1_000)
            .build();

        assert!(result.unwrap_err().to_string().contains("must not be after"));
    }

    #[rstest]
    #[case(0)]
    #[case(10_001)]
    fn test_trades_by_seq_rejects_count(#[case] count: usize) {
        let result = GetTradesBySeqParamsBuilder::default()
            .instrument_name("BTC-PERPETUAL")
            .start_seq(1)
            .end_seq(10)
            .count(count)
            .build();

        assert!(result.is_err());
    }
}
