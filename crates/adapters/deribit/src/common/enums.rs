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

//! Enumerations mirroring the Deribit API.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use tapefill_backfill::model::{InstrumentKind, TradeDirection};

/// Currencies served by the history API.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Display,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive, serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum DeribitCurrency {
    /// Bitcoin.
    Btc,
    /// Ether.
    Eth,
    /// USD Coin, for linear instruments.
    Usdc,
    /// Tether, for linear instruments.
    Usdt,
}

/// Instrument kinds as reported by Deribit.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Display,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeribitInstrumentKind {
    /// Future or perpetual.
    Future,
    /// Option.
    Option,
    /// Spot pair.
    Spot,
    /// Future combination.
    FutureCombo,
    /// Option combination.
    OptionCombo,
}

impl From<InstrumentKind> for DeribitInstrumentKind {
    fn from(value: InstrumentKind) -> Self {
        match value {
            InstrumentKind::Option => Self::Option,
            InstrumentKind::Future => Self::Future,
        }
    }
}

impl TryFrom<DeribitInstrumentKind> for InstrumentKind {
    type Error = anyhow::Error;

    fn try_from(value: DeribitInstrumentKind) -> Result<Self, Self::Error> {
        match value {
            DeribitInstrumentKind::Option => Ok(Self::Option),
            DeribitInstrumentKind::Future => Ok(Self::Future),
            other => anyhow::bail!("unsupported instrument kind '{other}'"),
        }
    }
}

/// Aggressor side of a Deribit trade.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeribitDirection {
    /// Buy.
    Buy,
    /// Sell.
    Sell,
}

impl From<DeribitDirection> for TradeDirection {
    fn from(value: DeribitDirection) -> Self {
        match value {
            DeribitDirection::Buy => Self::Buy,
            DeribitDirection::Sell => Self::Sell,
        }
    }
}
