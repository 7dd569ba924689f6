//! Market identifiers for settled trades

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::asset::{Asset, AssetError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error("Symbol must be BASE/QUOTE, got: {0:?}")]
    InvalidSymbol(String),

    #[error("Base and quote asset are identical: {0}")]
    SameAsset(String),

    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// A trading pair (e.g., BTC/USDT)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradingPair {
    pub base: Asset,
    pub quote: Asset,
}

impl TradingPair {
    pub fn new(base: Asset, quote: Asset) -> Self {
        Self { base, quote }
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for TradingPair {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('/')
            .ok_or_else(|| MarketError::InvalidSymbol(s.to_string()))?;
        let base: Asset = base.parse()?;
        let quote: Asset = quote.parse()?;
        if base == quote {
            return Err(MarketError::SameAsset(base.to_string()));
        }
        Ok(Self { base, quote })
    }
}

/// Side of the trade from the client's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}
