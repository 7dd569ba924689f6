//! Asset - Type-safe asset codes for settlement legs
//!
//! Known assets are enumerated so routing rules (fiat vs crypto) and
//! blockchain confirmation depth can be matched exhaustively. Unknown
//! tokens fall back to `Other`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Confirmation depth used for chains without a specific rule
pub const DEFAULT_REQUIRED_CONFIRMATIONS: u32 = 6;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("Empty asset code")]
    EmptyCode,

    #[error("Asset code too long (max 10 chars): {0}")]
    TooLong(String),

    #[error("Invalid asset code format: {0}")]
    InvalidFormat(String),
}

/// Asset codes
///
/// # Examples
/// ```
/// use riskbank_core::Asset;
///
/// let btc: Asset = "btc".parse().unwrap();
/// assert_eq!(btc, Asset::Btc);
/// assert_eq!(btc.required_confirmations(), 6);
/// assert_eq!(Asset::Usdt.required_confirmations(), 12);
/// assert!(Asset::Eur.is_fiat());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Asset {
    // === Stablecoins ===
    Usdt,
    Usdc,
    Dai,

    // === Major Crypto ===
    Btc,
    Eth,
    Sol,
    Xrp,
    Ltc,

    // === Fiat ===
    Usd,
    Eur,
    Gbp,
    Jpy,
    Vnd,

    /// Any other token/currency
    Other(String),
}

impl Asset {
    pub fn code(&self) -> &str {
        match self {
            Asset::Usdt => "USDT",
            Asset::Usdc => "USDC",
            Asset::Dai => "DAI",
            Asset::Btc => "BTC",
            Asset::Eth => "ETH",
            Asset::Sol => "SOL",
            Asset::Xrp => "XRP",
            Asset::Ltc => "LTC",
            Asset::Usd => "USD",
            Asset::Eur => "EUR",
            Asset::Gbp => "GBP",
            Asset::Jpy => "JPY",
            Asset::Vnd => "VND",
            Asset::Other(s) => s.as_str(),
        }
    }

    /// ISO fiat currencies. Stablecoins are NOT fiat unless the settlement
    /// configuration explicitly routes them through the bank rail.
    pub fn is_fiat(&self) -> bool {
        matches!(
            self,
            Asset::Usd | Asset::Eur | Asset::Gbp | Asset::Jpy | Asset::Vnd
        )
    }

    /// Block confirmations needed before an on-chain transfer counts as final.
    ///
    /// BTC: 6, ETH and ERC-20 stablecoins: 12, everything else: 6.
    pub fn required_confirmations(&self) -> u32 {
        match self {
            Asset::Btc => 6,
            Asset::Eth | Asset::Usdt | Asset::Usdc => 12,
            _ => DEFAULT_REQUIRED_CONFIRMATIONS,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Asset {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_uppercase();

        if s.is_empty() {
            return Err(AssetError::EmptyCode);
        }

        if s.len() > 10 {
            return Err(AssetError::TooLong(s));
        }

        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AssetError::InvalidFormat(s));
        }

        Ok(match s.as_str() {
            "USDT" => Asset::Usdt,
            "USDC" => Asset::Usdc,
            "DAI" => Asset::Dai,
            "BTC" => Asset::Btc,
            "ETH" => Asset::Eth,
            "SOL" => Asset::Sol,
            "XRP" => Asset::Xrp,
            "LTC" => Asset::Ltc,
            "USD" => Asset::Usd,
            "EUR" => Asset::Eur,
            "GBP" => Asset::Gbp,
            "JPY" => Asset::Jpy,
            "VND" => Asset::Vnd,
            _ => Asset::Other(s),
        })
    }
}

impl TryFrom<String> for Asset {
    type Error = AssetError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Asset> for String {
    fn from(a: Asset) -> Self {
        a.code().to_string()
    }
}
