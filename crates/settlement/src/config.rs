//! Settlement and reconciliation settings

use std::collections::BTreeMap;
use std::time::Duration;

use riskbank_core::Asset;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// House bank account used as the destination of fiat instructions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    pub bank_name: String,
    pub account_number: String,
    pub swift_code: String,
}

impl Default for BankDetails {
    fn default() -> Self {
        Self {
            bank_name: "RiskBank Clearing".to_string(),
            account_number: "000123456789".to_string(),
            swift_code: "RSKBUS33XXX".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Asset codes routed as fiat (bank transfer). Add "USDT" here to
    /// settle tether over bank rails.
    #[serde(default = "default_fiat_assets")]
    pub fiat_assets: Vec<String>,

    #[serde(default = "default_crypto_poll_interval_secs")]
    pub crypto_poll_interval_secs: u64,

    /// Crypto instructions not confirmed within this window fail
    #[serde(default = "default_crypto_confirmation_window_secs")]
    pub crypto_confirmation_window_secs: u64,

    /// Delay before checking a bank transfer (one business day)
    #[serde(default = "default_fiat_check_delay_secs")]
    pub fiat_check_delay_secs: u64,

    #[serde(default = "default_fiat_confirmation_window_secs")]
    pub fiat_confirmation_window_secs: u64,

    /// Asset code -> deposit wallet
    #[serde(default = "default_wallets")]
    pub wallets: BTreeMap<String, String>,

    #[serde(default = "default_wallet")]
    pub default_wallet: String,

    #[serde(default)]
    pub bank: BankDetails,
}

fn default_fiat_assets() -> Vec<String> {
    ["USD", "EUR", "GBP", "JPY", "VND"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_crypto_poll_interval_secs() -> u64 {
    60
}

fn default_crypto_confirmation_window_secs() -> u64 {
    6 * 3600
}

fn default_fiat_check_delay_secs() -> u64 {
    24 * 3600
}

fn default_fiat_confirmation_window_secs() -> u64 {
    72 * 3600
}

fn default_wallets() -> BTreeMap<String, String> {
    [
        ("BTC", "bc1qriskbanksettlement0000000000000000"),
        ("ETH", "0x5e77100000000000000000000000000000000001"),
        ("USDT", "0x5e77100000000000000000000000000000000002"),
        ("USDC", "0x5e77100000000000000000000000000000000003"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_wallet() -> String {
    "riskbank-omnibus".to_string()
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            fiat_assets: default_fiat_assets(),
            crypto_poll_interval_secs: default_crypto_poll_interval_secs(),
            crypto_confirmation_window_secs: default_crypto_confirmation_window_secs(),
            fiat_check_delay_secs: default_fiat_check_delay_secs(),
            fiat_confirmation_window_secs: default_fiat_confirmation_window_secs(),
            wallets: default_wallets(),
            default_wallet: default_wallet(),
            bank: BankDetails::default(),
        }
    }
}

impl SettlementConfig {
    /// Second-scale timings for simulations and demos
    pub fn accelerated() -> Self {
        Self {
            crypto_poll_interval_secs: 1,
            crypto_confirmation_window_secs: 60,
            fiat_check_delay_secs: 2,
            fiat_confirmation_window_secs: 60,
            ..Self::default()
        }
    }

    pub fn is_fiat(&self, asset: &Asset) -> bool {
        self.fiat_assets
            .iter()
            .any(|code| code.eq_ignore_ascii_case(asset.code()))
    }

    pub fn wallet_for(&self, asset: &Asset) -> String {
        self.wallets
            .get(asset.code())
            .cloned()
            .unwrap_or_else(|| self.default_wallet.clone())
    }

    pub fn crypto_poll_interval(&self) -> Duration {
        Duration::from_secs(self.crypto_poll_interval_secs.max(1))
    }

    pub fn crypto_confirmation_window(&self) -> Duration {
        Duration::from_secs(self.crypto_confirmation_window_secs)
    }

    pub fn fiat_check_delay(&self) -> Duration {
        Duration::from_secs(self.fiat_check_delay_secs.max(1))
    }

    pub fn fiat_confirmation_window(&self) -> Duration {
        Duration::from_secs(self.fiat_confirmation_window_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Largest |expected - actual| still treated as a match
    #[serde(default = "default_tolerance")]
    pub tolerance: Decimal,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// How far back the scheduled sweep looks
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
}

fn default_tolerance() -> Decimal {
    Decimal::new(1, 3)
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

fn default_lookback_hours() -> i64 {
    24
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            sweep_interval_secs: default_sweep_interval_secs(),
            lookback_hours: default_lookback_hours(),
        }
    }
}

impl ReconciliationConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
