//! Application configuration

use std::path::{Path, PathBuf};

use riskbank_risk::RiskConfig;
use riskbank_settlement::{ReconciliationConfig, SettlementConfig};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub risk: RiskConfig,

    #[serde(default)]
    pub settlement: SettlementConfig,

    #[serde(default)]
    pub reconciliation: ReconciliationConfig,

    /// Event bus buffer; slower subscribers lag past this
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    /// Directory of the JSONL audit journal
    #[serde(default = "default_journal_dir")]
    pub journal_dir: PathBuf,
}

fn default_bus_capacity() -> usize {
    1024
}

fn default_journal_dir() -> PathBuf {
    PathBuf::from("./data/journal")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            risk: RiskConfig::default(),
            settlement: SettlementConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            bus_capacity: default_bus_capacity(),
            journal_dir: default_journal_dir(),
        }
    }
}

impl AppConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ApiError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| ApiError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "risk": {{ "leverage_limit": "8" }}, "settlement": {{ "fiat_assets": ["USD", "USDT"] }} }}"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.risk.leverage_limit, dec!(8));
        assert_eq!(config.risk.concentration_limit, dec!(0.25));
        assert_eq!(config.settlement.fiat_assets.len(), 2);
        assert_eq!(config.reconciliation.tolerance, dec!(0.001));
        assert_eq!(config.bus_capacity, 1024);
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_file("/nonexistent/riskbank.json").unwrap_err();
        assert_eq!(err.kind(), "config");
    }
}
