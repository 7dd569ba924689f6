//! Line-delimited JSON input feed
//!
//! One record per line, tagged by `type`:
//!
//! ```text
//! {"type":"profile","client_id":"C1","update":{"credit_limit":"1000000"},"by":"ops"}
//! {"type":"exposure","client_id":"C1","symbol":"BTC/USDT","notional":"400000","margin_used":"40000"}
//! {"type":"trade","trade_id":"T1","client_id":"C1","counterparty_id":"CP","symbol":"BTC/USDT","side":"buy","quantity":"1","price":"43250"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::path::Path;

use riskbank_core::{ClientExposure, ProfileUpdate, Settlement};
use riskbank_risk::RiskOutcome;
use riskbank_settlement::TradeData;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::error::ApiError;

fn default_actor() -> String {
    "feed".to_string()
}

fn one() -> Decimal {
    Decimal::ONE
}

/// Exposure as it arrives on the feed; market value defaults to notional
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureInput {
    pub client_id: String,
    pub symbol: String,
    pub notional: Decimal,
    pub margin_used: Decimal,
    #[serde(default)]
    pub market_value: Option<Decimal>,
    #[serde(default)]
    pub unrealized_pnl: Decimal,
    #[serde(default = "one")]
    pub risk_weight: Decimal,
}

impl From<ExposureInput> for ClientExposure {
    fn from(input: ExposureInput) -> Self {
        let market_value = input.market_value.unwrap_or(input.notional);
        ClientExposure::new(input.client_id, input.symbol, input.notional, input.margin_used)
            .with_market_value(market_value)
            .with_unrealized_pnl(input.unrealized_pnl)
            .with_risk_weight(input.risk_weight)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedRecord {
    Trade(TradeData),
    Exposure(ExposureInput),
    Profile {
        client_id: String,
        update: ProfileUpdate,
        #[serde(default = "default_actor")]
        by: String,
    },
}

/// What applying one record produced
#[derive(Debug, Clone)]
pub enum FeedOutcome {
    Settlement(Settlement),
    Risk(RiskOutcome),
}

impl FeedOutcome {
    pub fn alerts_raised(&self) -> usize {
        match self {
            FeedOutcome::Risk(outcome) => outcome.alerts.len(),
            FeedOutcome::Settlement(_) => 0,
        }
    }
}

/// Parse feed text. Line numbers in errors are 1-based.
pub fn parse_feed(text: &str) -> Result<Vec<FeedRecord>, ApiError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| ApiError::Feed {
                line: idx + 1,
                reason: e.to_string(),
            })
        })
        .collect()
}

pub fn read_feed(path: impl AsRef<Path>) -> Result<Vec<FeedRecord>, ApiError> {
    let text = std::fs::read_to_string(path)?;
    parse_feed(&text)
}

/// Route a record to the engine that owns it
pub async fn apply_record(ctx: &AppContext, record: FeedRecord) -> Result<FeedOutcome, ApiError> {
    match record {
        FeedRecord::Trade(trade) => ctx.on_trade_completed(trade).await.map(FeedOutcome::Settlement),
        FeedRecord::Exposure(input) => ctx.add_exposure(input.into()).await.map(FeedOutcome::Risk),
        FeedRecord::Profile {
            client_id,
            update,
            by,
        } => ctx
            .update_credit_profile(&client_id, &update, &by)
            .await
            .map(FeedOutcome::Risk),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskbank_core::{SettlementType, TradeSide};
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_all_record_kinds() {
        let text = r#"
# seed data
{"type":"profile","client_id":"C1","update":{"credit_limit":"1000000"}}
{"type":"exposure","client_id":"C1","symbol":"BTC/USDT","notional":"400000","margin_used":"40000"}

{"type":"trade","trade_id":"T1","client_id":"C1","counterparty_id":"CP","symbol":"BTC/USDT","side":"buy","quantity":"1","price":"43250","settlement_type":"T+0"}
"#;
        let records = parse_feed(text).unwrap();
        assert_eq!(records.len(), 3);

        match &records[0] {
            FeedRecord::Profile { update, by, .. } => {
                assert_eq!(update.credit_limit, Some(dec!(1000000)));
                assert_eq!(by, "feed");
            }
            other => panic!("unexpected {:?}", other),
        }
        match &records[1] {
            FeedRecord::Exposure(input) => {
                assert_eq!(input.risk_weight, Decimal::ONE);
                let exposure: ClientExposure = input.clone().into();
                assert_eq!(exposure.market_value, dec!(400000));
            }
            other => panic!("unexpected {:?}", other),
        }
        match &records[2] {
            FeedRecord::Trade(trade) => {
                assert_eq!(trade.side, TradeSide::Buy);
                assert_eq!(trade.settlement_type, SettlementType::T0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let text = "{\"type\":\"profile\",\"client_id\":\"C1\",\"update\":{}}\n\nnot json\n";
        match parse_feed(text) {
            Err(ApiError::Feed { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected feed error, got {:?}", other),
        }
    }
}
