//! Integration tests for RiskBank
//!
//! These drive the application context end to end: feed or API calls in,
//! risk alerts, settlements, reconciliation items and audit records out.

use std::time::Duration;

use riskbank_core::{
    AlertSeverity, AlertType, Asset, ClientExposure, InstructionStatus, ProfileUpdate,
    ReconciliationStatus, SettlementStatus, SettlementType, TradeSide,
};
use riskbank_events::{AuditAction, JournalReader};
use riskbank_rpc::commands::simulate;
use riskbank_rpc::{parse_feed, ApiError, AppConfig, AppContext, MockHandles};
use riskbank_settlement::{ReconciliationUpdate, TradeData};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

fn context(temp_dir: &TempDir) -> (AppContext, MockHandles) {
    let config = AppConfig {
        journal_dir: temp_dir.path().join("journal"),
        ..AppConfig::default()
    };
    AppContext::with_mocks(config).unwrap()
}

fn trade(id: &str, symbol: &str, side: TradeSide, quantity: Decimal, price: Decimal) -> TradeData {
    TradeData {
        trade_id: id.to_string(),
        client_id: "C1".to_string(),
        counterparty_id: "CP-1".to_string(),
        symbol: symbol.to_string(),
        side,
        quantity,
        price,
        settlement_type: SettlementType::T1,
    }
}

/// Test: limit + collateral override, one exposure, profile and score follow
#[tokio::test]
async fn test_exposure_updates_profile_and_score() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, _) = context(&temp_dir);

    assert!(ctx.get_credit_profile("C1").await.unwrap().is_none());

    ctx.update_credit_profile(
        "C1",
        &ProfileUpdate::default()
            .credit_limit(dec!(10000000))
            .collateral_value(dec!(15000000)),
        "risk-officer",
    )
    .await
    .unwrap();
    let outcome = ctx
        .add_exposure(ClientExposure::new("C1", "BTC/USDT", dec!(2500000), dec!(1000000)))
        .await
        .unwrap();

    let profile = ctx.get_credit_profile("C1").await.unwrap().unwrap();
    assert_eq!(profile.used_credit, dec!(2500000));
    assert_eq!(profile.available_credit, dec!(7500000));
    assert_eq!(profile.available_credit + profile.used_credit, profile.credit_limit);
    assert_eq!(profile.risk_score, outcome.snapshot.risk_score);

    let snapshot = ctx.calculate_real_time_risk("C1").await.unwrap();
    assert!(snapshot.breakdown.credit_utilization <= dec!(3.75));
    assert!(snapshot.risk_score >= Decimal::ZERO && snapshot.risk_score <= dec!(100));
    assert_eq!(ctx.get_exposures("C1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_client_risk_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, _) = context(&temp_dir);

    let err = ctx.calculate_real_time_risk("ghost").await.unwrap_err();
    assert!(matches!(err, ApiError::UnknownClient(_)));
    assert_eq!(err.kind(), "unknown_client");
}

/// Test: leverage 12x against a 10x limit raises one credit breach
#[tokio::test]
async fn test_leverage_breach_then_acknowledge() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, _) = context(&temp_dir);

    ctx.update_credit_profile(
        "C1",
        &ProfileUpdate::default()
            .credit_limit(dec!(10000000))
            .collateral_value(dec!(100000)),
        "risk-officer",
    )
    .await
    .unwrap();
    let outcome = ctx
        .add_exposure(ClientExposure::new("C1", "BTC/USDT", dec!(1200000), dec!(0)))
        .await
        .unwrap();

    assert_eq!(outcome.alerts.len(), 1);
    let alert = &outcome.alerts[0];
    assert_eq!(alert.alert_type, AlertType::CreditBreach);
    assert_eq!(alert.severity, AlertSeverity::High);
    assert_eq!(alert.threshold, dec!(10));
    assert_eq!(alert.current_value, dec!(12));

    let open = ctx.get_risk_alerts(Some("C1"), true).await.unwrap();
    assert_eq!(open.len(), 1);

    // Acknowledging twice is not an error and changes nothing the second time
    assert!(ctx.acknowledge_alert(&alert.id, "desk-1").await.unwrap());
    assert!(ctx.acknowledge_alert(&alert.id, "desk-2").await.unwrap());
    assert!(!ctx.acknowledge_alert("alert-missing", "desk-1").await.unwrap());

    assert!(ctx.get_risk_alerts(Some("C1"), true).await.unwrap().is_empty());
    let all = ctx.get_risk_alerts(Some("C1"), false).await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].acknowledged);

    let records = JournalReader::from_directory(ctx.journal().base_path())
        .unwrap()
        .read_all()
        .unwrap();
    let acks: Vec<_> = records
        .iter()
        .filter(|r| matches!(r.action, AuditAction::AlertAcknowledged { .. }))
        .collect();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].actor, "desk-1");
    assert!(records
        .iter()
        .any(|r| matches!(r.action, AuditAction::ProfileOverride { .. })));
}

/// Test: buy BTC/USDT settles only after both legs confirm
#[tokio::test(start_paused = true)]
async fn test_buy_settlement_lifecycle() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, mocks) = context(&temp_dir);

    let created = ctx
        .create_settlement(trade("T-100", "BTC/USDT", TradeSide::Buy, dec!(1), dec!(43250)))
        .await
        .unwrap();
    assert_eq!(created.status, SettlementStatus::Pending);
    assert_eq!(created.instructions.len(), 2);
    assert_eq!(created.instructions[0].asset, Asset::Usdt);
    assert_eq!(created.instructions[0].amount.value(), dec!(43250));
    assert_eq!(created.instructions[1].asset, Asset::Btc);
    assert_eq!(created.instructions[1].amount.value(), dec!(1));

    assert!(ctx.process_settlement(&created.id).await.unwrap());
    assert_eq!(mocks.mover.sent().len(), 2);

    tokio::time::sleep(Duration::from_secs(150)).await;
    let partial = ctx.get_settlement(&created.id).await.unwrap().unwrap();
    assert_eq!(partial.status, SettlementStatus::Processing);
    assert!(!partial.all_instructions_confirmed());

    ctx.settlement.drain().await;
    let settled = ctx.get_settlement(&created.id).await.unwrap().unwrap();
    assert_eq!(settled.status, SettlementStatus::Settled);
    assert!(settled
        .instructions
        .iter()
        .all(|i| i.status == InstructionStatus::Confirmed));
    assert_eq!(settled.confirmations.len(), 2);

    // Movements matched the instructions exactly
    assert!(ctx.get_reconciliation_items(None).await.unwrap().is_empty());
    assert_eq!(ctx.get_settlements_for_client("C1").await.unwrap().len(), 1);
}

/// Test: 100.0015 moved for a 100.0000 instruction is flagged once
#[tokio::test(start_paused = true)]
async fn test_reconciliation_discrepancy_and_resolution() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, mocks) = context(&temp_dir);

    mocks.movements.set_actual("T-200-pay-USDT", dec!(100.0015));
    let created = ctx
        .create_settlement(trade("T-200", "BTC/USDT", TradeSide::Buy, dec!(1), dec!(100.0000)))
        .await
        .unwrap();
    ctx.process_settlement(&created.id).await.unwrap();
    ctx.settlement.drain().await;

    let items = ctx
        .get_reconciliation_items(Some(ReconciliationStatus::Unmatched))
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.difference, dec!(0.0015));
    assert_eq!(item.settlement_id.as_deref(), Some(created.id.as_str()));

    // A later sweep does not flag the same instruction again
    ctx.reconciliation.run_sweep().await.unwrap();
    assert_eq!(ctx.get_reconciliation_items(None).await.unwrap().len(), 1);

    let investigating = ReconciliationUpdate::status(ReconciliationStatus::Investigating)
        .notes("bank fee rounding");
    assert!(ctx
        .update_reconciliation_item(&item.id, &investigating, "recon-team")
        .await
        .unwrap());
    let resolved = ReconciliationUpdate::status(ReconciliationStatus::Resolved);
    assert!(ctx
        .update_reconciliation_item(&item.id, &resolved, "recon-team")
        .await
        .unwrap());

    let reopen = ReconciliationUpdate::status(ReconciliationStatus::Unmatched);
    let err = ctx
        .update_reconciliation_item(&item.id, &reopen, "recon-team")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_transition");

    let summary = ctx.get_reconciliation_summary().await.unwrap();
    assert_eq!(summary.resolved.count, 1);
    assert_eq!(summary.open(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_pending_settlement_only() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, _) = context(&temp_dir);

    let pending = ctx
        .create_settlement(trade("T-300", "ETH/USDT", TradeSide::Sell, dec!(2), dec!(2500)))
        .await
        .unwrap();
    let cancelled = ctx.cancel_settlement(&pending.id, "ops").await.unwrap();
    assert_eq!(cancelled.status, SettlementStatus::Cancelled);

    let err = ctx.process_settlement(&pending.id).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_transition");

    let bad = ctx
        .create_settlement(trade("T-301", "ETHUSDT", TradeSide::Buy, dec!(1), dec!(1)))
        .await
        .unwrap_err();
    assert_eq!(bad.kind(), "validation");
}

/// Test: a feed replay produces the same end state as direct API calls
#[tokio::test(start_paused = true)]
async fn test_simulate_feed() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, mocks) = context(&temp_dir);
    mocks.movements.set_actual("T-401-receive-ETH", dec!(0.9));

    let feed = r#"
# two clients, one over-concentrated
{"type":"profile","client_id":"C1","update":{"credit_limit":"1000000","collateral_value":"500000"},"by":"ops"}
{"type":"profile","client_id":"C2","update":{"credit_limit":"100000","collateral_value":"100000"}}
{"type":"exposure","client_id":"C2","symbol":"SOL/USDT","notional":"60000","margin_used":"5000"}
{"type":"exposure","client_id":"C1","symbol":"BTC/USDT","notional":"100000","margin_used":"10000"}
{"type":"exposure","client_id":"","symbol":"BTC/USDT","notional":"1","margin_used":"0"}
{"type":"trade","trade_id":"T-400","client_id":"C1","counterparty_id":"CP","symbol":"BTC/USDT","side":"buy","quantity":"1","price":"43250","settlement_type":"T+0"}
{"type":"trade","trade_id":"T-401","client_id":"C1","counterparty_id":"CP","symbol":"ETH/USDT","side":"buy","quantity":"1","price":"2500"}
"#;
    let records = parse_feed(feed).unwrap();
    let report = simulate(&ctx, records, true).await.unwrap();

    assert_eq!(report.records_applied, 6);
    assert_eq!(report.records_rejected, 1);
    assert_eq!(report.portfolio.total_clients, 2);
    assert_eq!(report.settlements.len(), 2);
    assert_eq!(report.settlements_in(SettlementStatus::Settled), 2);
    for settlement in &report.settlements {
        assert!(settlement.all_instructions_confirmed());
    }

    // 60k of a 100k limit in one symbol
    assert!(report
        .alerts
        .iter()
        .any(|a| a.client_id == "C2" && a.alert_type == AlertType::Concentration));

    assert_eq!(report.reconciliation.unmatched.count, 1);
    assert_eq!(report.reconciliation.unmatched.total_difference, dec!(0.1));
}
