//! CLI commands

use riskbank_core::{RiskAlert, Settlement, SettlementStatus};
use riskbank_events::{AuditAction, JournalReader};
use riskbank_risk::PortfolioRisk;
use riskbank_settlement::ReconciliationSummary;
use serde::Serialize;

use crate::context::AppContext;
use crate::error::ApiError;
use crate::feed::{apply_record, FeedRecord};

/// End state after replaying a feed
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub records_applied: usize,
    pub records_rejected: usize,
    pub portfolio: PortfolioRisk,
    pub alerts: Vec<RiskAlert>,
    pub settlements: Vec<Settlement>,
    pub reconciliation: ReconciliationSummary,
}

impl SimulationReport {
    pub fn settlements_in(&self, status: SettlementStatus) -> usize {
        self.settlements.iter().filter(|s| s.status == status).count()
    }
}

/// Replay `records`, optionally push pending settlements into
/// processing, then wait for every tracker and run one sweep.
///
/// Rejected records are logged and counted; they do not stop the run.
pub async fn simulate(
    ctx: &AppContext,
    records: Vec<FeedRecord>,
    process_all: bool,
) -> Result<SimulationReport, ApiError> {
    let mut applied = 0;
    let mut rejected = 0;
    let mut clients = Vec::new();

    for record in records {
        let client = match &record {
            FeedRecord::Trade(trade) => trade.client_id.clone(),
            FeedRecord::Exposure(input) => input.client_id.clone(),
            FeedRecord::Profile { client_id, .. } => client_id.clone(),
        };
        match apply_record(ctx, record).await {
            Ok(outcome) => {
                applied += 1;
                tracing::debug!(client = %client, alerts = outcome.alerts_raised(), "Feed record applied");
            }
            Err(e) => {
                rejected += 1;
                tracing::warn!(client = %client, kind = e.kind(), error = %e, "Feed record rejected");
            }
        }
        if !clients.contains(&client) {
            clients.push(client);
        }
    }

    let mut settlements = Vec::new();
    for client in &clients {
        settlements.extend(ctx.get_settlements_for_client(client).await?);
    }
    if process_all {
        for settlement in settlements.iter().filter(|s| s.status == SettlementStatus::Pending) {
            ctx.process_settlement(&settlement.id).await?;
        }
    }

    ctx.settlement.drain().await;
    let sweep = ctx.reconciliation.run_sweep().await?;
    tracing::info!(
        checked = sweep.checked,
        discrepancies = sweep.discrepancies.len(),
        "Simulation sweep finished"
    );

    let mut settlements = Vec::new();
    for client in &clients {
        settlements.extend(ctx.get_settlements_for_client(client).await?);
    }

    Ok(SimulationReport {
        records_applied: applied,
        records_rejected: rejected,
        portfolio: ctx.get_portfolio_risk().await?,
        alerts: ctx.get_risk_alerts(None, false).await?,
        settlements,
        reconciliation: ctx.get_reconciliation_summary().await?,
    })
}

pub fn print_report(report: &SimulationReport) -> Result<(), anyhow::Error> {
    println!(
        "✅ Applied {} record(s), rejected {}",
        report.records_applied, report.records_rejected
    );
    println!(
        "📊 Clients: {}  used credit: {} / {}  avg score: {}  high risk: {}",
        report.portfolio.total_clients,
        report.portfolio.total_used_credit,
        report.portfolio.total_credit_limit,
        report.portfolio.average_risk_score.round_dp(2),
        report.portfolio.risk_distribution.high
    );
    println!("🚨 Alerts: {}", report.alerts.len());
    for alert in &report.alerts {
        println!(
            "   [{}] {} {}: {}",
            alert.severity, alert.client_id, alert.alert_type, alert.message
        );
    }
    println!("📦 Settlements: {}", report.settlements.len());
    for settlement in &report.settlements {
        let confirmed = settlement
            .instructions
            .iter()
            .filter(|i| i.is_confirmed())
            .count();
        println!(
            "   {} {} {} {} ({}/{} confirmed)",
            settlement.trade_id,
            settlement.symbol,
            settlement.side,
            settlement.status,
            confirmed,
            settlement.instructions.len()
        );
    }
    println!(
        "🔎 Reconciliation: {} unmatched, {} investigating, {} resolved",
        report.reconciliation.unmatched.count,
        report.reconciliation.investigating.count,
        report.reconciliation.resolved.count
    );
    Ok(())
}

/// Print the audit journal, oldest first
pub fn audit(ctx: &AppContext) -> Result<(), anyhow::Error> {
    let reader = JournalReader::from_directory(ctx.journal().base_path())?;
    let records = reader.read_all()?;
    println!("📜 {} audit record(s) in {} file(s)", records.len(), reader.file_count());
    for record in records {
        let detail = match &record.action {
            AuditAction::AlertAcknowledged { alert_id, client_id } => {
                format!("acknowledged {} for {}", alert_id, client_id)
            }
            AuditAction::ProfileOverride { client_id, fields } => {
                format!("overrode {} on {}", fields.join(","), client_id)
            }
            AuditAction::ReconciliationUpdated {
                item_id,
                from_status,
                to_status,
            } => format!("moved {} {} -> {}", item_id, from_status, to_status),
            AuditAction::SettlementCancelled { settlement_id } => {
                format!("cancelled {}", settlement_id)
            }
        };
        println!("   {} {} {}", record.timestamp.to_rfc3339(), record.actor, detail);
    }
    Ok(())
}

/// One-line health summary for the serve loop
pub async fn status_line(ctx: &AppContext) -> Result<String, ApiError> {
    let portfolio = ctx.get_portfolio_risk().await?;
    let reconciliation = ctx.get_reconciliation_summary().await?;
    Ok(format!(
        "clients={} unresolved_alerts={} open_reconciliation={} trackers={}",
        portfolio.total_clients,
        portfolio.unresolved_alerts.total(),
        reconciliation.open(),
        ctx.settlement.active_trackers()
    ))
}
