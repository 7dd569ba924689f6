//! Risk monitor
//!
//! Re-evaluates every known client on a fixed tick and raises one alert per
//! breached limit per evaluation. Repeated breaches produce repeated
//! alerts; each one is kept for audit.

use std::collections::BTreeMap;
use std::sync::Arc;

use riskbank_bus::{spawn_periodic, EngineEvent, EventBus, PeriodicHandle};
use riskbank_core::{AlertSeverity, AlertType, RiskAlert};
use riskbank_events::{AuditAction, AuditRecord, AuditSink};
use riskbank_store::{AlertFilter, AlertRepository, ExposureRepository, KeyedLocks};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::RiskError;
use crate::profile::CreditProfileStore;
use crate::scoring::{RiskScorer, RiskSnapshot};

pub type MonitorHandle = PeriodicHandle;

/// Unacknowledged alert counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl AlertCounts {
    fn add(&mut self, severity: AlertSeverity) {
        match severity {
            AlertSeverity::Low => self.low += 1,
            AlertSeverity::Medium => self.medium += 1,
            AlertSeverity::High => self.high += 1,
            AlertSeverity::Critical => self.critical += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.low + self.medium + self.high + self.critical
    }
}

/// Clients per score bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskDistribution {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioRisk {
    pub total_clients: usize,
    pub total_credit_limit: Decimal,
    pub total_used_credit: Decimal,
    pub total_available_credit: Decimal,
    pub average_risk_score: Decimal,
    pub unresolved_alerts: AlertCounts,
    pub risk_distribution: RiskDistribution,
}

pub struct RiskMonitor {
    scorer: RiskScorer,
    profiles: Arc<CreditProfileStore>,
    exposures: Arc<dyn ExposureRepository>,
    alerts: Arc<dyn AlertRepository>,
    audit: Arc<dyn AuditSink>,
    bus: EventBus,
    locks: Arc<KeyedLocks>,
}

impl RiskMonitor {
    pub fn new(
        scorer: RiskScorer,
        profiles: Arc<CreditProfileStore>,
        exposures: Arc<dyn ExposureRepository>,
        alerts: Arc<dyn AlertRepository>,
        audit: Arc<dyn AuditSink>,
        bus: EventBus,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            scorer,
            profiles,
            exposures,
            alerts,
            audit,
            bus,
            locks,
        }
    }

    /// Score a client without side effects
    pub async fn snapshot(&self, client_id: &str) -> Result<RiskSnapshot, RiskError> {
        let (profile, _) = self.profiles.get_profile(client_id).await?;
        let positions = self.exposures.exposures_for_client(client_id).await?;
        Ok(self.scorer.score(&profile, &positions))
    }

    /// Evaluate one client under its lock
    pub async fn evaluate_client(
        &self,
        client_id: &str,
    ) -> Result<(RiskSnapshot, Vec<RiskAlert>), RiskError> {
        let _guard = self.locks.lock(client_id).await;
        self.evaluate_locked(client_id).await
    }

    /// Evaluate a client whose lock the caller already holds.
    ///
    /// Writes the fresh score back to the profile and stores, publishes
    /// and logs one alert per breach.
    pub(crate) async fn evaluate_locked(
        &self,
        client_id: &str,
    ) -> Result<(RiskSnapshot, Vec<RiskAlert>), RiskError> {
        let (mut profile, found) = self.profiles.get_profile(client_id).await?;
        let positions = self.exposures.exposures_for_client(client_id).await?;
        let snapshot = self.scorer.score(&profile, &positions);

        if found && profile.risk_score != snapshot.risk_score {
            profile.risk_score = snapshot.risk_score;
            profile.last_updated = snapshot.calculated_at;
            self.profiles.record_score(&profile).await?;
        }

        let alerts = self.breaches(&snapshot);
        for alert in &alerts {
            tracing::warn!(
                client = %alert.client_id,
                alert_type = %alert.alert_type,
                severity = %alert.severity,
                threshold = %alert.threshold,
                current = %alert.current_value,
                "Risk limit breached"
            );
            self.alerts.insert_alert(alert.clone()).await?;
            self.bus.publish(EngineEvent::RiskAlertRaised {
                alert: alert.clone(),
            });
        }
        Ok((snapshot, alerts))
    }

    /// Alerts implied by a snapshot, in margin / concentration / leverage order
    pub fn breaches(&self, snapshot: &RiskSnapshot) -> Vec<RiskAlert> {
        let config = self.scorer.config();
        let client = snapshot.client_id.as_str();
        let mut alerts = Vec::new();

        if snapshot.margin_utilization > config.margin_call_threshold {
            alerts.push(RiskAlert::new(
                client,
                AlertType::MarginCall,
                AlertSeverity::Critical,
                format!(
                    "Margin utilization {} exceeds margin call threshold {}",
                    snapshot.margin_utilization.round_dp(4),
                    config.margin_call_threshold
                ),
                config.margin_call_threshold,
                snapshot.margin_utilization,
            ));
        }
        if snapshot.max_concentration > config.concentration_limit {
            alerts.push(RiskAlert::new(
                client,
                AlertType::Concentration,
                AlertSeverity::High,
                format!(
                    "Concentration in {} at {} exceeds limit {}",
                    snapshot.concentration_symbol.as_deref().unwrap_or("unknown"),
                    snapshot.max_concentration.round_dp(4),
                    config.concentration_limit
                ),
                config.concentration_limit,
                snapshot.max_concentration,
            ));
        }
        if snapshot.leverage > config.leverage_limit {
            alerts.push(RiskAlert::new(
                client,
                AlertType::CreditBreach,
                AlertSeverity::High,
                format!(
                    "Leverage {}x exceeds limit {}x",
                    snapshot.leverage.round_dp(2),
                    config.leverage_limit
                ),
                config.leverage_limit,
                snapshot.leverage,
            ));
        }
        alerts
    }

    /// Evaluate every known client once. A failure for one client is
    /// logged and does not stop the cycle.
    pub async fn run_cycle(&self) -> Result<usize, RiskError> {
        let profiles = self.profiles.list_profiles().await?;
        let mut raised = 0;
        for profile in &profiles {
            match self.evaluate_client(&profile.client_id).await {
                Ok((_, alerts)) => raised += alerts.len(),
                Err(e) => {
                    tracing::error!(client = %profile.client_id, error = %e, "Risk evaluation failed")
                }
            }
        }
        tracing::debug!(clients = profiles.len(), alerts = raised, "Risk cycle complete");
        Ok(raised)
    }

    /// Start the periodic tick
    pub fn start(self: Arc<Self>) -> MonitorHandle {
        let period = self.scorer.config().monitor_interval();
        spawn_periodic("risk-monitor", period, move || {
            let monitor = self.clone();
            async move {
                if let Err(e) = monitor.run_cycle().await {
                    tracing::error!(error = %e, "Risk monitor cycle failed");
                }
            }
        })
    }

    /// Mark an alert acknowledged.
    ///
    /// Returns false only when the alert does not exist. Acknowledging an
    /// already acknowledged alert succeeds without changing anything.
    ///
    /// The audit record is written before the flag flips, so a failed
    /// journal write leaves the alert unacknowledged and a retry records it.
    pub async fn acknowledge_alert(&self, alert_id: &str, by: &str) -> Result<bool, RiskError> {
        let Some(alert) = self.alerts.get_alert(alert_id).await? else {
            tracing::debug!(alert_id, "Acknowledge for unknown alert");
            return Ok(false);
        };
        let _guard = self.locks.lock(&alert.client_id).await;
        let Some(alert) = self.alerts.get_alert(alert_id).await? else {
            return Ok(false);
        };
        if alert.acknowledged {
            return Ok(true);
        }

        self.audit.record(AuditRecord::new(
            by,
            AuditAction::AlertAcknowledged {
                alert_id: alert.id.clone(),
                client_id: alert.client_id.clone(),
            },
        ))?;
        self.alerts.acknowledge_alert(alert_id).await?;
        self.bus
            .publish(EngineEvent::alert_acknowledged(alert.id.clone(), by));
        tracing::info!(alert_id, client = %alert.client_id, by, "Alert acknowledged");
        Ok(true)
    }

    pub async fn get_alerts(&self, filter: &AlertFilter) -> Result<Vec<RiskAlert>, RiskError> {
        Ok(self.alerts.list_alerts(filter).await?)
    }

    pub async fn portfolio_risk(&self) -> Result<PortfolioRisk, RiskError> {
        let config = self.scorer.config();
        let profiles = self.profiles.list_profiles().await?;

        let mut total_credit_limit = Decimal::ZERO;
        let mut total_used_credit = Decimal::ZERO;
        let mut score_sum = Decimal::ZERO;
        let mut distribution = RiskDistribution::default();
        for p in &profiles {
            total_credit_limit += p.credit_limit;
            total_used_credit += p.used_credit;
            score_sum += p.risk_score;
            if p.risk_score < config.low_risk_score {
                distribution.low += 1;
            } else if p.risk_score < config.high_risk_score {
                distribution.medium += 1;
            } else {
                distribution.high += 1;
            }
        }
        let average_risk_score = if profiles.is_empty() {
            Decimal::ZERO
        } else {
            score_sum / Decimal::from(profiles.len())
        };

        let mut unresolved = AlertCounts::default();
        for alert in self
            .alerts
            .list_alerts(&AlertFilter::default().unacknowledged())
            .await?
        {
            unresolved.add(alert.severity);
        }

        Ok(PortfolioRisk {
            total_clients: profiles.len(),
            total_credit_limit,
            total_used_credit,
            total_available_credit: total_credit_limit - total_used_credit,
            average_risk_score,
            unresolved_alerts: unresolved,
            risk_distribution: distribution,
        })
    }

    /// Unacknowledged alerts grouped by client, for operator dashboards
    pub async fn open_alerts_by_client(&self) -> Result<BTreeMap<String, usize>, RiskError> {
        let mut counts = BTreeMap::new();
        for alert in self
            .alerts
            .list_alerts(&AlertFilter::default().unacknowledged())
            .await?
        {
            *counts.entry(alert.client_id).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskConfig;
    use riskbank_core::{ClientExposure, ProfileUpdate};
    use riskbank_events::MemoryJournal;
    use riskbank_store::InMemoryStore;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct Fixture {
        store: Arc<InMemoryStore>,
        journal: Arc<MemoryJournal>,
        profiles: Arc<CreditProfileStore>,
        monitor: Arc<RiskMonitor>,
    }

    fn fixture(config: RiskConfig) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let journal = Arc::new(MemoryJournal::new());
        let bus = EventBus::default();
        let profiles = Arc::new(CreditProfileStore::new(store.clone(), bus.clone()));
        let monitor = Arc::new(RiskMonitor::new(
            RiskScorer::new(config),
            profiles.clone(),
            store.clone(),
            store.clone(),
            journal.clone(),
            bus,
            Arc::new(KeyedLocks::new()),
        ));
        Fixture {
            store,
            journal,
            profiles,
            monitor,
        }
    }

    async fn leveraged_client(f: &Fixture) {
        f.profiles
            .update_profile(
                "C1",
                &ProfileUpdate::default()
                    .credit_limit(dec!(10000000))
                    .collateral_value(dec!(100000))
                    .used_credit(dec!(1200000)),
            )
            .await
            .unwrap();
        f.store
            .upsert_exposure(ClientExposure::new("C1", "BTC/USDT", dec!(1200000), dec!(0)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_leverage_breach_raises_single_alert() {
        let f = fixture(RiskConfig::default());
        leveraged_client(&f).await;

        let (snapshot, alerts) = f.monitor.evaluate_client("C1").await.unwrap();
        assert_eq!(snapshot.leverage, dec!(12));
        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.alert_type, AlertType::CreditBreach);
        assert_eq!(alert.severity, AlertSeverity::High);
        assert_eq!(alert.threshold, dec!(10));
        assert_eq!(alert.current_value, dec!(12));

        let (profile, _) = f.profiles.get_profile("C1").await.unwrap();
        assert_eq!(profile.risk_score, snapshot.risk_score);
    }

    #[tokio::test]
    async fn test_repeated_breach_is_not_deduplicated() {
        let f = fixture(RiskConfig::default());
        leveraged_client(&f).await;
        f.monitor.run_cycle().await.unwrap();
        f.monitor.run_cycle().await.unwrap();
        let alerts = f.monitor.get_alerts(&AlertFilter::for_client("C1")).await.unwrap();
        assert_eq!(alerts.len(), 2);
    }

    #[tokio::test]
    async fn test_margin_and_concentration_breaches() {
        let f = fixture(RiskConfig::default());
        f.profiles
            .update_profile(
                "C2",
                &ProfileUpdate::default()
                    .credit_limit(dec!(1000))
                    .margin_requirement(dec!(900)),
            )
            .await
            .unwrap();
        f.store
            .upsert_exposure(ClientExposure::new("C2", "ETH/USDT", dec!(400), dec!(900)))
            .await
            .unwrap();

        let (_, alerts) = f.monitor.evaluate_client("C2").await.unwrap();
        let kinds: Vec<_> = alerts.iter().map(|a| (a.alert_type, a.severity)).collect();
        assert_eq!(
            kinds,
            vec![
                (AlertType::MarginCall, AlertSeverity::Critical),
                (AlertType::Concentration, AlertSeverity::High),
            ]
        );
    }

    #[tokio::test]
    async fn test_acknowledge_twice() {
        let f = fixture(RiskConfig::default());
        leveraged_client(&f).await;
        let (_, alerts) = f.monitor.evaluate_client("C1").await.unwrap();
        let id = &alerts[0].id;

        assert!(f.monitor.acknowledge_alert(id, "ops").await.unwrap());
        assert!(f.monitor.acknowledge_alert(id, "ops2").await.unwrap());
        assert!(!f.monitor.acknowledge_alert("alert-missing", "ops").await.unwrap());

        let records = f.journal.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].actor, "ops");

        let open = f
            .monitor
            .get_alerts(&AlertFilter::for_client("C1").unacknowledged())
            .await
            .unwrap();
        assert!(open.is_empty());
    }

    #[tokio::test]
    async fn test_acknowledge_retry_after_journal_failure() {
        let f = fixture(RiskConfig::default());
        leveraged_client(&f).await;
        let (_, alerts) = f.monitor.evaluate_client("C1").await.unwrap();
        let id = &alerts[0].id;

        f.journal.set_unavailable(true);
        let err = f.monitor.acknowledge_alert(id, "ops").await.unwrap_err();
        assert!(matches!(err, RiskError::Audit(_)));
        let alert = f.store.get_alert(id).await.unwrap().unwrap();
        assert!(!alert.acknowledged);

        f.journal.set_unavailable(false);
        assert!(f.monitor.acknowledge_alert(id, "ops").await.unwrap());
        let records = f.journal.records();
        assert_eq!(records.len(), 1);
        assert!(matches!(
            &records[0].action,
            AuditAction::AlertAcknowledged { alert_id, .. } if alert_id == id
        ));
        assert!(f.store.get_alert(id).await.unwrap().unwrap().acknowledged);
    }

    #[tokio::test]
    async fn test_portfolio_risk() {
        let f = fixture(RiskConfig::default());
        leveraged_client(&f).await;
        f.profiles
            .update_profile("C2", &ProfileUpdate::default().credit_limit(dec!(500)))
            .await
            .unwrap();
        f.monitor.run_cycle().await.unwrap();

        let portfolio = f.monitor.portfolio_risk().await.unwrap();
        assert_eq!(portfolio.total_clients, 2);
        assert_eq!(portfolio.total_credit_limit, dec!(10000500));
        assert_eq!(portfolio.total_used_credit, dec!(1200000));
        assert_eq!(portfolio.total_available_credit, dec!(8800500));
        assert_eq!(portfolio.unresolved_alerts.high, 1);
        assert_eq!(portfolio.risk_distribution.low + portfolio.risk_distribution.medium, 2);
        assert_eq!(
            f.monitor.open_alerts_by_client().await.unwrap().get("C1"),
            Some(&1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_tick() {
        let f = fixture(RiskConfig::default());
        leveraged_client(&f).await;

        let handle = f.monitor.clone().start();
        tokio::time::sleep(Duration::from_secs(61)).await;
        handle.stop().await;

        let alerts = f.monitor.get_alerts(&AlertFilter::default()).await.unwrap();
        assert_eq!(alerts.len(), 2);
    }
}
