//! Credit risk engine facade
//!
//! Owns the per-client lock discipline: an exposure change, the profile
//! update it drives and the immediate risk re-check run under one lock.

use std::sync::Arc;

use riskbank_bus::{EngineEvent, EventBus};
use riskbank_core::{ClientExposure, CreditProfile, ProfileUpdate, RiskAlert};
use riskbank_events::{AuditAction, AuditRecord, AuditSink};
use riskbank_store::{AlertRepository, ExposureRepository, KeyedLocks, ProfileRepository};
use serde::Serialize;

use crate::config::RiskConfig;
use crate::error::RiskError;
use crate::exposure::{ExposureLedger, ExposureTotals};
use crate::monitor::RiskMonitor;
use crate::profile::CreditProfileStore;
use crate::scoring::{RiskScorer, RiskSnapshot};

/// Result of a mutating call: the new profile, the fresh score and any
/// alerts raised by the immediate re-check. Breaches never fail the call.
#[derive(Debug, Clone, Serialize)]
pub struct RiskOutcome {
    pub profile: CreditProfile,
    pub snapshot: RiskSnapshot,
    pub alerts: Vec<RiskAlert>,
}

pub struct CreditRiskEngine {
    ledger: ExposureLedger,
    profiles: Arc<CreditProfileStore>,
    monitor: Arc<RiskMonitor>,
    audit: Arc<dyn AuditSink>,
    bus: EventBus,
    locks: Arc<KeyedLocks>,
}

impl CreditRiskEngine {
    pub fn new<S>(config: RiskConfig, store: Arc<S>, audit: Arc<dyn AuditSink>, bus: EventBus) -> Self
    where
        S: ExposureRepository + ProfileRepository + AlertRepository + 'static,
    {
        let locks = Arc::new(KeyedLocks::new());
        let profiles = Arc::new(CreditProfileStore::new(store.clone(), bus.clone()));
        let monitor = Arc::new(RiskMonitor::new(
            RiskScorer::new(config),
            profiles.clone(),
            store.clone(),
            store.clone(),
            audit.clone(),
            bus.clone(),
            locks.clone(),
        ));
        Self {
            ledger: ExposureLedger::new(store),
            profiles,
            monitor,
            audit,
            bus,
            locks,
        }
    }

    pub fn monitor(&self) -> &Arc<RiskMonitor> {
        &self.monitor
    }

    /// Record a position and bring the client's profile in line with it.
    ///
    /// `used_credit` becomes the sum of |notional| and `margin_requirement`
    /// the sum of margin used across all of the client's positions.
    pub async fn add_exposure(&self, exposure: ClientExposure) -> Result<RiskOutcome, RiskError> {
        exposure.validate()?;
        let client_id = exposure.client_id.clone();
        let _guard = self.locks.lock(&client_id).await;

        let totals: ExposureTotals = self.ledger.add_exposure(exposure.clone()).await?;
        self.profiles
            .update_profile(
                &client_id,
                &ProfileUpdate::default()
                    .used_credit(totals.gross_notional)
                    .margin_requirement(totals.margin_used),
            )
            .await?;
        self.bus.publish(EngineEvent::exposure_added(exposure));

        let (snapshot, alerts) = self.monitor.evaluate_locked(&client_id).await?;
        let (profile, _) = self.profiles.get_profile(&client_id).await?;
        tracing::info!(
            client = %client_id,
            used = %profile.used_credit,
            available = %profile.available_credit,
            score = %snapshot.risk_score,
            alerts = alerts.len(),
            "Exposure added"
        );
        Ok(RiskOutcome {
            profile,
            snapshot,
            alerts,
        })
    }

    pub async fn get_exposures(&self, client_id: &str) -> Result<Vec<ClientExposure>, RiskError> {
        self.ledger.get_exposures(client_id).await
    }

    /// Profile and whether it exists
    pub async fn get_credit_profile(
        &self,
        client_id: &str,
    ) -> Result<(CreditProfile, bool), RiskError> {
        self.profiles.get_profile(client_id).await
    }

    /// Admin override of profile fields, audited and re-checked
    pub async fn update_credit_profile(
        &self,
        client_id: &str,
        update: &ProfileUpdate,
        by: &str,
    ) -> Result<RiskOutcome, RiskError> {
        CreditProfileStore::validate_update(client_id, update)?;
        let _guard = self.locks.lock(client_id).await;

        // journal first: an override that cannot be audited is not applied
        self.audit.record(AuditRecord::new(
            by,
            AuditAction::ProfileOverride {
                client_id: client_id.to_string(),
                fields: update.field_names().into_iter().map(String::from).collect(),
            },
        ))?;
        self.profiles.update_profile(client_id, update).await?;
        tracing::info!(client = %client_id, by, fields = ?update.field_names(), "Credit profile overridden");

        let (snapshot, alerts) = self.monitor.evaluate_locked(client_id).await?;
        let (profile, _) = self.profiles.get_profile(client_id).await?;
        Ok(RiskOutcome {
            profile,
            snapshot,
            alerts,
        })
    }

    /// Current score for a client; raises no alerts
    pub async fn calculate_real_time_risk(&self, client_id: &str) -> Result<RiskSnapshot, RiskError> {
        self.monitor.snapshot(client_id).await
    }
}
