//! Credit profile store

use std::sync::Arc;

use riskbank_bus::{EngineEvent, EventBus};
use riskbank_core::{CreditProfile, ProfileUpdate};
use riskbank_store::ProfileRepository;

use crate::error::RiskError;

pub struct CreditProfileStore {
    repo: Arc<dyn ProfileRepository>,
    bus: EventBus,
}

impl CreditProfileStore {
    pub fn new(repo: Arc<dyn ProfileRepository>, bus: EventBus) -> Self {
        Self { repo, bus }
    }

    /// Stored profile, or a zeroed default for an unknown client.
    ///
    /// The flag tells the caller whether the profile actually exists.
    pub async fn get_profile(&self, client_id: &str) -> Result<(CreditProfile, bool), RiskError> {
        Ok(match self.repo.get_profile(client_id).await? {
            Some(profile) => (profile, true),
            None => (CreditProfile::empty(client_id), false),
        })
    }

    /// Reject an update that must never be written
    pub fn validate_update(client_id: &str, update: &ProfileUpdate) -> Result<(), RiskError> {
        if client_id.trim().is_empty() {
            return Err(RiskError::EmptyClient);
        }
        if let Some((field, value)) = update.first_negative() {
            return Err(RiskError::NegativeProfileField { field, value });
        }
        Ok(())
    }

    /// Merge a partial update, creating the profile on first use.
    ///
    /// Negative monetary fields are rejected before anything is written.
    /// Callers serialise updates per client.
    pub async fn update_profile(
        &self,
        client_id: &str,
        update: &ProfileUpdate,
    ) -> Result<CreditProfile, RiskError> {
        Self::validate_update(client_id, update)?;

        let (mut profile, _) = self.get_profile(client_id).await?;
        profile.apply(update);
        self.repo.put_profile(profile.clone()).await?;

        tracing::debug!(
            client = %client_id,
            used = %profile.used_credit,
            available = %profile.available_credit,
            "Credit profile updated"
        );
        self.bus.publish(EngineEvent::ProfileUpdated {
            profile: profile.clone(),
        });
        Ok(profile)
    }

    /// Store a recomputed risk score without touching anything else
    pub async fn record_score(&self, profile: &CreditProfile) -> Result<(), RiskError> {
        Ok(self.repo.put_profile(profile.clone()).await?)
    }

    pub async fn list_profiles(&self) -> Result<Vec<CreditProfile>, RiskError> {
        Ok(self.repo.list_profiles().await?)
    }
}
