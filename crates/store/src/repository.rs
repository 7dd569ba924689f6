//! Repository interfaces
//!
//! One trait per entity. All methods are async so backends may do I/O.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use riskbank_core::{
    ClientExposure, CreditProfile, ReconciliationItem, ReconciliationStatus, RiskAlert, Settlement,
};

use crate::error::StoreError;

#[async_trait]
pub trait ExposureRepository: Send + Sync {
    /// Store the latest position for (client, symbol), replacing any previous one
    async fn upsert_exposure(&self, exposure: ClientExposure) -> Result<(), StoreError>;

    async fn exposures_for_client(&self, client_id: &str)
        -> Result<Vec<ClientExposure>, StoreError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_profile(&self, client_id: &str) -> Result<Option<CreditProfile>, StoreError>;

    async fn put_profile(&self, profile: CreditProfile) -> Result<(), StoreError>;

    async fn list_profiles(&self) -> Result<Vec<CreditProfile>, StoreError>;
}

/// Alert query filter
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub client_id: Option<String>,
    pub unacknowledged_only: bool,
}

impl AlertFilter {
    pub fn for_client(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            unacknowledged_only: false,
        }
    }

    pub fn unacknowledged(mut self) -> Self {
        self.unacknowledged_only = true;
        self
    }

    pub fn matches(&self, alert: &RiskAlert) -> bool {
        if let Some(ref client) = self.client_id {
            if &alert.client_id != client {
                return false;
            }
        }
        !(self.unacknowledged_only && alert.acknowledged)
    }
}

#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn insert_alert(&self, alert: RiskAlert) -> Result<(), StoreError>;

    async fn get_alert(&self, alert_id: &str) -> Result<Option<RiskAlert>, StoreError>;

    /// Set `acknowledged` atomically.
    ///
    /// Returns `None` if the alert does not exist, otherwise the alert and
    /// whether this call flipped the flag.
    async fn acknowledge_alert(&self, alert_id: &str)
        -> Result<Option<(RiskAlert, bool)>, StoreError>;

    /// Alerts matching the filter, newest first
    async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<RiskAlert>, StoreError>;
}

#[async_trait]
pub trait SettlementRepository: Send + Sync {
    async fn insert_settlement(&self, settlement: Settlement) -> Result<(), StoreError>;

    async fn get_settlement(&self, settlement_id: &str) -> Result<Option<Settlement>, StoreError>;

    /// Overwrite an existing settlement
    async fn update_settlement(&self, settlement: Settlement) -> Result<(), StoreError>;

    async fn settlements_for_client(&self, client_id: &str) -> Result<Vec<Settlement>, StoreError>;

    async fn settlements_created_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Settlement>, StoreError>;
}

#[async_trait]
pub trait ReconciliationRepository: Send + Sync {
    async fn insert_item(&self, item: ReconciliationItem) -> Result<(), StoreError>;

    async fn get_item(&self, item_id: &str) -> Result<Option<ReconciliationItem>, StoreError>;

    async fn update_item(&self, item: ReconciliationItem) -> Result<(), StoreError>;

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<ReconciliationItem>, StoreError>;

    /// Items in creation order, optionally filtered by status
    async fn list_items(
        &self,
        status: Option<ReconciliationStatus>,
    ) -> Result<Vec<ReconciliationItem>, StoreError>;
}
