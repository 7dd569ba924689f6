//! In-memory repository backend
//!
//! Keyed maps for exposures, profiles and settlements; append-mostly
//! vectors for alerts and reconciliation items (snapshot on read).

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use riskbank_core::{
    ClientExposure, CreditProfile, ReconciliationItem, ReconciliationStatus, RiskAlert, Settlement,
};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::repository::{
    AlertFilter, AlertRepository, ExposureRepository, ProfileRepository, ReconciliationRepository,
    SettlementRepository,
};

#[derive(Default)]
pub struct InMemoryStore {
    /// client -> symbol -> latest position
    exposures: RwLock<HashMap<String, BTreeMap<String, ClientExposure>>>,
    profiles: RwLock<HashMap<String, CreditProfile>>,
    alerts: RwLock<Vec<RiskAlert>>,
    settlements: RwLock<HashMap<String, Settlement>>,
    reconciliation: RwLock<Vec<ReconciliationItem>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExposureRepository for InMemoryStore {
    async fn upsert_exposure(&self, exposure: ClientExposure) -> Result<(), StoreError> {
        let mut exposures = self.exposures.write().await;
        exposures
            .entry(exposure.client_id.clone())
            .or_default()
            .insert(exposure.symbol.clone(), exposure);
        Ok(())
    }

    async fn exposures_for_client(
        &self,
        client_id: &str,
    ) -> Result<Vec<ClientExposure>, StoreError> {
        let exposures = self.exposures.read().await;
        Ok(exposures
            .get(client_id)
            .map(|positions| positions.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryStore {
    async fn get_profile(&self, client_id: &str) -> Result<Option<CreditProfile>, StoreError> {
        Ok(self.profiles.read().await.get(client_id).cloned())
    }

    async fn put_profile(&self, profile: CreditProfile) -> Result<(), StoreError> {
        self.profiles
            .write()
            .await
            .insert(profile.client_id.clone(), profile);
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<CreditProfile>, StoreError> {
        let mut profiles: Vec<_> = self.profiles.read().await.values().cloned().collect();
        profiles.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        Ok(profiles)
    }
}

#[async_trait]
impl AlertRepository for InMemoryStore {
    async fn insert_alert(&self, alert: RiskAlert) -> Result<(), StoreError> {
        self.alerts.write().await.push(alert);
        Ok(())
    }

    async fn get_alert(&self, alert_id: &str) -> Result<Option<RiskAlert>, StoreError> {
        let alerts = self.alerts.read().await;
        Ok(alerts.iter().find(|a| a.id == alert_id).cloned())
    }

    async fn acknowledge_alert(
        &self,
        alert_id: &str,
    ) -> Result<Option<(RiskAlert, bool)>, StoreError> {
        let mut alerts = self.alerts.write().await;
        Ok(alerts.iter_mut().find(|a| a.id == alert_id).map(|alert| {
            let changed = !alert.acknowledged;
            alert.acknowledged = true;
            (alert.clone(), changed)
        }))
    }

    async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<RiskAlert>, StoreError> {
        let alerts = self.alerts.read().await;
        Ok(alerts
            .iter()
            .rev()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SettlementRepository for InMemoryStore {
    async fn insert_settlement(&self, settlement: Settlement) -> Result<(), StoreError> {
        let mut settlements = self.settlements.write().await;
        if settlements.contains_key(&settlement.id) {
            return Err(StoreError::AlreadyExists {
                entity: "settlement",
                id: settlement.id,
            });
        }
        settlements.insert(settlement.id.clone(), settlement);
        Ok(())
    }

    async fn get_settlement(&self, settlement_id: &str) -> Result<Option<Settlement>, StoreError> {
        Ok(self.settlements.read().await.get(settlement_id).cloned())
    }

    async fn update_settlement(&self, settlement: Settlement) -> Result<(), StoreError> {
        let mut settlements = self.settlements.write().await;
        match settlements.get_mut(&settlement.id) {
            Some(slot) => {
                *slot = settlement;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "settlement",
                id: settlement.id,
            }),
        }
    }

    async fn settlements_for_client(&self, client_id: &str) -> Result<Vec<Settlement>, StoreError> {
        let settlements = self.settlements.read().await;
        let mut found: Vec<_> = settlements
            .values()
            .filter(|s| s.client_id == client_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn settlements_created_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Settlement>, StoreError> {
        let settlements = self.settlements.read().await;
        let mut found: Vec<_> = settlements
            .values()
            .filter(|s| s.created_at >= since)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }
}

#[async_trait]
impl ReconciliationRepository for InMemoryStore {
    async fn insert_item(&self, item: ReconciliationItem) -> Result<(), StoreError> {
        self.reconciliation.write().await.push(item);
        Ok(())
    }

    async fn get_item(&self, item_id: &str) -> Result<Option<ReconciliationItem>, StoreError> {
        let items = self.reconciliation.read().await;
        Ok(items.iter().find(|i| i.id == item_id).cloned())
    }

    async fn update_item(&self, item: ReconciliationItem) -> Result<(), StoreError> {
        let mut items = self.reconciliation.write().await;
        match items.iter_mut().find(|i| i.id == item.id) {
            Some(slot) => {
                *slot = item;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "reconciliation item",
                id: item.id,
            }),
        }
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<ReconciliationItem>, StoreError> {
        let items = self.reconciliation.read().await;
        Ok(items.iter().find(|i| i.reference == reference).cloned())
    }

    async fn list_items(
        &self,
        status: Option<ReconciliationStatus>,
    ) -> Result<Vec<ReconciliationItem>, StoreError> {
        let items = self.reconciliation.read().await;
        Ok(items
            .iter()
            .filter(|i| status.map_or(true, |s| i.status == s))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskbank_core::{AlertSeverity, AlertType, Asset, ReconciliationType};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_exposure_upsert_overwrites_symbol() {
        let store = InMemoryStore::new();
        store
            .upsert_exposure(ClientExposure::new("C1", "BTC/USDT", dec!(100), dec!(10)))
            .await
            .unwrap();
        store
            .upsert_exposure(ClientExposure::new("C1", "BTC/USDT", dec!(300), dec!(30)))
            .await
            .unwrap();
        store
            .upsert_exposure(ClientExposure::new("C1", "ETH/USDT", dec!(50), dec!(5)))
            .await
            .unwrap();

        let positions = store.exposures_for_client("C1").await.unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].notional, dec!(300));
        assert!(store.exposures_for_client("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_acknowledge_reports_change_once() {
        let store = InMemoryStore::new();
        let alert = RiskAlert::new(
            "C1",
            AlertType::Concentration,
            AlertSeverity::High,
            "msg",
            dec!(0.25),
            dec!(0.4),
        );
        let id = alert.id.clone();
        store.insert_alert(alert).await.unwrap();

        let (_, changed) = store.acknowledge_alert(&id).await.unwrap().unwrap();
        assert!(changed);
        let (acked, changed) = store.acknowledge_alert(&id).await.unwrap().unwrap();
        assert!(!changed);
        assert!(acked.acknowledged);
        assert!(store.acknowledge_alert("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_alert_filter_newest_first() {
        let store = InMemoryStore::new();
        for client in ["C1", "C2", "C1"] {
            store
                .insert_alert(RiskAlert::new(
                    client,
                    AlertType::MarginCall,
                    AlertSeverity::Critical,
                    client,
                    dec!(0.8),
                    dec!(0.9),
                ))
                .await
                .unwrap();
        }
        let c1 = store.list_alerts(&AlertFilter::for_client("C1")).await.unwrap();
        assert_eq!(c1.len(), 2);
        assert!(c1[0].timestamp >= c1[1].timestamp);
    }

    #[tokio::test]
    async fn test_reconciliation_status_filter() {
        let store = InMemoryStore::new();
        let mut item = ReconciliationItem::unmatched(
            ReconciliationType::Settlement,
            "ins-1",
            None,
            Asset::Btc,
            dec!(1),
            dec!(1.01),
        );
        store.insert_item(item.clone()).await.unwrap();
        item.status = ReconciliationStatus::Resolved;
        store.update_item(item).await.unwrap();

        assert!(store
            .list_items(Some(ReconciliationStatus::Unmatched))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.list_items(None).await.unwrap().len(), 1);
        assert!(store.find_by_reference("ins-1").await.unwrap().is_some());
    }
}
