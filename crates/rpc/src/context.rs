//! Application context - wires everything together

use std::sync::Arc;

use riskbank_bus::{EventBus, PeriodicHandle};
use riskbank_core::{
    ClientExposure, CreditProfile, ProfileUpdate, ReconciliationItem, ReconciliationStatus,
    RiskAlert, Settlement,
};
use riskbank_events::{AuditSink, JsonlJournal};
use riskbank_risk::{CreditRiskEngine, PortfolioRisk, RiskOutcome, RiskSnapshot};
use riskbank_settlement::{
    Collaborators, MockConfirmationSource, MockMover, MockMovementQuery, MovementQuery,
    ReconciliationEngine, ReconciliationSummary, ReconciliationUpdate, SettlementOrchestrator,
    TradeData,
};
use riskbank_store::{AlertFilter, InMemoryStore};

use crate::config::AppConfig;
use crate::error::ApiError;

/// Handles to the mock collaborators, for driving simulations and tests
#[derive(Clone)]
pub struct MockHandles {
    pub mover: Arc<MockMover>,
    pub confirmations: Arc<MockConfirmationSource>,
    pub movements: Arc<MockMovementQuery>,
}

/// Running background loops
pub struct BackgroundTasks {
    monitor: PeriodicHandle,
    sweep: PeriodicHandle,
}

impl BackgroundTasks {
    pub async fn stop(self) {
        self.monitor.stop().await;
        self.sweep.stop().await;
    }
}

/// Application context - the admin/API surface over all components
pub struct AppContext {
    pub config: AppConfig,
    pub bus: EventBus,
    pub risk: CreditRiskEngine,
    pub settlement: Arc<SettlementOrchestrator>,
    pub reconciliation: Arc<ReconciliationEngine>,
    journal: Arc<JsonlJournal>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        collaborators: Collaborators,
        movements: Arc<dyn MovementQuery>,
    ) -> Result<Self, ApiError> {
        let store = Arc::new(InMemoryStore::new());
        let bus = EventBus::new(config.bus_capacity);
        let journal = Arc::new(JsonlJournal::new(&config.journal_dir)?);
        let audit: Arc<dyn AuditSink> = journal.clone();

        let risk = CreditRiskEngine::new(config.risk.clone(), store.clone(), audit.clone(), bus.clone());
        let reconciliation = Arc::new(ReconciliationEngine::new(
            config.reconciliation.clone(),
            store.clone(),
            store.clone(),
            movements,
            audit.clone(),
            bus.clone(),
        ));
        let settlement = SettlementOrchestrator::new(
            config.settlement.clone(),
            store,
            collaborators,
            reconciliation.clone(),
            audit,
            bus.clone(),
        );

        tracing::info!(journal = %config.journal_dir.display(), "Application context ready");
        Ok(Self {
            config,
            bus,
            risk,
            settlement,
            reconciliation,
            journal,
        })
    }

    /// Context backed by the mock movers, confirmation source and
    /// movement query
    pub fn with_mocks(config: AppConfig) -> Result<(Self, MockHandles), ApiError> {
        let mocks = MockHandles {
            mover: Arc::new(MockMover::new()),
            confirmations: Arc::new(MockConfirmationSource::default()),
            movements: Arc::new(MockMovementQuery::new()),
        };
        let ctx = Self::new(
            config,
            Collaborators {
                mover: mocks.mover.clone(),
                confirmations: mocks.confirmations.clone(),
            },
            mocks.movements.clone(),
        )?;
        Ok((ctx, mocks))
    }

    pub fn journal(&self) -> &JsonlJournal {
        &self.journal
    }

    /// Start the risk monitor tick and the reconciliation sweep
    pub fn start_background(&self) -> BackgroundTasks {
        BackgroundTasks {
            monitor: self.risk.monitor().clone().start(),
            sweep: self.reconciliation.clone().start(),
        }
    }

    /// Stop background loops and abort in-flight confirmation trackers
    pub async fn shutdown(&self, tasks: BackgroundTasks) {
        tasks.stop().await;
        self.settlement.shutdown();
    }

    // === Reads ===

    /// `None` when the client has never been seen
    pub async fn get_credit_profile(&self, client_id: &str) -> Result<Option<CreditProfile>, ApiError> {
        let (profile, found) = self.risk.get_credit_profile(client_id).await?;
        Ok(found.then_some(profile))
    }

    pub async fn get_exposures(&self, client_id: &str) -> Result<Vec<ClientExposure>, ApiError> {
        Ok(self.risk.get_exposures(client_id).await?)
    }

    pub async fn calculate_real_time_risk(&self, client_id: &str) -> Result<RiskSnapshot, ApiError> {
        let (_, found) = self.risk.get_credit_profile(client_id).await?;
        if !found {
            return Err(ApiError::UnknownClient(client_id.to_string()));
        }
        Ok(self.risk.calculate_real_time_risk(client_id).await?)
    }

    /// Newest first
    pub async fn get_risk_alerts(
        &self,
        client_id: Option<&str>,
        unacknowledged_only: bool,
    ) -> Result<Vec<RiskAlert>, ApiError> {
        let filter = AlertFilter {
            client_id: client_id.map(String::from),
            unacknowledged_only,
        };
        Ok(self.risk.monitor().get_alerts(&filter).await?)
    }

    pub async fn get_portfolio_risk(&self) -> Result<PortfolioRisk, ApiError> {
        Ok(self.risk.monitor().portfolio_risk().await?)
    }

    pub async fn get_settlement(&self, settlement_id: &str) -> Result<Option<Settlement>, ApiError> {
        Ok(self.settlement.get_settlement(settlement_id).await?)
    }

    pub async fn get_settlements_for_client(&self, client_id: &str) -> Result<Vec<Settlement>, ApiError> {
        Ok(self.settlement.settlements_for_client(client_id).await?)
    }

    pub async fn get_reconciliation_items(
        &self,
        status: Option<ReconciliationStatus>,
    ) -> Result<Vec<ReconciliationItem>, ApiError> {
        Ok(self.reconciliation.get_items(status).await?)
    }

    pub async fn get_reconciliation_summary(&self) -> Result<ReconciliationSummary, ApiError> {
        Ok(self.reconciliation.summary().await?)
    }

    // === Writes ===

    pub async fn add_exposure(&self, exposure: ClientExposure) -> Result<RiskOutcome, ApiError> {
        Ok(self.risk.add_exposure(exposure).await?)
    }

    pub async fn update_credit_profile(
        &self,
        client_id: &str,
        update: &ProfileUpdate,
        by: &str,
    ) -> Result<RiskOutcome, ApiError> {
        Ok(self.risk.update_credit_profile(client_id, update, by).await?)
    }

    pub async fn acknowledge_alert(&self, alert_id: &str, by: &str) -> Result<bool, ApiError> {
        Ok(self.risk.monitor().acknowledge_alert(alert_id, by).await?)
    }

    pub async fn create_settlement(&self, trade: TradeData) -> Result<Settlement, ApiError> {
        Ok(self.settlement.create_settlement(trade).await?)
    }

    pub async fn process_settlement(&self, settlement_id: &str) -> Result<bool, ApiError> {
        Ok(self.settlement.process_settlement(settlement_id).await?)
    }

    pub async fn cancel_settlement(&self, settlement_id: &str, by: &str) -> Result<Settlement, ApiError> {
        Ok(self.settlement.cancel_settlement(settlement_id, by).await?)
    }

    pub async fn update_reconciliation_item(
        &self,
        item_id: &str,
        update: &ReconciliationUpdate,
        by: &str,
    ) -> Result<bool, ApiError> {
        Ok(self.reconciliation.update_item(item_id, update, by).await?)
    }

    /// Trade-completion feed entry point. T+0 trades start processing
    /// inside `create_settlement`.
    pub async fn on_trade_completed(&self, trade: TradeData) -> Result<Settlement, ApiError> {
        self.create_settlement(trade).await
    }
}
