//! Exposure ledger
//!
//! Latest position per (client, symbol). Re-sending a position replaces
//! the previous one, so replaying a feed is idempotent.

use std::sync::Arc;

use riskbank_core::ClientExposure;
use riskbank_store::ExposureRepository;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::RiskError;

/// Aggregates over a client's positions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureTotals {
    pub positions: usize,
    /// Sum of |notional|. This is what counts against the credit limit.
    pub gross_notional: Decimal,
    pub margin_used: Decimal,
    pub unrealized_pnl: Decimal,
    /// Largest single-symbol |notional| and its symbol
    pub largest_position: Option<(String, Decimal)>,
}

impl ExposureTotals {
    pub fn from_positions(positions: &[ClientExposure]) -> Self {
        let mut totals = ExposureTotals {
            positions: positions.len(),
            ..Default::default()
        };
        for p in positions {
            let gross = p.gross_notional();
            totals.gross_notional += gross;
            totals.margin_used += p.margin_used;
            totals.unrealized_pnl += p.unrealized_pnl;
            let larger = totals
                .largest_position
                .as_ref()
                .map_or(true, |(_, current)| gross > *current);
            if larger {
                totals.largest_position = Some((p.symbol.clone(), gross));
            }
        }
        totals
    }
}

pub struct ExposureLedger {
    repo: Arc<dyn ExposureRepository>,
}

impl ExposureLedger {
    pub fn new(repo: Arc<dyn ExposureRepository>) -> Self {
        Self { repo }
    }

    /// Validate and record a position, returning the client's new totals
    pub async fn add_exposure(&self, exposure: ClientExposure) -> Result<ExposureTotals, RiskError> {
        exposure.validate()?;
        let client_id = exposure.client_id.clone();
        tracing::debug!(
            client = %client_id,
            symbol = %exposure.symbol,
            notional = %exposure.notional,
            "Recording exposure"
        );
        self.repo.upsert_exposure(exposure).await?;
        self.totals(&client_id).await
    }

    /// Positions for a client; empty for an unknown client
    pub async fn get_exposures(&self, client_id: &str) -> Result<Vec<ClientExposure>, RiskError> {
        Ok(self.repo.exposures_for_client(client_id).await?)
    }

    pub async fn totals(&self, client_id: &str) -> Result<ExposureTotals, RiskError> {
        let positions = self.get_exposures(client_id).await?;
        Ok(ExposureTotals::from_positions(&positions))
    }
}
