//! Instruction planning
//!
//! Every trade splits into a base-asset leg and a quote-asset leg:
//!
//! | side | pay               | receive           |
//! |------|-------------------|-------------------|
//! | buy  | quote (notional)  | base (quantity)   |
//! | sell | base (quantity)   | quote (notional)  |

use riskbank_core::{
    new_id, Amount, Asset, Destination, InstructionDirection, InstructionStatus, InstructionType,
    SettlementInstruction, TradeSide, TradingPair,
};

use crate::config::SettlementConfig;

/// Confirmations a fiat instruction needs (the bank's single ack)
pub const FIAT_REQUIRED_CONFIRMATIONS: u32 = 1;

pub struct InstructionPlanner<'a> {
    config: &'a SettlementConfig,
}

impl<'a> InstructionPlanner<'a> {
    pub fn new(config: &'a SettlementConfig) -> Self {
        Self { config }
    }

    pub fn plan(
        &self,
        trade_id: &str,
        pair: &TradingPair,
        side: TradeSide,
        quantity: Amount,
        notional: Amount,
    ) -> Vec<SettlementInstruction> {
        let (pay, receive) = match side {
            TradeSide::Buy => ((&pair.quote, notional), (&pair.base, quantity)),
            TradeSide::Sell => ((&pair.base, quantity), (&pair.quote, notional)),
        };
        vec![
            self.leg(trade_id, pay.0, pay.1, InstructionDirection::Pay),
            self.leg(trade_id, receive.0, receive.1, InstructionDirection::Receive),
        ]
    }

    fn leg(
        &self,
        trade_id: &str,
        asset: &Asset,
        amount: Amount,
        direction: InstructionDirection,
    ) -> SettlementInstruction {
        let (instruction_type, destination, required_confirmations) = if self.config.is_fiat(asset) {
            let bank = &self.config.bank;
            (
                InstructionType::Fiat,
                Destination::Bank {
                    bank_name: bank.bank_name.clone(),
                    account_number: bank.account_number.clone(),
                    swift_code: bank.swift_code.clone(),
                },
                FIAT_REQUIRED_CONFIRMATIONS,
            )
        } else {
            (
                InstructionType::Crypto,
                Destination::Wallet {
                    address: self.config.wallet_for(asset),
                },
                asset.required_confirmations(),
            )
        };

        SettlementInstruction {
            id: new_id("ins"),
            instruction_type,
            asset: asset.clone(),
            amount,
            direction,
            destination,
            reference: format!("{}-{}-{}", trade_id, direction, asset),
            status: InstructionStatus::Pending,
            transfer_ref: None,
            confirmations: 0,
            required_confirmations,
            failure_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn amounts() -> (Amount, Amount) {
        (Amount::new(dec!(1)).unwrap(), Amount::new(dec!(43250)).unwrap())
    }

    #[test]
    fn test_buy_pays_quote_receives_base() {
        let config = SettlementConfig::default();
        let pair: TradingPair = "BTC/USDT".parse().unwrap();
        let (qty, notional) = amounts();
        let legs = InstructionPlanner::new(&config).plan("T1", &pair, TradeSide::Buy, qty, notional);

        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].direction, InstructionDirection::Pay);
        assert_eq!(legs[0].asset, Asset::Usdt);
        assert_eq!(legs[0].amount.value(), dec!(43250));
        assert_eq!(legs[0].instruction_type, InstructionType::Crypto);
        assert_eq!(legs[0].required_confirmations, 12);
        assert_eq!(legs[0].reference, "T1-pay-USDT");

        assert_eq!(legs[1].direction, InstructionDirection::Receive);
        assert_eq!(legs[1].asset, Asset::Btc);
        assert_eq!(legs[1].amount.value(), dec!(1));
        assert_eq!(legs[1].required_confirmations, 6);
    }

    #[test]
    fn test_sell_and_fiat_quote() {
        let config = SettlementConfig::default();
        let pair: TradingPair = "ETH/EUR".parse().unwrap();
        let (qty, notional) = amounts();
        let legs = InstructionPlanner::new(&config).plan("T2", &pair, TradeSide::Sell, qty, notional);

        assert_eq!(legs[0].asset, Asset::Eth);
        assert_eq!(legs[0].direction, InstructionDirection::Pay);
        assert_eq!(legs[1].asset, Asset::Eur);
        assert_eq!(legs[1].instruction_type, InstructionType::Fiat);
        assert_eq!(legs[1].required_confirmations, FIAT_REQUIRED_CONFIRMATIONS);
        assert!(matches!(legs[1].destination, Destination::Bank { .. }));
    }

    #[test]
    fn test_usdt_routed_as_fiat_when_configured() {
        let mut config = SettlementConfig::default();
        config.fiat_assets.push("USDT".into());
        let pair: TradingPair = "BTC/USDT".parse().unwrap();
        let (qty, notional) = amounts();
        let legs = InstructionPlanner::new(&config).plan("T3", &pair, TradeSide::Buy, qty, notional);
        assert_eq!(legs[0].instruction_type, InstructionType::Fiat);
        assert_eq!(legs[1].instruction_type, InstructionType::Crypto);
    }
}
