//! Business-day arithmetic for settlement dates. Weekends only; no
//! holiday calendar.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use riskbank_core::SettlementType;

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// `date` moved forward by `n` business days
pub fn add_business_days(date: NaiveDate, n: u32) -> NaiveDate {
    let mut current = date;
    let mut remaining = n;
    while remaining > 0 {
        match current.checked_add_days(Days::new(1)) {
            Some(next) => current = next,
            None => break,
        }
        if is_business_day(current) {
            remaining -= 1;
        }
    }
    current
}

/// Settlement (and value) date for a trade executed on `trade_date`
pub fn settlement_date(trade_date: NaiveDate, settlement_type: SettlementType) -> NaiveDate {
    match settlement_type {
        SettlementType::T0 => trade_date,
        SettlementType::T1 => add_business_days(trade_date, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_t1_midweek() {
        // Wednesday -> Thursday
        assert_eq!(settlement_date(date(2024, 1, 10), SettlementType::T1), date(2024, 1, 11));
    }

    #[test]
    fn test_t1_skips_weekend() {
        // Friday -> Monday
        assert_eq!(settlement_date(date(2024, 1, 12), SettlementType::T1), date(2024, 1, 15));
        // Saturday -> Monday
        assert_eq!(add_business_days(date(2024, 1, 13), 1), date(2024, 1, 15));
    }

    #[test]
    fn test_t0_same_day() {
        let d = date(2024, 1, 13);
        assert_eq!(settlement_date(d, SettlementType::T0), d);
        assert!(!is_business_day(d));
    }
}
