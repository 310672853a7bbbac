//! Ledger and profit types

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use super::Cell;

/// Foreign currencies a cost cell can be denominated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Currency {
    /// US dollar, also used for dollar stablecoins
    Usd,
    /// Turkish lira, the default cost currency
    Try,
}

impl Currency {
    /// ISO code as published by the rate provider
    pub fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Try => "TRY",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One source row as read from the ledger sheet
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRecord {
    /// None when the date cell is missing or not `DD.MM.YY`
    pub date: Option<NaiveDate>,
    pub marketplace: String,
    pub revenue: Cell,
    pub cost: Cell,
}

/// Why a cost or revenue cell resolved to zero instead of a parsed amount
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultReason {
    /// Cell was blank
    Empty,
    /// Row has no valid date, so no rate can be looked up
    MissingDate,
    /// Cell text is not a number once markers are stripped
    Unparseable(String),
    /// No published rate inside the fallback window
    RateUnavailable { currency: Currency, date: NaiveDate },
}

/// Outcome of normalizing a free-form amount cell
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Parsed(f64),
    Defaulted(DefaultReason),
}

impl Normalized {
    /// Numeric value; defaulted cells count as zero
    pub fn value(&self) -> f64 {
        match self {
            Normalized::Parsed(v) => *v,
            Normalized::Defaulted(_) => 0.0,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, Normalized::Defaulted(_))
    }
}

/// Per-row profit in local currency
#[derive(Debug, Clone, PartialEq)]
pub struct ProfitRow {
    pub date: Option<NaiveDate>,
    pub marketplace: String,
    pub revenue: f64,
    pub cost: f64,
    pub net_profit: f64,
}

impl ProfitRow {
    pub fn new(date: Option<NaiveDate>, marketplace: impl Into<String>, revenue: f64, cost: f64) -> Self {
        Self {
            date,
            marketplace: marketplace.into(),
            revenue,
            cost,
            net_profit: revenue - cost,
        }
    }
}

/// Net profit summed per (date, marketplace)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyMarketplaceSummary {
    /// None for rows whose source date did not parse
    pub date: Option<NaiveDate>,
    pub marketplace: String,
    pub net_profit: f64,
}

/// Round to whole kopecks (2 decimal places)
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_codes() {
        assert_eq!(Currency::Usd.code(), "USD");
        assert_eq!(Currency::Try.to_string(), "TRY");
    }

    #[test]
    fn test_normalized_value_defaults_to_zero() {
        assert!((Normalized::Parsed(12.5).value() - 12.5).abs() < f64::EPSILON);
        let defaulted = Normalized::Defaulted(DefaultReason::Empty);
        assert!(defaulted.is_defaulted());
        assert!((defaulted.value() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_profit_row_net_profit() {
        let row = ProfitRow::new(None, "Avito", 1200.0, 450.5);
        assert!((row.net_profit - 749.5).abs() < 1e-9);
    }

    #[test]
    fn test_round_cents() {
        assert!((round_cents(13499.999) - 13500.0).abs() < f64::EPSILON);
        assert!((round_cents(2.344) - 2.34).abs() < f64::EPSILON);
        assert!((round_cents(-7.126) - -7.13).abs() < f64::EPSILON);
    }
}
