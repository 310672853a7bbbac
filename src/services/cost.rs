//! Cost cell normalization into local currency

use chrono::NaiveDate;

use super::markers::detect_currency;
use super::rates::{RateProvider, RateResolver};
use crate::types::{round_cents, Cell, Currency, DefaultReason, Normalized};

/// Converts free-form cost cells to roubles at the row date's rate
pub struct CostNormalizer<P: RateProvider> {
    resolver: RateResolver<P>,
}

impl<P: RateProvider> CostNormalizer<P> {
    pub fn new(resolver: RateResolver<P>) -> Self {
        Self { resolver }
    }

    /// Normalize one cost cell.
    ///
    /// Text cells are trimmed, lowercased and read with either decimal
    /// separator. A `usdt` or `$` marker means dollars, anything else is lira.
    /// The converted amount is rounded to kopecks.
    pub fn normalize(&mut self, cell: &Cell, date: Option<NaiveDate>) -> Normalized {
        let Some(date) = date else {
            return Normalized::Defaulted(DefaultReason::MissingDate);
        };

        let (currency, amount) = match cell {
            Cell::Empty => return Normalized::Defaulted(DefaultReason::Empty),
            Cell::Number(n) => (Currency::Try, *n),
            Cell::Text(raw) => {
                let cleaned = raw.trim().to_lowercase().replace(',', ".");
                if cleaned.is_empty() {
                    return Normalized::Defaulted(DefaultReason::Empty);
                }
                if cleaned == "0" {
                    return Normalized::Parsed(0.0);
                }
                let (currency, amount_text) = detect_currency(&cleaned);
                match amount_text.parse::<f64>() {
                    Ok(amount) if amount.is_finite() => (currency, amount),
                    _ => return Normalized::Defaulted(DefaultReason::Unparseable(raw.clone())),
                }
            }
        };

        if amount == 0.0 {
            return Normalized::Parsed(0.0);
        }

        match self.resolver.lookup(currency.code(), date) {
            Some(rate) => {
                let converted = round_cents(amount * rate);
                if converted.is_finite() {
                    Normalized::Parsed(converted)
                } else {
                    tracing::warn!(%currency, amount, rate, "converted cost overflows, defaulting to 0");
                    Normalized::Defaulted(DefaultReason::Unparseable(cell.to_string()))
                }
            }
            None => Normalized::Defaulted(DefaultReason::RateUnavailable { currency, date }),
        }
    }

    pub fn resolver(&self) -> &RateResolver<P> {
        &self.resolver
    }
}
