//! Recognised currency and marketplace markers
//!
//! Ledger cells are free-form text: costs carry an optional currency marker
//! ("150 usdt", "$40") and revenues are sometimes annotated with the
//! marketplace name ("1200 Авито"). Classification goes through the tables
//! below rather than ad hoc substring checks.

use crate::types::Currency;

/// Markers that denominate a cost cell in dollars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencyMarker {
    /// Tether stablecoin ticker
    Usdt,
    Dollar,
}

impl CurrencyMarker {
    pub const ALL: [CurrencyMarker; 2] = [CurrencyMarker::Usdt, CurrencyMarker::Dollar];

    /// Lowercase token as it appears in a cleaned cell
    pub fn token(self) -> &'static str {
        match self {
            CurrencyMarker::Usdt => "usdt",
            CurrencyMarker::Dollar => "$",
        }
    }

    pub fn currency(self) -> Currency {
        match self {
            CurrencyMarker::Usdt | CurrencyMarker::Dollar => Currency::Usd,
        }
    }
}

/// Split a cleaned (trimmed, lowercased) cost string into its currency and amount text.
///
/// Cells without a marker are lira amounts.
///
/// # Examples
/// ```
/// use profitbook::services::markers::detect_currency;
/// use profitbook::types::Currency;
///
/// assert_eq!(detect_currency("150 usdt"), (Currency::Usd, "150".to_string()));
/// assert_eq!(detect_currency("2500"), (Currency::Try, "2500".to_string()));
/// ```
pub fn detect_currency(cleaned: &str) -> (Currency, String) {
    let Some(marker) = CurrencyMarker::ALL
        .into_iter()
        .find(|m| cleaned.contains(m.token()))
    else {
        return (Currency::Try, cleaned.trim().to_string());
    };

    let mut amount = cleaned.to_string();
    for m in CurrencyMarker::ALL {
        amount = amount.replace(m.token(), "");
    }
    (marker.currency(), amount.trim().to_string())
}

/// Sales channels known to the report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marketplace {
    Avito,
    Telegram,
}

impl Marketplace {
    /// Lowercase substrings identifying this marketplace in labels and revenue cells
    pub fn identifiers(self) -> &'static [&'static str] {
        match self {
            Marketplace::Avito => &["avito", "авито"],
            Marketplace::Telegram => &["telegram"],
        }
    }

    /// Line label in the daily report
    pub fn report_label(self) -> &'static str {
        match self {
            Marketplace::Avito => "Выручка Авито",
            Marketplace::Telegram => "Прибыль Telegram",
        }
    }

    /// Classify a marketplace label (case-insensitive); anything not Avito reports as Telegram.
    pub fn classify(label: &str) -> Self {
        let lowered = label.to_lowercase();
        if Marketplace::Avito
            .identifiers()
            .iter()
            .any(|id| lowered.contains(id))
        {
            Marketplace::Avito
        } else {
            Marketplace::Telegram
        }
    }
}

/// Remove Avito annotations from a lowercased revenue cell.
pub fn strip_marketplace_markers(lowered: &str) -> String {
    let mut stripped = lowered.to_string();
    for id in Marketplace::Avito.identifiers() {
        stripped = stripped.replace(id, "");
    }
    stripped.trim().to_string()
}
