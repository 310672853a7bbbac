//! Aggregator service for per-day, per-marketplace profit

use crate::types::{round_cents, DailyMarketplaceSummary, ProfitRow};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Aggregator for computing the profit summary
pub struct Aggregator;

impl Aggregator {
    /// Sum net profit by (date, marketplace), sorted by date then marketplace.
    ///
    /// Rows without a marketplace label are dropped. Rows with no date are
    /// kept under an empty date and sort first.
    pub fn aggregate(rows: &[ProfitRow]) -> Vec<DailyMarketplaceSummary> {
        let mut groups: BTreeMap<(Option<NaiveDate>, &str), f64> = BTreeMap::new();

        for row in rows {
            if row.marketplace.trim().is_empty() {
                continue;
            }
            *groups
                .entry((row.date, row.marketplace.as_str()))
                .or_insert(0.0) += row.net_profit;
        }

        groups
            .into_iter()
            .map(|((date, marketplace), total)| DailyMarketplaceSummary {
                date,
                marketplace: marketplace.to_string(),
                net_profit: round_cents(total),
            })
            .collect()
    }
}
