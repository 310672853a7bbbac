//! Revenue cell normalization

use super::markers::strip_marketplace_markers;
use crate::types::{Cell, DefaultReason, Normalized};

/// Parses revenue cells, which may carry a marketplace annotation ("1200 Авито")
pub struct RevenueNormalizer;

impl RevenueNormalizer {
    pub fn normalize(cell: &Cell) -> Normalized {
        match cell {
            Cell::Empty => Normalized::Defaulted(DefaultReason::Empty),
            Cell::Number(n) => Normalized::Parsed(*n),
            Cell::Text(raw) => {
                let stripped = strip_marketplace_markers(&raw.to_lowercase());
                if stripped.is_empty() {
                    return Normalized::Defaulted(DefaultReason::Empty);
                }
                match stripped.parse::<f64>() {
                    Ok(v) if v.is_finite() => Normalized::Parsed(v),
                    _ => Normalized::Defaulted(DefaultReason::Unparseable(raw.clone())),
                }
            }
        }
    }
}
