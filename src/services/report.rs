//! Message formatting for the daily profit notification.

use chrono::NaiveDate;

use super::markers::Marketplace;
use crate::types::DailyMarketplaceSummary;

/// Local currency symbol appended to every amount
const CURRENCY_SYMBOL: &str = "₽";

/// Renders summary rows as an HTML-markup message
pub struct ReportFormatter;

impl ReportFormatter {
    /// Latest dated day present in the summary
    pub fn latest_date(rows: &[DailyMarketplaceSummary]) -> Option<NaiveDate> {
        rows.iter().filter_map(|r| r.date).max()
    }

    /// Format the rows of `date`, one line per marketplace, under a bold header.
    pub fn format(rows: &[DailyMarketplaceSummary], date: NaiveDate) -> String {
        let mut lines = vec![format!("<b>📊 Отчёт за {}:</b>", date.format("%d.%m.%Y"))];

        for row in rows.iter().filter(|r| r.date == Some(date)) {
            let label = Marketplace::classify(&row.marketplace).report_label();
            lines.push(format!(
                "— {}: {} {}",
                label,
                format_amount(row.net_profit),
                CURRENCY_SYMBOL
            ));
        }

        lines.join("\n")
    }

    /// Format the latest day, or None when no row carries a date
    pub fn format_latest(rows: &[DailyMarketplaceSummary]) -> Option<String> {
        Self::latest_date(rows).map(|date| Self::format(rows, date))
    }
}

/// Two decimals with comma thousands separators: 13500 → "13,500.00"
pub fn format_amount(value: f64) -> String {
    let fixed = format!("{:.2}", value);
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    format!("{}{}.{}", sign, grouped, frac_part)
}
