//! Report pipeline: ledger in, profit tables and notification out
//!
//! Steps run strictly in sequence on one thread:
//! read ledger → normalize costs and revenues → aggregate →
//! write summary and detail sheets → notify.
//!
//! Row-level problems never abort a run; they default to zero and are
//! counted in [`NormalizationStats`]. Store errors propagate.

use chrono::NaiveDate;

use super::aggregator::Aggregator;
use super::cost::CostNormalizer;
use super::notifier::Notifier;
use super::rates::RateProvider;
use super::report::ReportFormatter;
use super::revenue::RevenueNormalizer;
use crate::config::{ColumnConfig, Config};
use crate::store::TableStore;
use crate::types::{
    Cell, DailyMarketplaceSummary, DefaultReason, LedgerRecord, Normalized, ProfitRow, Result,
    Table,
};

/// Ledger date format (`31.01.24`)
const LEDGER_DATE_FORMAT: &str = "%d.%m.%y";

/// Date format written to the output sheets
const OUTPUT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Counters for cells that fell back to zero
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationStats {
    pub rows: usize,
    pub defaulted_costs: usize,
    pub defaulted_revenues: usize,
    /// Costs zeroed because no rate was published inside the fallback window
    pub unresolved_rates: usize,
}

/// Normalized ledger, ready to persist
#[derive(Debug, Clone)]
pub struct Computation {
    /// Source table with cleaned and computed columns
    pub detail: Table,
    pub rows: Vec<ProfitRow>,
    pub summary: Vec<DailyMarketplaceSummary>,
    pub stats: NormalizationStats,
}

/// Outcome of a full run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub stats: NormalizationStats,
    pub summary: Vec<DailyMarketplaceSummary>,
    pub message: Option<String>,
    pub notified: bool,
}

pub struct Pipeline<'a, P: RateProvider> {
    config: &'a Config,
    store: &'a dyn TableStore,
    costs: CostNormalizer<P>,
}

impl<'a, P: RateProvider> Pipeline<'a, P> {
    pub fn new(config: &'a Config, store: &'a dyn TableStore, costs: CostNormalizer<P>) -> Self {
        Self {
            config,
            store,
            costs,
        }
    }

    /// Read and normalize the ledger, then aggregate. Writes nothing.
    pub fn compute(&mut self) -> Result<Computation> {
        let source = &self.config.source;
        let columns = &self.config.columns;

        let table = self.store.read_sheet(&source.spreadsheet, &source.sheet)?;
        tracing::info!(
            spreadsheet = %source.spreadsheet,
            sheet = %source.sheet,
            rows = table.len(),
            "read ledger"
        );

        let records = read_records(&table, columns)?;

        let mut stats = NormalizationStats {
            rows: records.len(),
            ..Default::default()
        };
        let mut rows = Vec::with_capacity(records.len());

        for (i, record) in records.iter().enumerate() {
            let cost = self.costs.normalize(&record.cost, record.date);
            let revenue = RevenueNormalizer::normalize(&record.revenue);

            if let Normalized::Defaulted(reason) = &cost {
                if !matches!(reason, DefaultReason::Empty) {
                    stats.defaulted_costs += 1;
                    tracing::debug!(row = i + 2, ?reason, "cost defaulted to zero");
                }
                if matches!(reason, DefaultReason::RateUnavailable { .. }) {
                    stats.unresolved_rates += 1;
                }
            }
            if let Normalized::Defaulted(reason) = &revenue {
                if !matches!(reason, DefaultReason::Empty) {
                    stats.defaulted_revenues += 1;
                    tracing::debug!(row = i + 2, ?reason, "revenue defaulted to zero");
                }
            }

            rows.push(ProfitRow::new(
                record.date,
                record.marketplace.clone(),
                revenue.value(),
                cost.value(),
            ));
        }

        if stats.unresolved_rates > 0 {
            tracing::warn!(
                count = stats.unresolved_rates,
                "costs zeroed for lack of an exchange rate; profit is overstated for these rows"
            );
        }
        tracing::info!(
            rows = stats.rows,
            defaulted_costs = stats.defaulted_costs,
            defaulted_revenues = stats.defaulted_revenues,
            cached_rates = self.costs.resolver().cache().len(),
            "normalized ledger"
        );

        let detail = build_detail(table, columns, &rows)?;
        let summary = Aggregator::aggregate(&rows);

        Ok(Computation {
            detail,
            rows,
            summary,
            stats,
        })
    }

    /// Full run: compute, persist both tables, then notify if a notifier is given.
    pub fn run(&mut self, notifier: Option<&dyn Notifier>) -> Result<RunReport> {
        let computation = self.compute()?;
        let target = &self.config.target;

        let summary_table = summary_table(&computation.summary, &self.config.columns);
        self.store
            .replace_sheet(&target.spreadsheet, &target.summary_sheet, &summary_table)?;
        self.store
            .overwrite_sheet(&target.spreadsheet, &target.sheet, &computation.detail)?;
        tracing::info!(
            spreadsheet = %target.spreadsheet,
            detail_rows = computation.detail.len(),
            summary_rows = summary_table.len(),
            "wrote profit sheets"
        );

        let message = ReportFormatter::format_latest(&computation.summary);
        let notified = match (&message, notifier) {
            (Some(text), Some(notifier)) => match notifier.send(text) {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(error = %e, "failed to send report notification");
                    false
                }
            },
            (None, Some(_)) => {
                tracing::warn!("no dated rows in summary, nothing to notify");
                false
            }
            (_, None) => {
                tracing::info!("notification disabled");
                false
            }
        };

        Ok(RunReport {
            stats: computation.stats,
            summary: computation.summary,
            message,
            notified,
        })
    }
}

/// Parse a ledger date cell (`DD.MM.YY`)
pub fn parse_ledger_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Text(s) => NaiveDate::parse_from_str(s.trim(), LEDGER_DATE_FORMAT).ok(),
        Cell::Empty | Cell::Number(_) => None,
    }
}

fn read_records(table: &Table, columns: &ColumnConfig) -> Result<Vec<LedgerRecord>> {
    let date_col = table.require_column(&columns.date)?;
    let marketplace_col = table.require_column(&columns.marketplace)?;
    let revenue_col = table.require_column(&columns.revenue)?;
    let cost_col = table.column(&columns.cost);
    if cost_col.is_none() {
        tracing::warn!(column = %columns.cost, "cost column missing, costs read as empty");
    }

    Ok((0..table.len())
        .map(|i| LedgerRecord {
            date: parse_ledger_date(table.cell(i, date_col)),
            marketplace: table.cell(i, marketplace_col).to_string(),
            revenue: table.cell(i, revenue_col).clone(),
            cost: cost_col
                .map(|c| table.cell(i, c).clone())
                .unwrap_or(Cell::Empty),
        })
        .collect())
}

/// Source table with the revenue column cleaned, dates reformatted and
/// cost/net-profit columns appended. Unparseable dates become empty cells.
fn build_detail(mut table: Table, columns: &ColumnConfig, rows: &[ProfitRow]) -> Result<Table> {
    let date_col = table.require_column(&columns.date)?;
    let revenue_col = table.require_column(&columns.revenue)?;
    let cost_local_col = table.ensure_column(&columns.cost_local);
    let net_col = table.ensure_column(&columns.net_profit);

    for (i, row) in rows.iter().enumerate() {
        table.set(i, date_col, date_cell(row.date));
        table.set(i, revenue_col, Cell::Number(row.revenue));
        table.set(i, cost_local_col, Cell::Number(row.cost));
        table.set(i, net_col, Cell::Number(row.net_profit));
    }

    Ok(table)
}

fn summary_table(summary: &[DailyMarketplaceSummary], columns: &ColumnConfig) -> Table {
    let mut table = Table::new([
        columns.date.as_str(),
        columns.marketplace.as_str(),
        columns.net_profit.as_str(),
    ]);
    for row in summary {
        table.push_row(vec![
            date_cell(row.date),
            Cell::Text(row.marketplace.clone()),
            Cell::Number(row.net_profit),
        ]);
    }
    table
}

fn date_cell(date: Option<NaiveDate>) -> Cell {
    date.map(|d| Cell::Text(d.format(OUTPUT_DATE_FORMAT).to_string()))
        .unwrap_or(Cell::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rates::testing::{date, FakeProvider};
    use crate::services::rates::{RateCache, RateResolver};
    use crate::store::CsvStore;
    use crate::types::ProfitbookError;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;

    const LEDGER: &str = "\
Дата,Площадка,\"Выручка, руб\",\"Себестоимость, TL\",Комментарий
01.01.24,Avito,1200 Авито,100,first
01.01.24,Avito,800,\"10 usdt\",
01.01.24,Telegram,500,0,
02.01.24,Telegram,300,\"50,5\",
02.01.24,,999,,no marketplace
bad-date,Avito,100,100,
";

    #[derive(Default)]
    struct RecordingNotifier {
        sent: RefCell<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn send(&self, message: &str) -> Result<()> {
            self.sent.borrow_mut().push(message.to_string());
            Ok(())
        }
    }

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn send(&self, _message: &str) -> Result<()> {
            Err(ProfitbookError::Notify("chat not found".into()))
        }
    }

    fn setup(ledger: &str) -> (Config, CsvStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let config = Config::default();
        let source_dir = temp.path().join(&config.source.spreadsheet);
        let target_dir = temp.path().join(&config.target.spreadsheet);
        fs::create_dir_all(&source_dir).unwrap();
        fs::create_dir_all(&target_dir).unwrap();
        fs::write(source_dir.join(format!("{}.csv", config.source.sheet)), ledger).unwrap();
        fs::write(target_dir.join(format!("{}.csv", config.target.sheet)), "old\n").unwrap();
        (config, CsvStore::new(temp.path()), temp)
    }

    fn provider() -> FakeProvider {
        // markup 1.0 in tests: TRY = 3.0, USD = 90.0
        FakeProvider::new()
            .with_rate(date(2024, 1, 1), "USD", 1, 90.0)
            .with_rate(date(2024, 1, 1), "TRY", 10, 30.0)
            .with_rate(date(2024, 1, 2), "TRY", 10, 30.0)
    }

    fn costs(provider: &FakeProvider) -> CostNormalizer<&FakeProvider> {
        CostNormalizer::new(RateResolver::new(provider, RateCache::new(), 1.0))
    }

    // ========== compute ==========

    #[test]
    fn test_compute_profit_rows() {
        let (config, store, _temp) = setup(LEDGER);
        let provider = provider();
        let mut pipeline = Pipeline::new(&config, &store, costs(&provider));

        let result = pipeline.compute().unwrap();

        assert_eq!(result.rows.len(), 6);
        // 1200 - 100 TRY * 3.0
        assert!((result.rows[0].net_profit - 900.0).abs() < 1e-9);
        // 800 - 10 USD * 90
        assert!((result.rows[1].net_profit - -100.0).abs() < 1e-9);
        // 300 - 50.5 TRY * 3.0
        assert!((result.rows[3].cost - 151.5).abs() < 1e-9);
        // bad date: cost defaults to zero, revenue kept
        assert!(result.rows[5].date.is_none());
        assert!((result.rows[5].net_profit - 100.0).abs() < 1e-9);
        assert_eq!(result.stats.defaulted_costs, 1);
        assert_eq!(result.stats.unresolved_rates, 0);
    }

    #[test]
    fn test_compute_summary() {
        let (config, store, _temp) = setup(LEDGER);
        let provider = provider();
        let mut pipeline = Pipeline::new(&config, &store, costs(&provider));

        let summary = pipeline.compute().unwrap().summary;

        let rendered: Vec<(Option<String>, &str, f64)> = summary
            .iter()
            .map(|s| (s.date.map(|d| d.to_string()), s.marketplace.as_str(), s.net_profit))
            .collect();
        assert_eq!(
            rendered,
            vec![
                (None, "Avito", 100.0),
                (Some("2024-01-01".into()), "Avito", 800.0),
                (Some("2024-01-01".into()), "Telegram", 500.0),
                (Some("2024-01-02".into()), "Telegram", 148.5),
            ]
        );
    }

    #[test]
    fn test_compute_detail_table() {
        let (config, store, _temp) = setup(LEDGER);
        let provider = provider();
        let mut pipeline = Pipeline::new(&config, &store, costs(&provider));

        let detail = pipeline.compute().unwrap().detail;

        assert_eq!(
            detail.headers,
            vec![
                "Дата",
                "Площадка",
                "Выручка, руб",
                "Себестоимость, TL",
                "Комментарий",
                "Себестоимость, руб",
                "Чистая прибыль"
            ]
        );
        assert_eq!(detail.cell(0, 0), &Cell::Text("2024-01-01".into()));
        assert_eq!(detail.cell(0, 2), &Cell::Number(1200.0));
        assert_eq!(detail.cell(0, 5), &Cell::Number(300.0));
        assert_eq!(detail.cell(0, 6), &Cell::Number(900.0));
        assert_eq!(detail.cell(1, 3), &Cell::Text("10 usdt".into()));
        assert_eq!(detail.cell(5, 0), &Cell::Empty);
        assert_eq!(detail.cell(2, 4), &Cell::Empty);
    }

    #[test]
    fn test_compute_missing_required_column_fails() {
        let (config, store, _temp) = setup("Дата,Площадка\n01.01.24,Avito\n");
        let provider = provider();
        let mut pipeline = Pipeline::new(&config, &store, costs(&provider));

        let err = pipeline.compute().unwrap_err();

        assert!(err.to_string().contains("Выручка, руб"));
    }

    #[test]
    fn test_compute_missing_cost_column_reads_empty() {
        let (config, store, _temp) = setup("Дата,Площадка,\"Выручка, руб\"\n01.01.24,Avito,50\n");
        let provider = provider();
        let mut pipeline = Pipeline::new(&config, &store, costs(&provider));

        let result = pipeline.compute().unwrap();

        assert!((result.summary[0].net_profit - 50.0).abs() < f64::EPSILON);
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn test_unresolved_rates_counted() {
        let (config, store, _temp) = setup(LEDGER);
        let provider = FakeProvider::new();
        let mut pipeline = Pipeline::new(&config, &store, costs(&provider));

        let stats = pipeline.compute().unwrap().stats;

        assert_eq!(stats.unresolved_rates, 3);
        assert_eq!(stats.defaulted_costs, 4);
    }

    #[test]
    fn test_parse_ledger_date() {
        assert_eq!(
            parse_ledger_date(&Cell::from("31.01.24")),
            Some(date(2024, 1, 31))
        );
        assert_eq!(parse_ledger_date(&Cell::from("31/01/2024")), None);
        assert_eq!(parse_ledger_date(&Cell::from("30.02.24")), None);
        assert_eq!(parse_ledger_date(&Cell::Empty), None);
    }

    // ========== run ==========

    #[test]
    fn test_run_writes_sheets_and_notifies() {
        let (config, store, temp) = setup(LEDGER);
        let provider = provider();
        let notifier = RecordingNotifier::default();
        let mut pipeline = Pipeline::new(&config, &store, costs(&provider));

        let report = pipeline.run(Some(&notifier)).unwrap();

        assert!(report.notified);
        let sent = notifier.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            "<b>📊 Отчёт за 02.01.2024:</b>\n— Прибыль Telegram: 148.50 ₽"
        );

        let target_dir = temp.path().join(&config.target.spreadsheet);
        let summary = fs::read_to_string(target_dir.join("Прибыль по площадкам.csv")).unwrap();
        assert_eq!(
            summary,
            "Дата,Площадка,Чистая прибыль\n\
             ,Avito,100\n\
             2024-01-01,Avito,800\n\
             2024-01-01,Telegram,500\n\
             2024-01-02,Telegram,148.5\n"
        );
        let detail = fs::read_to_string(target_dir.join("Лист1.csv")).unwrap();
        assert!(detail.starts_with("Дата,Площадка,\"Выручка, руб\""));
        assert_eq!(detail.lines().count(), 7);
    }

    #[test]
    fn test_run_is_repeatable() {
        let (config, store, temp) = setup(LEDGER);
        let provider = provider();
        let summary_path = temp
            .path()
            .join(&config.target.spreadsheet)
            .join("Прибыль по площадкам.csv");

        Pipeline::new(&config, &store, costs(&provider)).run(None).unwrap();
        let first = fs::read(&summary_path).unwrap();
        Pipeline::new(&config, &store, costs(&provider)).run(None).unwrap();
        let second = fs::read(&summary_path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_run_survives_notification_failure() {
        let (config, store, _temp) = setup(LEDGER);
        let provider = provider();
        let mut pipeline = Pipeline::new(&config, &store, costs(&provider));

        let report = pipeline.run(Some(&FailingNotifier)).unwrap();

        assert!(!report.notified);
        assert!(report.message.is_some());
    }

    #[test]
    fn test_run_missing_target_sheet_fails() {
        let (config, store, temp) = setup(LEDGER);
        fs::remove_file(
            temp.path()
                .join(&config.target.spreadsheet)
                .join(format!("{}.csv", config.target.sheet)),
        )
        .unwrap();
        let provider = provider();
        let notifier = RecordingNotifier::default();
        let mut pipeline = Pipeline::new(&config, &store, costs(&provider));

        assert!(pipeline.run(Some(&notifier)).is_err());
        assert!(notifier.sent.borrow().is_empty());
    }
}
