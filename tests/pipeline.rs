//! End-to-end run over a CSV store with canned CBR responses

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;

use chrono::NaiveDate;
use profitbook::config::Config;
use profitbook::services::rates::{parse_daily_xml, PublishedRate};
use profitbook::services::{
    CostNormalizer, Notifier, Pipeline, RateCache, RateProvider, RateResolver,
};
use profitbook::store::CsvStore;
use profitbook::types::{ProfitbookError, Result};
use tempfile::TempDir;

/// Serves XML documents per day, like the CBR endpoint would
struct XmlProvider {
    documents: HashMap<NaiveDate, String>,
    requests: RefCell<Vec<NaiveDate>>,
}

impl RateProvider for XmlProvider {
    fn fetch_day(&self, date: NaiveDate) -> Result<Vec<PublishedRate>> {
        self.requests.borrow_mut().push(date);
        let doc = self
            .documents
            .get(&date)
            .ok_or_else(|| ProfitbookError::Rate("HTTP request failed: 503".into()))?;
        parse_daily_xml(doc.as_bytes())
    }
}

#[derive(Default)]
struct Outbox {
    messages: RefCell<Vec<String>>,
}

impl Notifier for Outbox {
    fn send(&self, message: &str) -> Result<()> {
        self.messages.borrow_mut().push(message.to_string());
        Ok(())
    }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn cbr_document(usd: &str, try_per_10: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"windows-1251\"?>\
         <ValCurs Date=\"01.03.2024\" name=\"Foreign Currency Market\">\
         <Valute ID=\"R01235\"><NumCode>840</NumCode><CharCode>USD</CharCode>\
         <Nominal>1</Nominal><Name>Dollar</Name><Value>{}</Value></Valute>\
         <Valute ID=\"R01700J\"><NumCode>949</NumCode><CharCode>TRY</CharCode>\
         <Nominal>10</Nominal><Name>Lira</Name><Value>{}</Value></Valute>\
         </ValCurs>",
        usd, try_per_10
    )
}

#[test]
fn test_full_run_with_weekend_fallback() {
    let temp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.store.root = temp.path().to_path_buf();

    let source_dir = temp.path().join(&config.source.spreadsheet);
    let target_dir = temp.path().join(&config.target.spreadsheet);
    fs::create_dir_all(&source_dir).unwrap();
    fs::create_dir_all(&target_dir).unwrap();
    fs::write(
        source_dir.join("Выручка.csv"),
        "Дата,Площадка,\"Выручка, руб\",\"Себестоимость, TL\"\n\
         01.03.24,Avito,\"15000 Авито\",\"100 usdt\"\n\
         03.03.24,Avito,20000,\"1000\"\n\
         03.03.24,Telegram,5000,\"$20\"\n\
         03.03.24,Telegram,oops,\n",
    )
    .unwrap();
    fs::write(target_dir.join("Лист1.csv"), "stale\n").unwrap();

    // Friday 1 March publishes; the weekend does not
    let mut documents = HashMap::new();
    documents.insert(day(2024, 3, 1), cbr_document("90,0000", "28,0000"));
    let provider = XmlProvider {
        documents,
        requests: RefCell::new(Vec::new()),
    };

    let resolver = RateResolver::new(&provider, RateCache::new(), 1.05);
    let store = CsvStore::new(temp.path());
    let outbox = Outbox::default();
    let mut pipeline = Pipeline::new(&config, &store, CostNormalizer::new(resolver));

    let report = pipeline.run(Some(&outbox)).unwrap();

    // USD = 94.5, TRY = 2.94 after markup
    // 01.03 Avito: 15000 - 100 * 94.5 = 5550
    // 03.03 Avito: 20000 - 1000 * 2.94 = 17060
    // 03.03 Telegram: 5000 - 20 * 94.5 + 0 = 3110
    let totals: Vec<(String, f64)> = report
        .summary
        .iter()
        .map(|s| (s.marketplace.clone(), s.net_profit))
        .collect();
    assert_eq!(
        totals,
        vec![
            ("Avito".to_string(), 5550.0),
            ("Avito".to_string(), 17060.0),
            ("Telegram".to_string(), 3110.0),
        ]
    );

    assert_eq!(report.stats.rows, 4);
    assert_eq!(report.stats.defaulted_revenues, 1);
    assert_eq!(report.stats.unresolved_rates, 0);
    assert!(report.notified);

    // Each day is requested at most once, failed weekend days included
    assert_eq!(
        *provider.requests.borrow(),
        vec![day(2024, 3, 1), day(2024, 3, 3), day(2024, 3, 2)]
    );

    let messages = outbox.messages.borrow();
    assert_eq!(
        messages[0],
        "<b>📊 Отчёт за 03.03.2024:</b>\n\
         — Выручка Авито: 17,060.00 ₽\n\
         — Прибыль Telegram: 3,110.00 ₽"
    );

    let summary_csv = fs::read_to_string(target_dir.join("Прибыль по площадкам.csv")).unwrap();
    assert_eq!(
        summary_csv,
        "Дата,Площадка,Чистая прибыль\n\
         2024-03-01,Avito,5550\n\
         2024-03-03,Avito,17060\n\
         2024-03-03,Telegram,3110\n"
    );

    let detail_csv = fs::read_to_string(target_dir.join("Лист1.csv")).unwrap();
    let header = detail_csv.lines().next().unwrap();
    assert_eq!(
        header,
        "Дата,Площадка,\"Выручка, руб\",\"Себестоимость, TL\",\"Себестоимость, руб\",Чистая прибыль"
    );
    assert!(detail_csv.contains("2024-03-01,Avito,15000,100 usdt,9450,5550"));
}
