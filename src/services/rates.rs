//! Exchange rate resolution against the Central Bank of Russia daily tables
//!
//! Rates are looked up for a (currency, date) pair. When the requested day
//! has no published table the resolver walks back one day at a time inside a
//! fixed window. Every table fetched in a run is kept in a [`RateCache`] so
//! each day is requested at most once.

use crate::types::{ProfitbookError, Result};
use chrono::{Days, NaiveDate};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// CBR daily rates endpoint
pub const CBR_DAILY_URL: &str = "https://www.cbr.ru/scripts/XML_daily.asp";

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default margin applied on top of the published rate (5%)
pub const DEFAULT_MARKUP: f64 = 1.05;

/// Days searched backwards from the requested date, including the date itself
pub const FALLBACK_DAYS: u32 = 7;

/// One entry of a day's published rate table
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedRate {
    pub code: String,
    /// Number of currency units the value is quoted for
    pub nominal: u32,
    /// Roubles per `nominal` units
    pub value: f64,
}

impl PublishedRate {
    pub fn per_unit(&self) -> f64 {
        self.value / f64::from(self.nominal)
    }
}

/// Source of daily published rate tables
pub trait RateProvider {
    /// Fetch the full table published for `date`
    fn fetch_day(&self, date: NaiveDate) -> Result<Vec<PublishedRate>>;
}

impl<P: RateProvider + ?Sized> RateProvider for &P {
    fn fetch_day(&self, date: NaiveDate) -> Result<Vec<PublishedRate>> {
        (**self).fetch_day(date)
    }
}

/// Blocking client for the CBR `XML_daily.asp` endpoint
pub struct CbrRateProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl CbrRateProvider {
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProfitbookError::Rate(format!("HTTP client error: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl RateProvider for CbrRateProvider {
    fn fetch_day(&self, date: NaiveDate) -> Result<Vec<PublishedRate>> {
        let url = format!("{}?date_req={}", self.base_url, date.format("%d/%m/%Y"));

        let response = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| ProfitbookError::Rate(format!("HTTP request failed: {}", e)))?;

        let body = response
            .bytes()
            .map_err(|e| ProfitbookError::Rate(format!("failed to read body: {}", e)))?;

        parse_daily_xml(&body)
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Code,
    Nominal,
    Value,
}

#[derive(Debug, Default)]
struct PartialRate {
    code: Option<String>,
    nominal: Option<String>,
    value: Option<String>,
}

impl PartialRate {
    fn finish(self) -> Option<PublishedRate> {
        let code = self.code?.trim().to_uppercase();
        let nominal: u32 = self.nominal?.trim().parse().ok()?;
        let value: f64 = self.value?.trim().replace(',', ".").parse().ok()?;
        if code.is_empty() || nominal == 0 || !value.is_finite() {
            return None;
        }
        Some(PublishedRate {
            code,
            nominal,
            value,
        })
    }
}

/// Parse a `<ValCurs>` document into its rate entries.
///
/// The provider serves windows-1251; only the ASCII `CharCode`, `Nominal`
/// and `Value` fields are decoded, so the localized names never need
/// transcoding. Entries with unusable numbers are skipped.
pub fn parse_daily_xml(xml: &[u8]) -> Result<Vec<PublishedRate>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut rates = Vec::new();
    let mut current: Option<PartialRate> = None;
    let mut field: Option<Field> = None;
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"ValCurs" => saw_root = true,
                b"Valute" => current = Some(PartialRate::default()),
                b"CharCode" => field = Some(Field::Code),
                b"Nominal" => field = Some(Field::Nominal),
                b"Value" => field = Some(Field::Value),
                _ => field = None,
            },
            Ok(Event::Empty(e)) => {
                if e.name().as_ref() == b"ValCurs" {
                    saw_root = true;
                }
            }
            Ok(Event::Text(text)) => {
                if let (Some(f), Some(partial)) = (field, current.as_mut()) {
                    let content = text
                        .unescape()
                        .map_err(|e| ProfitbookError::Parse(format!("invalid rate text: {}", e)))?
                        .into_owned();
                    match f {
                        Field::Code => partial.code = Some(content),
                        Field::Nominal => partial.nominal = Some(content),
                        Field::Value => partial.value = Some(content),
                    }
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"Valute" {
                    if let Some(partial) = current.take() {
                        match partial.finish() {
                            Some(rate) => rates.push(rate),
                            None => tracing::debug!("skipping malformed rate entry"),
                        }
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ProfitbookError::Parse(format!("malformed rate XML: {}", e)));
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(ProfitbookError::Parse("missing ValCurs root element".into()));
    }
    Ok(rates)
}

/// Markup-adjusted rates resolved during one run
///
/// Keys are (currency code, publication date). Entries are write-once.
#[derive(Debug, Default)]
pub struct RateCache {
    rates: HashMap<(String, NaiveDate), f64>,
    fetched_days: HashSet<NaiveDate>,
    failed_days: HashSet<NaiveDate>,
}

impl RateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, code: &str, date: NaiveDate) -> Option<f64> {
        self.rates.get(&(code.to_string(), date)).copied()
    }

    /// Insert a rate unless one is already cached for the key. Returns whether it was stored.
    pub fn insert(&mut self, code: &str, date: NaiveDate, rate: f64) -> bool {
        let key = (code.to_string(), date);
        if self.rates.contains_key(&key) {
            return false;
        }
        self.rates.insert(key, rate);
        true
    }

    /// Whether the table for `date` was already fetched successfully
    pub fn is_fetched(&self, date: NaiveDate) -> bool {
        self.fetched_days.contains(&date)
    }

    fn mark_fetched(&mut self, date: NaiveDate) {
        self.fetched_days.insert(date);
    }

    /// Whether fetching the table for `date` already failed in this run
    pub fn is_failed(&self, date: NaiveDate) -> bool {
        self.failed_days.contains(&date)
    }

    fn mark_failed(&mut self, date: NaiveDate) {
        self.failed_days.insert(date);
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Date-aware rate lookup with a backwards fallback window
pub struct RateResolver<P: RateProvider> {
    provider: P,
    cache: RateCache,
    markup: f64,
    window_days: u32,
}

impl<P: RateProvider> RateResolver<P> {
    pub fn new(provider: P, cache: RateCache, markup: f64) -> Self {
        Self {
            provider,
            cache,
            markup,
            window_days: FALLBACK_DAYS,
        }
    }

    /// Override the fallback window (number of days tried, including the requested one)
    pub fn with_window(mut self, window_days: u32) -> Self {
        self.window_days = window_days;
        self
    }

    /// Rate for `code` on `date`, or 0.0 when nothing is published inside the window
    pub fn resolve(&mut self, code: &str, date: NaiveDate) -> f64 {
        self.lookup(code, date).unwrap_or(0.0)
    }

    /// Rate for `code` on `date`, walking back up to the window size
    pub fn lookup(&mut self, code: &str, date: NaiveDate) -> Option<f64> {
        for offset in 0..self.window_days {
            let Some(candidate) = date.checked_sub_days(Days::new(u64::from(offset))) else {
                break;
            };

            if let Some(rate) = self.cache.get(code, candidate) {
                return Some(rate);
            }
            if self.cache.is_fetched(candidate) || self.cache.is_failed(candidate) {
                continue;
            }

            match self.provider.fetch_day(candidate) {
                Ok(table) => {
                    self.store_day(candidate, &table);
                    if let Some(rate) = self.cache.get(code, candidate) {
                        tracing::debug!(code, date = %candidate, rate, "resolved rate");
                        return Some(rate);
                    }
                }
                Err(e) => {
                    self.cache.mark_failed(candidate);
                    tracing::debug!(code, date = %candidate, error = %e, "rate fetch failed, trying previous day");
                }
            }
        }

        tracing::warn!(code, date = %date, window = self.window_days, "no published rate in fallback window");
        None
    }

    fn store_day(&mut self, date: NaiveDate, table: &[PublishedRate]) {
        for entry in table {
            self.cache.insert(&entry.code, date, entry.per_unit() * self.markup);
        }
        self.cache.mark_fetched(date);
    }

    pub fn cache(&self) -> &RateCache {
        &self.cache
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    /// Provider serving canned tables; days without a table fail
    #[derive(Default)]
    pub struct FakeProvider {
        days: HashMap<NaiveDate, Vec<PublishedRate>>,
        pub calls: RefCell<Vec<NaiveDate>>,
    }

    impl FakeProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_rate(mut self, date: NaiveDate, code: &str, nominal: u32, value: f64) -> Self {
            self.days.entry(date).or_default().push(PublishedRate {
                code: code.to_string(),
                nominal,
                value,
            });
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl RateProvider for FakeProvider {
        fn fetch_day(&self, date: NaiveDate) -> Result<Vec<PublishedRate>> {
            self.calls.borrow_mut().push(date);
            self.days
                .get(&date)
                .cloned()
                .ok_or_else(|| ProfitbookError::Rate(format!("no table for {}", date)))
        }
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }
}
