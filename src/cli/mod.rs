use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::services::{
    CbrRateProvider, CostNormalizer, Notifier, Pipeline, RateCache, RateResolver, ReportFormatter,
    TelegramNotifier,
};
use crate::store::CsvStore;

/// Daily net-profit report from the sales ledger
#[derive(Parser)]
#[command(name = "profitbook")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.profitbook/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute profit, write both sheets and send the report (default)
    Run {
        /// Skip the Telegram notification
        #[arg(long)]
        no_notify: bool,
    },

    /// Print the latest day's report without writing or sending anything
    Report {
        /// Output the whole summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve one exchange rate (markup included)
    Rate {
        /// Currency code, e.g. USD
        code: String,

        /// Date as YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let config = Config::load(self.config.as_deref())?;
        config.logging.init();

        match self.command.unwrap_or(Commands::Run { no_notify: false }) {
            Commands::Run { no_notify } => run_pipeline(&config, no_notify),
            Commands::Report { json } => print_report(&config, json),
            Commands::Rate { code, date } => print_rate(&config, &code, date),
        }
    }
}

fn resolver(config: &Config) -> anyhow::Result<RateResolver<CbrRateProvider>> {
    let provider = CbrRateProvider::with_base_url(&config.rates.url)?;
    Ok(
        RateResolver::new(provider, RateCache::new(), config.rates.markup)
            .with_window(config.rates.fallback_days),
    )
}

fn build_notifier(config: &Config, no_notify: bool) -> anyhow::Result<Option<TelegramNotifier>> {
    let telegram = &config.telegram;
    if no_notify || !telegram.enabled {
        return Ok(None);
    }
    if !telegram.is_usable() {
        tracing::warn!("telegram enabled but bot_token or chat_id is empty, skipping notification");
        return Ok(None);
    }
    Ok(Some(TelegramNotifier::new(
        &telegram.bot_token,
        &telegram.chat_id,
    )?))
}

fn run_pipeline(config: &Config, no_notify: bool) -> anyhow::Result<()> {
    let store = CsvStore::new(&config.store.root);
    let notifier = build_notifier(config, no_notify)?;
    let mut pipeline = Pipeline::new(config, &store, CostNormalizer::new(resolver(config)?));

    let report = pipeline.run(notifier.as_ref().map(|n| n as &dyn Notifier))?;

    if let Some(message) = &report.message {
        println!("{}", message);
    }
    if report.stats.unresolved_rates > 0 {
        eprintln!(
            "[profitbook] Warning: {} cost(s) had no exchange rate and were counted as zero",
            report.stats.unresolved_rates
        );
    }
    Ok(())
}

fn print_report(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = CsvStore::new(&config.store.root);
    let mut pipeline = Pipeline::new(config, &store, CostNormalizer::new(resolver(config)?));
    let computation = pipeline.compute()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&computation.summary)?);
        return Ok(());
    }

    match ReportFormatter::format_latest(&computation.summary) {
        Some(message) => println!("{}", message),
        None => println!("No dated rows in the ledger"),
    }
    Ok(())
}

fn print_rate(config: &Config, code: &str, date: Option<NaiveDate>) -> anyhow::Result<()> {
    let code = code.to_uppercase();
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let mut resolver = resolver(config)?;

    match resolver.lookup(&code, date) {
        Some(rate) => {
            println!("{} on {}: {:.4}", code, date, rate);
            Ok(())
        }
        None => anyhow::bail!(
            "no {} rate published in the {} days up to {}",
            code,
            config.rates.fallback_days,
            date
        ),
    }
}
