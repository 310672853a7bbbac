//! Configuration loading and logging initialization.
//!
//! Every field has a default, so a missing config file yields the built-in
//! setup. The file is TOML:
//!
//! ```toml
//! [source]
//! spreadsheet = "отчет_заказы"
//! sheet = "Выручка"
//!
//! [rates]
//! markup = 1.05
//!
//! [telegram]
//! enabled = true
//! bot_token = "123456:ABC"
//! chat_id = "1000000"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::services::rates::{CBR_DAILY_URL, DEFAULT_MARKUP, FALLBACK_DAYS};
use crate::types::{ProfitbookError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub source: SourceConfig,
    pub target: TargetConfig,
    pub columns: ColumnConfig,
    pub rates: RatesConfig,
    pub telegram: TelegramConfig,
    pub logging: LoggingConfig,
}

/// Where the CSV store keeps its spreadsheets
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("sheets"),
        }
    }
}

/// Ledger sheet to read
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub spreadsheet: String,
    pub sheet: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            spreadsheet: "отчет_заказы".into(),
            sheet: "Выручка".into(),
        }
    }
}

/// Sheets the detail and summary tables are written to
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub spreadsheet: String,
    /// Existing sheet overwritten with the detail table
    pub sheet: String,
    /// Sheet recreated with the per-marketplace summary
    pub summary_sheet: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            spreadsheet: "profit".into(),
            sheet: "Лист1".into(),
            summary_sheet: "Прибыль по площадкам".into(),
        }
    }
}

/// Column headers in the ledger and the computed tables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub date: String,
    pub marketplace: String,
    pub revenue: String,
    /// Raw cost, lira or dollars
    pub cost: String,
    /// Computed cost in roubles
    pub cost_local: String,
    pub net_profit: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            date: "Дата".into(),
            marketplace: "Площадка".into(),
            revenue: "Выручка, руб".into(),
            cost: "Себестоимость, TL".into(),
            cost_local: "Себестоимость, руб".into(),
            net_profit: "Чистая прибыль".into(),
        }
    }
}

/// Exchange rate lookup settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    /// Multiplier applied to published rates
    pub markup: f64,
    /// Days searched backwards, including the row date
    pub fallback_days: u32,
    pub url: String,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            markup: DEFAULT_MARKUP,
            fallback_days: FALLBACK_DAYS,
            url: CBR_DAILY_URL.into(),
        }
    }
}

/// Telegram notification settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub enabled: bool,
    pub bot_token: String,
    pub chat_id: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bot_token: String::new(),
            chat_id: String::new(),
        }
    }
}

impl TelegramConfig {
    /// Enabled and carrying credentials
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    /// Initialize the tracing subscriber. `RUST_LOG` overrides `level`.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        let result = match self.format.as_str() {
            "json" => fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init(),
            _ => fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init(),
        };
        if let Err(e) = result {
            eprintln!("[profitbook] Warning: logging already initialized: {}", e);
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when None.
    ///
    /// An explicit path must exist; a missing default file yields the built-in configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path()?, false),
        };

        if !path.exists() {
            if explicit {
                return Err(ProfitbookError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ProfitbookError::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Default config path (~/.profitbook/config.toml)
    pub fn default_path() -> Result<PathBuf> {
        let home = directories::UserDirs::new()
            .ok_or_else(|| ProfitbookError::Config("Failed to get home directory".into()))?
            .home_dir()
            .to_path_buf();
        Ok(home.join(".profitbook").join("config.toml"))
    }

    fn validate(&self) -> Result<()> {
        if !self.rates.markup.is_finite() || self.rates.markup <= 0.0 {
            return Err(ProfitbookError::Config(format!(
                "rates.markup must be positive, got {}",
                self.rates.markup
            )));
        }
        if self.rates.fallback_days == 0 {
            return Err(ProfitbookError::Config(
                "rates.fallback_days must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
