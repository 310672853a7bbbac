//! Services for rate lookup, normalization, aggregation and reporting

pub mod aggregator;
pub mod cost;
pub mod markers;
pub mod notifier;
pub mod pipeline;
pub mod rates;
pub mod report;
pub mod revenue;

pub use aggregator::Aggregator;
pub use cost::CostNormalizer;
pub use notifier::{Notifier, TelegramNotifier};
pub use pipeline::{Pipeline, RunReport};
pub use rates::{CbrRateProvider, RateCache, RateProvider, RateResolver};
pub use report::ReportFormatter;
pub use revenue::RevenueNormalizer;
