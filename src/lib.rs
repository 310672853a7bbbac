//! profitbook: daily net profit from a sales ledger
//!
//! Costs recorded in lira or dollars are converted to roubles at the
//! Central Bank of Russia rate for the row date (plus a margin), profit is
//! summed per day and marketplace, and the latest day is reported.

pub mod cli;
pub mod config;
pub mod services;
pub mod store;
pub mod types;
