//! Type definitions for profitbook

mod error;
mod ledger;
mod table;

pub use error::*;
pub use ledger::*;
pub use table::*;
