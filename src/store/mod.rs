//! Tabular store traits and implementations

mod csv_store;

pub use csv_store::CsvStore;

use crate::types::{Result, Table};

/// Spreadsheet-like storage: named spreadsheets holding named sheets
pub trait TableStore {
    /// Read a whole sheet; the first row is the header
    fn read_sheet(&self, spreadsheet: &str, sheet: &str) -> Result<Table>;

    /// Clear an existing sheet and write `table` into it. Fails if the sheet does not exist.
    fn overwrite_sheet(&self, spreadsheet: &str, sheet: &str, table: &Table) -> Result<()>;

    /// Delete the sheet if present, then create it with `table`
    fn replace_sheet(&self, spreadsheet: &str, sheet: &str, table: &Table) -> Result<()>;
}
