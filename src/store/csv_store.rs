//! CSV-backed tabular store
//!
//! A spreadsheet is a directory under the store root and each sheet is a
//! `<sheet>.csv` file inside it. Cells are numericised on read.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};

use super::TableStore;
use crate::types::{Cell, ProfitbookError, Result, Table};

pub struct CsvStore {
    root: PathBuf,
}

impl CsvStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn spreadsheet_dir(&self, spreadsheet: &str) -> Result<PathBuf> {
        validate_name(spreadsheet)?;
        let dir = self.root.join(spreadsheet);
        if !dir.is_dir() {
            return Err(ProfitbookError::Store(format!(
                "spreadsheet '{}' not found under {}",
                spreadsheet,
                self.root.display()
            )));
        }
        Ok(dir)
    }

    fn sheet_path(&self, spreadsheet: &str, sheet: &str) -> Result<PathBuf> {
        validate_name(sheet)?;
        Ok(self
            .spreadsheet_dir(spreadsheet)?
            .join(format!("{}.csv", sheet)))
    }

    /// Write using temp file + rename so readers never see a partial sheet.
    fn write_atomic(path: &Path, table: &Table) -> Result<()> {
        let temp_path = path.with_extension("csv.tmp");

        {
            let file = File::create(&temp_path)?;
            let mut writer = WriterBuilder::new().flexible(true).from_writer(file);
            writer.write_record(&table.headers)?;
            for row in &table.rows {
                writer.write_record(row.iter().map(|c| c.to_string()))?;
            }
            let file = writer
                .into_inner()
                .map_err(|e| ProfitbookError::Store(format!("failed to flush sheet: {}", e)))?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(ProfitbookError::Store(format!("invalid sheet name '{}'", name)));
    }
    Ok(())
}

impl TableStore for CsvStore {
    fn read_sheet(&self, spreadsheet: &str, sheet: &str) -> Result<Table> {
        let path = self.sheet_path(spreadsheet, sheet)?;
        if !path.is_file() {
            return Err(ProfitbookError::Store(format!(
                "sheet '{}' not found in '{}'",
                sheet, spreadsheet
            )));
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&path)?;

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let mut table = Table::new(headers);

        for record in reader.records() {
            let record = record?;
            let row: Vec<Cell> = record.iter().map(Cell::infer).collect();
            table.push_row(row);
        }

        tracing::debug!(spreadsheet, sheet, rows = table.len(), "read sheet");
        Ok(table)
    }

    fn overwrite_sheet(&self, spreadsheet: &str, sheet: &str, table: &Table) -> Result<()> {
        let path = self.sheet_path(spreadsheet, sheet)?;
        if !path.is_file() {
            return Err(ProfitbookError::Store(format!(
                "sheet '{}' not found in '{}'",
                sheet, spreadsheet
            )));
        }
        Self::write_atomic(&path, table)?;
        tracing::debug!(spreadsheet, sheet, rows = table.len(), "overwrote sheet");
        Ok(())
    }

    fn replace_sheet(&self, spreadsheet: &str, sheet: &str, table: &Table) -> Result<()> {
        let path = self.sheet_path(spreadsheet, sheet)?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Self::write_atomic(&path, table)?;
        tracing::debug!(spreadsheet, sheet, rows = table.len(), "recreated sheet");
        Ok(())
    }
}
