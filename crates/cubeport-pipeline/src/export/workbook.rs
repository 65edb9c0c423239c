//! Multi-sheet spreadsheet (xlsx) output
//!
//! The whole workbook is assembled in memory. Only when every sheet has been
//! built is it serialized to a staging file and renamed into place, so a
//! failure on any sheet leaves nothing at the destination.

use crate::error::ExportError;
use crate::flatten::{Cell, FlatTable, MAX_TABLE_NAME_LEN};
use crate::store::durable;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use serde_json::Number;
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// Longest text a spreadsheet cell holds
const MAX_CELL_CHARS: usize = 32_767;

/// Integers beyond this lose precision as spreadsheet numbers
const MAX_EXACT_INTEGER: u64 = 1 << 53;

const FALLBACK_SHEET_NAME: &str = "sheet";

const RESERVED_SHEET_NAME: &str = "history";

/// Write `tables` to `path`, one sheet each, in order. Returns the sheet names
/// actually used.
pub fn write_workbook(tables: &[FlatTable], path: &Path) -> Result<Vec<String>, ExportError> {
    if tables.is_empty() {
        return Err(ExportError::EmptyArtifact);
    }

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let mut names = SheetNames::default();

    for table in tables {
        if table.column_count() == 0 {
            return Err(ExportError::EmptyTable {
                table: table.name().to_string(),
            });
        }

        let name = names.claim(table.name());
        let sheet = workbook.add_worksheet();
        sheet.set_name(&name)?;
        write_sheet(sheet, table, &header)?;
    }

    let mut staged = durable::staging_file(path).map_err(|e| ExportError::io(path, e))?;
    workbook.save_to_writer(staged.as_file_mut())?;
    durable::commit(staged, path).map_err(|e| ExportError::io(path, e))?;

    Ok(names.into_names())
}

fn write_sheet(sheet: &mut Worksheet, table: &FlatTable, header: &Format) -> Result<(), XlsxError> {
    for (col, column) in table.columns().iter().enumerate() {
        sheet.write_string_with_format(0, col_index(col), column, header)?;
    }

    for (r, row) in table.rows().iter().enumerate() {
        let row_index = u32::try_from(r + 1).unwrap_or(u32::MAX);
        for (col, cell) in row.iter().enumerate() {
            write_cell(sheet, row_index, col_index(col), cell)?;
        }
    }
    Ok(())
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> Result<(), XlsxError> {
    match cell {
        Cell::Null => {}
        Cell::Bool(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
        Cell::Number(n) => match exact_f64(n) {
            Some(value) => {
                sheet.write_number(row, col, value)?;
            }
            None => {
                sheet.write_string(row, col, n.to_string())?;
            }
        },
        Cell::Text(text) => {
            sheet.write_string(row, col, clip(text, row, col))?;
        }
    }
    Ok(())
}

// Out-of-range indices are left for the writer to reject.
fn col_index(col: usize) -> u16 {
    u16::try_from(col).unwrap_or(u16::MAX)
}

fn exact_f64(n: &Number) -> Option<f64> {
    if let Some(i) = n.as_i64() {
        return (i.unsigned_abs() <= MAX_EXACT_INTEGER).then_some(i as f64);
    }
    if let Some(u) = n.as_u64() {
        return (u <= MAX_EXACT_INTEGER).then_some(u as f64);
    }
    n.as_f64()
}

fn clip(text: &str, row: u32, col: u16) -> String {
    if text.chars().count() <= MAX_CELL_CHARS {
        return text.to_string();
    }
    warn!(row, col, "Cell text exceeds spreadsheet limit, truncating");
    text.chars().take(MAX_CELL_CHARS).collect()
}

/// Sheet names handed out within one workbook.
///
/// Spreadsheets compare sheet names case-insensitively, so a repeated name
/// gets a numeric suffix (`_2`, `_3`, ...) and the base is shortened to keep
/// the result within the name length limit.
#[derive(Debug, Default)]
pub struct SheetNames {
    taken: HashSet<String>,
    names: Vec<String>,
}

impl SheetNames {
    pub fn claim(&mut self, base: &str) -> String {
        let base = if base.is_empty() {
            FALLBACK_SHEET_NAME.to_string()
        } else {
            sheet_safe(base)
        };
        let base = base.as_str();

        let mut candidate = base.to_string();
        let mut n = 2;
        while self.taken.contains(&candidate.to_lowercase()) {
            let suffix = format!("_{n}");
            let keep = MAX_TABLE_NAME_LEN.saturating_sub(suffix.len());
            candidate = base.chars().take(keep).collect::<String>() + &suffix;
            n += 1;
        }

        self.taken.insert(candidate.to_lowercase());
        self.names.push(candidate.clone());
        candidate
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

/// Sheet names may not start or end with an apostrophe, and `History` is
/// reserved
fn sheet_safe(name: &str) -> String {
    if name.eq_ignore_ascii_case(RESERVED_SHEET_NAME) {
        return format!("{name}_");
    }

    let mut chars: Vec<char> = name.chars().collect();
    if let Some(first) = chars.first_mut() {
        if *first == '\'' {
            *first = '_';
        }
    }
    if let Some(last) = chars.last_mut() {
        if *last == '\'' {
            *last = '_';
        }
    }
    chars.into_iter().collect()
}
