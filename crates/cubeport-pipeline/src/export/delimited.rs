//! Delimited-text (CSV) output of a single table

use crate::error::ExportError;
use crate::flatten::FlatTable;
use crate::store::durable;
use std::io::Write;
use std::path::Path;

/// Render one table as CSV: a header row in column order, then one record per
/// row. Nulls are empty fields.
pub fn render<W: Write>(table: &FlatTable, out: W) -> Result<(), ExportError> {
    if table.column_count() == 0 {
        return Err(ExportError::EmptyTable {
            table: table.name().to_string(),
        });
    }

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|cell| cell.as_text().into_owned()))?;
    }
    writer.flush().map_err(|e| ExportError::io("<csv stream>", e))?;
    Ok(())
}

/// Write one table to `path` as CSV, atomically
pub fn write_table(table: &FlatTable, path: &Path) -> Result<(), ExportError> {
    let mut staged = durable::staging_file(path).map_err(|e| ExportError::io(path, e))?;
    render(table, staged.as_file_mut())?;
    durable::commit(staged, path).map_err(|e| ExportError::io(path, e))
}
