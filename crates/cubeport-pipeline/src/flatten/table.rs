//! Flat table model produced by the flattening engine

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::{Number, Value};
use std::borrow::Cow;

/// Longest table name a spreadsheet accepts
pub const MAX_TABLE_NAME_LEN: usize = 31;

const FORBIDDEN_NAME_CHARS: [char; 7] = ['\\', '/', '*', '?', ':', '[', ']'];

/// Replace characters spreadsheets reject in sheet names with `_` and keep at
/// most [`MAX_TABLE_NAME_LEN`] characters of the result.
pub fn sanitize_table_name(name: &str) -> String {
    name.chars()
        .map(|c| if FORBIDDEN_NAME_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_TABLE_NAME_LEN)
        .collect()
}

/// A scalar table cell. Composite JSON values never reach a cell; they are
/// stored as their JSON text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
}

impl Cell {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => Cell::Number(n.clone()),
            Value::String(s) => Cell::Text(s.clone()),
            composite => Cell::Text(composite.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Text rendering used by delimited output; null is the empty string
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Cell::Null => Cow::Borrowed(""),
            Cell::Bool(true) => Cow::Borrowed("true"),
            Cell::Bool(false) => Cow::Borrowed("false"),
            Cell::Number(n) => Cow::Owned(n.to_string()),
            Cell::Text(s) => Cow::Borrowed(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Number(n.into())
    }
}

/// One flattened row: column name to cell, in first-seen order
pub type Record = IndexMap<String, Cell>;

/// A named table whose rows all share the same ordered column set.
///
/// Rows are stored positionally against `columns`, so a row can never carry a
/// column the table does not have.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatTable {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl FlatTable {
    /// Build a table from records that may disagree on their keys. Columns are
    /// the union of all keys in first-seen order; absent cells become null.
    pub fn from_records(name: &str, records: Vec<Record>) -> Self {
        let columns: IndexSet<String> = records
            .iter()
            .flat_map(|record| record.keys().cloned())
            .collect();

        let rows = records
            .into_iter()
            .map(|mut record| {
                columns
                    .iter()
                    .map(|column| record.swap_remove(column).unwrap_or(Cell::Null))
                    .collect()
            })
            .collect();

        Self {
            name: sanitize_table_name(name),
            columns: columns.into_iter().collect(),
            rows,
        }
    }

    /// Stack several tables into one under `name`, as a union of their columns.
    pub fn concat(name: &str, tables: &[FlatTable]) -> Self {
        let records = tables
            .iter()
            .flat_map(|table| table.records())
            .collect();
        Self::from_records(name, records)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// A table without rows or without columns carries no data
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    /// Look up a cell by row index and column name
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(index)
    }

    fn records(&self) -> impl Iterator<Item = Record> + '_ {
        self.rows.iter().map(|row| {
            self.columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect()
        })
    }
}
