//! JSON flattening engine
//!
//! Turns an arbitrary optimization result into one or more [`FlatTable`]s:
//!
//! - an array of objects becomes one table, one row per element
//! - an array holding anything else becomes a single `value` column
//! - an object with *collection keys* (non-empty arrays whose elements are all
//!   objects) becomes one table per collection key, with every other top-level
//!   field broadcast onto each row as context
//! - any other object becomes a single row
//! - a scalar becomes a single cell
//!
//! Nested objects are expanded into dotted column paths (`a.b.c`). Arrays met
//! below the top level are stored as their JSON text. Empty objects and empty
//! arrays carry no data and produce no column.
//!
//! The engine never returns an empty set: when nothing survives, a single
//! placeholder table with one `message` row is returned instead.

pub mod table;

pub use table::{sanitize_table_name, Cell, FlatTable, Record, MAX_TABLE_NAME_LEN};

use crate::error::FlatteningError;
use serde_json::{Map, Value};
use tracing::debug;

/// Table name for a top-level array of objects
pub const DEFAULT_TABLE_NAME: &str = "records";

/// Table and column name for scalar and mixed-type results
pub const VALUE_TABLE_NAME: &str = "value";

/// Table name for single-row results and the empty-result placeholder
pub const RESULT_TABLE_NAME: &str = "result";

pub const PLACEHOLDER_COLUMN: &str = "message";
pub const PLACEHOLDER_MESSAGE: &str = "optimization response was empty";

/// Widest row a spreadsheet can hold
pub const MAX_COLUMNS: usize = 16_384;

const PATH_SEPARATOR: char = '.';

/// Flatten a JSON value into tables.
///
/// Output is a pure function of the input: the same value always yields the
/// same tables, columns and rows in the same order.
pub fn flatten(value: &Value) -> Result<Vec<FlatTable>, FlatteningError> {
    let tables = match value {
        Value::Array(items) => vec![flatten_sequence(items)],
        Value::Object(fields) => flatten_object(fields),
        scalar => vec![value_table(std::slice::from_ref(scalar))],
    };

    let mut tables: Vec<FlatTable> = tables.into_iter().filter(|t| !t.is_empty()).collect();
    for table in &tables {
        check_width(table)?;
    }

    if tables.is_empty() {
        debug!("Result produced no rows, using placeholder table");
        tables.push(placeholder());
    }

    Ok(tables)
}

/// The single-row table returned when a result has no data
pub fn placeholder() -> FlatTable {
    let mut row = Record::new();
    row.insert(PLACEHOLDER_COLUMN.to_string(), Cell::from(PLACEHOLDER_MESSAGE));
    FlatTable::from_records(RESULT_TABLE_NAME, vec![row])
}

/// Flatten one object into a single row of dotted-path columns
pub fn flatten_record(fields: &Map<String, Value>) -> Record {
    let mut record = Record::new();
    for (key, value) in fields {
        walk(key, value, &mut record);
    }
    record
}

fn flatten_sequence(items: &[Value]) -> FlatTable {
    if !items.is_empty() && items.iter().all(Value::is_object) {
        let records = items
            .iter()
            .filter_map(Value::as_object)
            .map(flatten_record)
            .collect();
        FlatTable::from_records(DEFAULT_TABLE_NAME, records)
    } else {
        value_table(items)
    }
}

fn flatten_object(fields: &Map<String, Value>) -> Vec<FlatTable> {
    let collections: Vec<(&String, &Vec<Value>)> = fields
        .iter()
        .filter_map(|(key, value)| match value {
            Value::Array(items) if is_collection(items) => Some((key, items)),
            _ => None,
        })
        .collect();

    if collections.is_empty() {
        return vec![FlatTable::from_records(
            RESULT_TABLE_NAME,
            vec![flatten_record(fields)],
        )];
    }

    let mut context = Record::new();
    for (key, value) in fields {
        if !collections.iter().any(|(name, _)| *name == key) {
            walk(key, value, &mut context);
        }
    }

    collections
        .into_iter()
        .map(|(key, items)| {
            let rows = items
                .iter()
                .map(|item| {
                    let mut row = Record::new();
                    walk(key, item, &mut row);
                    for (column, cell) in &context {
                        row.insert(column.clone(), cell.clone());
                    }
                    row
                })
                .collect();
            FlatTable::from_records(key, rows)
        })
        .collect()
}

fn is_collection(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(Value::is_object)
}

/// Expand `value` under `path` into `record`. Only objects recurse.
fn walk(path: &str, value: &Value, record: &mut Record) {
    match value {
        Value::Object(fields) => {
            for (key, nested) in fields {
                let nested_path = format!("{path}{PATH_SEPARATOR}{key}");
                walk(&nested_path, nested, record);
            }
        }
        Value::Array(items) if items.is_empty() => {}
        leaf => {
            record.insert(path.to_string(), Cell::from_value(leaf));
        }
    }
}

fn value_table(values: &[Value]) -> FlatTable {
    let records = values
        .iter()
        .map(|value| {
            let mut row = Record::new();
            row.insert(VALUE_TABLE_NAME.to_string(), Cell::from_value(value));
            row
        })
        .collect();
    FlatTable::from_records(VALUE_TABLE_NAME, records)
}

fn check_width(table: &FlatTable) -> Result<(), FlatteningError> {
    if table.column_count() > MAX_COLUMNS {
        return Err(FlatteningError::TooManyColumns {
            table: table.name().to_string(),
            count: table.column_count(),
            limit: MAX_COLUMNS,
        });
    }
    Ok(())
}
