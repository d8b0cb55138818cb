use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::Serialize;

use crate::models::{Column, ColumnType, Table, Value};
use crate::services::utils::parse_datetime;

const DATETIME_NAME_HINTS: [&str; 8] = [
    "data", "date", "created", "updated", "timestamp", "time", "dt_", "_dt",
];

/// Numeric vs textual split of a table's columns, both in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnClassification {
    pub numeric: Vec<String>,
    pub text: Vec<String>,
}

pub fn classify(table: &Table) -> ColumnClassification {
    let (numeric, text): (Vec<&Column>, Vec<&Column>) =
        table.columns().iter().partition(|c| c.is_numeric());

    ColumnClassification {
        numeric: numeric.into_iter().map(|c| c.name.clone()).collect(),
        text: text.into_iter().map(|c| c.name.clone()).collect(),
    }
}

fn has_datetime_hint(name: &str) -> bool {
    let lower = name.to_lowercase();
    DATETIME_NAME_HINTS.iter().any(|hint| lower.contains(hint))
}

/// Every cell is missing or readable as a date/time. An all-missing column
/// converts without error, so it qualifies.
fn parses_as_datetime(column: &Column) -> bool {
    column.values.par_iter().all(|value| match value {
        Value::Missing | Value::DateTime(_) => true,
        Value::Text(s) => parse_datetime(s).is_some(),
        _ => false,
    })
}

/// Columns typed as datetime first, then name-hinted columns whose values
/// all parse as dates. No duplicates, table order within each group.
pub fn detect_datetime_columns(table: &Table) -> Vec<String> {
    let mut candidates: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| c.dtype == ColumnType::DateTime)
        .map(|c| c.name.clone())
        .collect();

    for column in table.columns() {
        if candidates.contains(&column.name) || !has_datetime_hint(&column.name) {
            continue;
        }
        if parses_as_datetime(column) {
            tracing::debug!("Column '{}' parses as datetime", column.name);
            candidates.push(column.name.clone());
        }
    }

    candidates
}

/// Datetime view of a column; cells that cannot be read become `None`.
pub fn coerce_datetime(column: &Column) -> Vec<Option<NaiveDateTime>> {
    column
        .values
        .iter()
        .map(|value| match value {
            Value::DateTime(dt) => Some(*dt),
            Value::Text(s) => parse_datetime(s),
            _ => None,
        })
        .collect()
}
