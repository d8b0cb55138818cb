use serde::Deserialize;
use std::collections::HashSet;

use crate::error::AppError;
use crate::models::Table;

/// Row filters offered next to the chart controls. Each one yields a new table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// Keeps rows whose text rendering is one of `values`; no values keeps all.
    Categorical { column: String, values: Vec<String> },
    /// Inclusive numeric range; rows with a missing value are dropped.
    NumericRange { column: String, min: f64, max: f64 },
}

impl Filter {
    pub fn apply(&self, table: &Table) -> Result<Table, AppError> {
        let keep: Vec<usize> = match self {
            Filter::Categorical { column, values } => {
                if values.is_empty() {
                    return Ok(table.clone());
                }
                let allowed: HashSet<&str> = values.iter().map(String::as_str).collect();
                let column = table.require(column)?;
                column
                    .values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| allowed.contains(v.to_string().as_str()))
                    .map(|(row, _)| row)
                    .collect()
            }
            Filter::NumericRange { column, min, max } => {
                let column = table.require(column)?;
                if !column.is_numeric() {
                    return Err(AppError::InvalidInput(format!(
                        "Range filter needs a numeric column, '{}' is not",
                        column.name
                    )));
                }
                column
                    .values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.as_f64().is_some_and(|n| n >= *min && n <= *max))
                    .map(|(row, _)| row)
                    .collect()
            }
        };
        Ok(table.take_rows(&keep))
    }
}

pub fn apply_filters(table: &Table, filters: &[Filter]) -> Result<Table, AppError> {
    filters.iter().try_fold(table.clone(), |current, filter| {
        let next = filter.apply(&current)?;
        tracing::debug!("Filter {:?} kept {} of {} rows", filter, next.height(), current.height());
        Ok(next)
    })
}
