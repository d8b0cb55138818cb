use polars::prelude::*;

use crate::error::AppError;
use crate::models::{Column, ColumnType, Table, Value};

fn column_to_series(column: &Column) -> Series {
    let name = column.name.as_str();
    match column.dtype {
        ColumnType::Integer => {
            let ints: Vec<Option<i64>> = column
                .values
                .iter()
                .map(|v| match v {
                    Value::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect();
            Series::new(name, ints)
        }
        ColumnType::Float => {
            let nums: Vec<Option<f64>> = column.values.iter().map(Value::as_f64).collect();
            Series::new(name, nums)
        }
        ColumnType::Boolean => {
            let flags: Vec<Option<bool>> = column
                .values
                .iter()
                .map(|v| match v {
                    Value::Boolean(b) => Some(*b),
                    _ => None,
                })
                .collect();
            Series::new(name, flags)
        }
        _ => {
            let strings: Vec<Option<String>> = column
                .values
                .iter()
                .map(|v| (!v.is_missing()).then(|| v.to_string()))
                .collect();
            Series::new(name, strings)
        }
    }
}

pub fn to_dataframe(table: &Table) -> Result<DataFrame, AppError> {
    DataFrame::new(table.columns().iter().map(column_to_series).collect())
        .map_err(|e| AppError::DataFrameError(format!("Failed to create DataFrame: {}", e)))
}

/// Comma-separated UTF-8 with a header row; missing cells are left empty.
pub fn to_csv(table: &Table) -> Result<Vec<u8>, AppError> {
    if table.width() == 0 {
        return Ok(Vec::new());
    }
    let mut df = to_dataframe(table)?;
    let mut buffer = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .with_separator(b',')
        .finish(&mut df)?;
    tracing::debug!("Exported {} rows as {} CSV bytes", table.height(), buffer.len());
    Ok(buffer)
}
