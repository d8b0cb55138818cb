use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

use super::LoadedFile;
use crate::error::AppError;
use crate::models::{Column, Table, Value};
use crate::services::cleaner::placeholder_name;
use crate::services::utils::{excel_serial_to_datetime, parse_datetime};

/// Opens an `.xlsx`/`.xls` workbook and parses `sheet` (default: the first
/// one). The first row holds the column names.
pub fn read_excel(file_data: &[u8], sheet: Option<&str>) -> Result<LoadedFile, AppError> {
    let cursor = Cursor::new(file_data.to_vec());

    let mut workbook = open_workbook_auto_from_rs(cursor).map_err(|e| {
        tracing::error!("Failed to open Excel file: {}", e);
        AppError::UnreadableFile(format!("Failed to open Excel file: {}", e))
    })?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    tracing::info!("Found {} sheets: {:?}", sheet_names.len(), sheet_names);

    let sheet_name = match sheet {
        Some(requested) => sheet_names
            .iter()
            .find(|name| name.as_str() == requested)
            .cloned()
            .ok_or_else(|| {
                AppError::UnreadableFile(format!("Sheet '{}' not found in workbook", requested))
            })?,
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| AppError::UnreadableFile("No sheets found in workbook".to_string()))?,
    };

    let range = workbook.worksheet_range(&sheet_name).map_err(|e| {
        tracing::warn!("Failed to read worksheet {}: {}", sheet_name, e);
        AppError::UnreadableFile(format!("Failed to read worksheet '{}': {}", sheet_name, e))
    })?;

    let rows: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();
    if rows.is_empty() {
        tracing::warn!("Sheet {} is empty", sheet_name);
    }

    Ok(LoadedFile {
        table: rows_to_table(&rows)?,
        sheet_names,
    })
}

fn header_name(idx: usize, cell: &Data) -> String {
    match cell {
        Data::Empty => placeholder_name(idx),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::String(s) if s.trim().is_empty() => placeholder_name(idx),
        other => other.to_string(),
    }
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::Integer(*i),
        Data::Float(f) => Value::float(*f),
        Data::String(s) if s.is_empty() => Value::Missing,
        Data::String(s) => Value::Text(s.clone()),
        Data::Bool(b) => Value::Boolean(*b),
        Data::DateTime(d) => excel_serial_to_datetime(d.as_f64()).map_or(Value::Missing, Value::DateTime),
        Data::DateTimeIso(s) => parse_datetime(s).map_or_else(|| Value::Text(s.clone()), Value::DateTime),
        Data::Empty => Value::Missing,
        _ => Value::Missing,
    }
}

fn rows_to_table(rows: &[Vec<Data>]) -> Result<Table, AppError> {
    let Some(header_row) = rows.first() else {
        return Ok(Table::default());
    };

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let columns = (0..width)
        .map(|col_idx| {
            let name = header_row
                .get(col_idx)
                .map_or_else(|| placeholder_name(col_idx), |cell| header_name(col_idx, cell));
            let values = rows
                .iter()
                .skip(1) // Skip header row
                .map(|row| row.get(col_idx).map_or(Value::Missing, cell_to_value))
                .collect();
            Column::new(name, values)
        })
        .collect();

    Table::new(columns)
}
