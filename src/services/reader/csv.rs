use encoding_rs::mem::{decode_latin1, encode_latin1_lossy, is_str_latin1};
use polars::prelude::*;
use std::collections::HashSet;
use std::io::Cursor;
use std::ops::ControlFlow;

use crate::error::AppError;
use crate::models::{Column, ColumnType, Table, Value};
use crate::services::cleaner::placeholder_name;
use crate::services::utils::unique_column_name;

pub const SEPARATORS: [u8; 4] = [b',', b';', b'\t', b'|'];
pub const ENCODINGS: [TextEncoding; 2] = [TextEncoding::Utf8, TextEncoding::Latin1];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

impl TextEncoding {
    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Result<String, String> {
        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(|s| s.trim_start_matches('\u{feff}').to_string())
                .map_err(|e| format!("invalid utf-8: {}", e)),
            TextEncoding::Latin1 => Ok(decode_latin1(bytes).into_owned()),
        }
    }

    pub fn encode(self, text: &str) -> Option<Vec<u8>> {
        match self {
            TextEncoding::Utf8 => Some(text.as_bytes().to_vec()),
            TextEncoding::Latin1 => {
                is_str_latin1(text).then(|| encode_latin1_lossy(text).into_owned())
            }
        }
    }
}

/// One (encoding, separator) combination tried against the raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvStrategy {
    pub encoding: TextEncoding,
    pub separator: u8,
}

impl CsvStrategy {
    pub fn describe(&self) -> String {
        format!("{} + {:?}", self.encoding.label(), self.separator as char)
    }

    pub fn parse(&self, bytes: &[u8]) -> Result<Table, String> {
        let text = self.encoding.decode(bytes)?;

        let header = text.lines().next().unwrap_or_default();
        if !separator_applies(header, self.separator) {
            return Err("separator not present in header".to_string());
        }
        let names = header_names(header, self.separator);

        let df = CsvReader::new(Cursor::new(text.into_bytes()))
            .has_header(true)
            .with_separator(self.separator)
            .infer_schema(None)
            .finish()
            .map_err(|e| e.to_string())?;

        let table = dataframe_to_table(&df).map_err(|e| e.to_string())?;
        if names.len() != table.width() {
            return Err(format!(
                "header has {} fields but {} columns were parsed",
                names.len(),
                table.width()
            ));
        }
        let columns = table
            .into_columns()
            .into_iter()
            .zip(names)
            .map(|(column, name)| Column { name, ..column })
            .collect();
        Table::new(columns).map_err(|e| e.to_string())
    }
}

/// All strategies in trial order: every separator for utf-8, then latin-1.
pub fn strategies() -> impl Iterator<Item = CsvStrategy> {
    ENCODINGS.into_iter().flat_map(|encoding| {
        SEPARATORS
            .into_iter()
            .map(move |separator| CsvStrategy { encoding, separator })
    })
}

/// Header cells split on `separator` outside double quotes. Blank cells get
/// a positional placeholder name and repeats get `_1`, `_2`, ... suffixes.
fn header_names(header: &str, separator: u8) -> Vec<String> {
    let separator = separator as char;
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = header.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == separator && !in_quotes => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    fields.push(current);

    let mut existing_names = HashSet::new();
    fields
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            let name = if field.trim().is_empty() {
                placeholder_name(idx)
            } else {
                field.clone()
            };
            unique_column_name(&name, &mut existing_names)
        })
        .collect()
}

// A header without any candidate separator is a single-column file, which
// every separator reads the same way.
fn separator_applies(header: &str, separator: u8) -> bool {
    let bytes = header.as_bytes();
    bytes.contains(&separator) || !SEPARATORS.iter().any(|s| bytes.contains(s))
}

pub fn read_csv(file_data: &[u8]) -> Result<Table, AppError> {
    let outcome = strategies().try_fold(Vec::new(), |mut failures, strategy| {
        match strategy.parse(file_data) {
            Ok(table) => ControlFlow::Break((strategy, table)),
            Err(reason) => {
                tracing::debug!("CSV strategy {} failed: {}", strategy.describe(), reason);
                failures.push(format!("{}: {}", strategy.describe(), reason));
                ControlFlow::Continue(failures)
            }
        }
    });

    match outcome {
        ControlFlow::Break((strategy, table)) => {
            tracing::info!("CSV parsed with {}", strategy.describe());
            Ok(table)
        }
        ControlFlow::Continue(failures) => {
            tracing::warn!("No CSV strategy succeeded after {} attempts", failures.len());
            Err(AppError::UnreadableFile(format!(
                "CSV encoding/separator not detected ({})",
                failures.join("; ")
            )))
        }
    }
}

fn column_type(dtype: &DataType) -> ColumnType {
    match dtype {
        DataType::Int32 | DataType::Int64 | DataType::UInt32 | DataType::UInt64 => {
            ColumnType::Integer
        }
        DataType::Float32 | DataType::Float64 => ColumnType::Float,
        DataType::Boolean => ColumnType::Boolean,
        _ => ColumnType::Text,
    }
}

fn any_value_to_value(value: AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Missing,
        AnyValue::Boolean(v) => Value::Boolean(v),
        AnyValue::Int32(v) => Value::Integer(v as i64),
        AnyValue::Int64(v) => Value::Integer(v),
        AnyValue::UInt32(v) => Value::Integer(v as i64),
        AnyValue::UInt64(v) => i64::try_from(v).map_or(Value::Float(v as f64), Value::Integer),
        AnyValue::Float32(v) => Value::float(v as f64),
        AnyValue::Float64(v) => Value::float(v),
        AnyValue::String(v) => Value::Text(v.to_string()),
        other => Value::Text(other.to_string()),
    }
}

pub(crate) fn dataframe_to_table(df: &DataFrame) -> Result<Table, AppError> {
    let columns = df
        .get_columns()
        .iter()
        .map(|series| {
            let values = (0..series.len())
                .map(|row_idx| match series.get(row_idx) {
                    Ok(value) => any_value_to_value(value),
                    Err(e) => {
                        tracing::warn!("Error getting value at row {}: {}", row_idx, e);
                        Value::Missing
                    }
                })
                .collect();
            Column::with_type(series.name(), column_type(series.dtype()), values)
        })
        .collect();

    Table::new(columns)
}
