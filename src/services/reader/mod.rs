//! Multi-format ingestion: detects the file kind from its name and turns the
//! raw bytes into a [`Table`].

pub mod csv;
pub mod excel;
pub mod json;

use serde::Deserialize;

use crate::error::AppError;
use crate::models::Table;
use crate::services::cleaner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Excel,
    Json,
}

impl FileKind {
    pub fn from_file_name(file_name: &str) -> Result<Self, AppError> {
        let name = file_name.trim().to_lowercase();
        match name.rsplit_once('.').map(|(_, ext)| ext) {
            Some("csv") => Ok(FileKind::Csv),
            Some("xlsx") | Some("xls") => Ok(FileKind::Excel),
            Some("json") => Ok(FileKind::Json),
            _ => Err(AppError::UnsupportedFormat(format!(
                "'{}' is not a CSV, XLSX/XLS or JSON file",
                file_name
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadOptions {
    /// Worksheet to parse; the first one when absent. Ignored for CSV/JSON.
    pub sheet: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub table: Table,
    /// Worksheet names of an Excel workbook, empty for the other formats.
    pub sheet_names: Vec<String>,
}

pub fn read(file_data: &[u8], file_name: &str) -> Result<Table, AppError> {
    read_with_options(file_data, file_name, &ReadOptions::default()).map(|loaded| loaded.table)
}

pub fn read_with_options(
    file_data: &[u8],
    file_name: &str,
    options: &ReadOptions,
) -> Result<LoadedFile, AppError> {
    let kind = FileKind::from_file_name(file_name)?;
    tracing::info!("Reading {} ({} bytes) as {:?}", file_name, file_data.len(), kind);

    let loaded = match kind {
        FileKind::Csv => LoadedFile {
            table: csv::read_csv(file_data)?,
            sheet_names: Vec::new(),
        },
        FileKind::Excel => excel::read_excel(file_data, options.sheet.as_deref())?,
        FileKind::Json => LoadedFile {
            table: json::read_json(file_data)?,
            sheet_names: Vec::new(),
        },
    };

    tracing::info!(
        "Read {} rows x {} columns from {}",
        loaded.table.height(),
        loaded.table.width(),
        file_name
    );
    Ok(loaded)
}

/// Reads and cleans in one step.
pub fn load(file_data: &[u8], file_name: &str, options: &ReadOptions) -> Result<LoadedFile, AppError> {
    let loaded = read_with_options(file_data, file_name, options)?;
    Ok(LoadedFile {
        table: cleaner::clean(loaded.table),
        sheet_names: loaded.sheet_names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;

    #[test]
    fn detects_kind_from_extension() {
        assert_eq!(FileKind::from_file_name("vendas.CSV").unwrap(), FileKind::Csv);
        assert_eq!(FileKind::from_file_name("book.xls").unwrap(), FileKind::Excel);
        assert_eq!(FileKind::from_file_name("book.xlsx").unwrap(), FileKind::Excel);
        assert_eq!(FileKind::from_file_name("dump.json").unwrap(), FileKind::Json);
    }

    #[test]
    fn rejects_unknown_extensions() {
        for name in ["notes.txt", "archive.csv.gz", "no_extension"] {
            assert!(matches!(
                FileKind::from_file_name(name),
                Err(AppError::UnsupportedFormat(_))
            ));
        }
    }

    #[test]
    fn load_cleans_the_table() {
        let data = b"Unnamed: 0, name ,score\n0,ana,1\n1,bia,2\n";
        let loaded = load(data, "scores.csv", &ReadOptions::default()).unwrap();
        assert_eq!(loaded.table.column_names(), vec!["name", "score"]);
        assert_eq!(loaded.table.column("score").unwrap().values[1], Value::Integer(2));
        assert!(loaded.sheet_names.is_empty());
    }
}
