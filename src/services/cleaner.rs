use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::models::Table;
use crate::services::utils::unique_column_name;

// Names produced when a previous export serialized the row index.
static PLACEHOLDER_COLUMN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Unnamed").expect("placeholder pattern is valid"));

pub fn placeholder_name(position: usize) -> String {
    format!("Unnamed: {}", position)
}

pub fn is_placeholder(name: &str) -> bool {
    PLACEHOLDER_COLUMN.is_match(name.trim())
}

/// Trims column names, drops placeholder columns and keeps names unique.
/// Rows keep their order and dense positions. Idempotent.
pub fn clean(table: Table) -> Table {
    let mut existing_names = HashSet::new();

    let columns = table
        .into_columns()
        .into_iter()
        .filter_map(|mut column| {
            let trimmed = column.name.trim().to_string();
            if is_placeholder(&trimmed) {
                tracing::debug!("Dropping placeholder column '{}'", trimmed);
                return None;
            }
            column.name = unique_column_name(&trimmed, &mut existing_names);
            Some(column)
        })
        .collect();

    Table::from_columns(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Column, Value};

    fn table(names: &[&str]) -> Table {
        Table::new(
            names
                .iter()
                .map(|n| Column::new(*n, vec![Value::Integer(1), Value::Integer(2)]))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn trims_and_drops_placeholders() {
        let cleaned = clean(table(&[" Unnamed: 0", "  preço ", "qtd"]));
        assert_eq!(cleaned.column_names(), vec!["preço", "qtd"]);
        assert_eq!(cleaned.height(), 2);
    }

    #[test]
    fn deduplicates_trimmed_names() {
        let cleaned = clean(table(&["a", " a", "a_1"]));
        assert_eq!(cleaned.column_names(), vec!["a", "a_1", "a_1_1"]);
    }

    #[test]
    fn is_idempotent() {
        let raw = table(&["Unnamed: 3", " x ", "x", "y"]);
        let once = clean(raw);
        let twice = clean(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn only_prefix_matches() {
        assert!(is_placeholder("Unnamed: 12"));
        assert!(!is_placeholder("id_Unnamed"));
    }
}
