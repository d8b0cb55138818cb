use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

use crate::error::AppError;
use crate::models::{Column, Table, Value};

type FlatRecord = Vec<(String, Value)>;

/// Reads a JSON document (one object or a list of objects), falling back to
/// newline-delimited JSON when the whole document does not parse.
pub fn read_json(file_data: &[u8]) -> Result<Table, AppError> {
    let text = decode_utf8_dropping_invalid(file_data);
    let text = text.trim().trim_start_matches('\u{feff}');

    let records = match serde_json::from_str::<JsonValue>(text) {
        Ok(document) => records_from_document(document)?,
        Err(e) => {
            tracing::debug!("Not a single JSON document ({}), trying NDJSON", e);
            records_from_lines(text)?
        }
    };

    normalize(&records)
}

fn decode_utf8_dropping_invalid(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

fn records_from_document(document: JsonValue) -> Result<Vec<FlatRecord>, AppError> {
    match document {
        JsonValue::Object(object) => Ok(vec![flatten(object)]),
        JsonValue::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                JsonValue::Object(object) => Ok(flatten(object)),
                other => Err(AppError::UnreadableFile(format!(
                    "JSON list item {} is not an object: {}",
                    idx, other
                ))),
            })
            .collect(),
        other => Err(AppError::UnreadableFile(format!(
            "JSON document must be an object or a list of objects, got {}",
            other
        ))),
    }
}

fn records_from_lines(text: &str) -> Result<Vec<FlatRecord>, AppError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| match serde_json::from_str::<JsonValue>(line) {
            Ok(JsonValue::Object(object)) => Ok(flatten(object)),
            Ok(other) => Err(AppError::UnreadableFile(format!(
                "NDJSON line {} is not an object: {}",
                idx + 1,
                other
            ))),
            Err(e) => Err(AppError::UnreadableFile(format!(
                "NDJSON line {} is not valid JSON: {}",
                idx + 1,
                e
            ))),
        })
        .collect()
}

/// Nested objects become `parent.child` keys; arrays stay as one cell.
fn flatten(object: Map<String, JsonValue>) -> FlatRecord {
    let mut out = Vec::new();
    flatten_into("", object, &mut out);
    out
}

fn flatten_into(prefix: &str, object: Map<String, JsonValue>, out: &mut FlatRecord) {
    for (key, value) in object {
        let name = if prefix.is_empty() {
            key
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            JsonValue::Object(inner) => flatten_into(&name, inner, out),
            other => out.push((name, json_to_value(other))),
        }
    }
}

fn json_to_value(value: JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Missing,
        JsonValue::Bool(b) => Value::Boolean(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map_or(Value::Missing, Value::float),
        },
        JsonValue::String(s) => Value::Text(s),
        array @ JsonValue::Array(_) => Value::Text(array.to_string()),
        // flattened by the caller
        JsonValue::Object(object) => Value::Text(JsonValue::Object(object).to_string()),
    }
}

/// Builds columns in first-seen key order; keys a record lacks are missing.
fn normalize(records: &[FlatRecord]) -> Result<Table, AppError> {
    let mut names: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut cells: Vec<Vec<Value>> = Vec::new();

    for (row, record) in records.iter().enumerate() {
        for (name, value) in record {
            let col = *positions.entry(name.clone()).or_insert_with(|| {
                names.push(name.clone());
                cells.push(vec![Value::Missing; row]);
                names.len() - 1
            });
            // a repeated key inside one record keeps the last value
            if cells[col].len() > row {
                cells[col][row] = value.clone();
            } else {
                cells[col].push(value.clone());
            }
        }
        for column in cells.iter_mut() {
            column.resize(row + 1, Value::Missing);
        }
    }

    Table::new(
        names
            .into_iter()
            .zip(cells)
            .map(|(name, values)| Column::new(name, values))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnType;

    #[test]
    fn ndjson_lines() {
        let table = read_json(b"{\"a\":1}\n{\"a\":2}\n{\"a\":3}\n").unwrap();
        assert_eq!(table.shape(), (3, 1));
        let a = table.column("a").unwrap();
        assert_eq!(a.dtype, ColumnType::Integer);
        assert_eq!(a.values, vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
    }

    #[test]
    fn single_object_is_one_row() {
        let table = read_json(br#"  {"nome": "ana", "idade": 30}  "#).unwrap();
        assert_eq!(table.shape(), (1, 2));
        assert_eq!(table.column_names(), vec!["nome", "idade"]);
    }

    #[test]
    fn nested_objects_are_flattened() {
        let doc = br#"[
            {"id": 1, "cliente": {"nome": "ana", "endereco": {"uf": "BA"}}, "tags": ["a", "b"]},
            {"id": 2, "cliente": {"nome": "bia"}, "extra": true}
        ]"#;
        let table = read_json(doc).unwrap();
        assert_eq!(
            table.column_names(),
            vec!["id", "cliente.nome", "cliente.endereco.uf", "tags", "extra"]
        );
        assert_eq!(table.column("tags").unwrap().values[0], Value::text(r#"["a","b"]"#));
        assert_eq!(table.column("cliente.endereco.uf").unwrap().values[1], Value::Missing);
        assert_eq!(table.column("extra").unwrap().values[0], Value::Missing);
        assert_eq!(table.column("extra").unwrap().values[1], Value::Boolean(true));
    }

    #[test]
    fn mixed_numbers_become_float() {
        let table = read_json(br#"[{"v": 1}, {"v": 2.5}]"#).unwrap();
        let v = table.column("v").unwrap();
        assert_eq!(v.dtype, ColumnType::Float);
        assert_eq!(v.values[0], Value::Float(1.0));
    }

    #[test]
    fn invalid_bytes_are_dropped() {
        let mut data = b"{\"a\": \"x".to_vec();
        data.push(0xff);
        data.extend_from_slice(b"y\"}");
        let table = read_json(&data).unwrap();
        assert_eq!(table.column("a").unwrap().values[0], Value::text("xy"));
    }

    #[test]
    fn malformed_line_is_unreadable() {
        let err = read_json(b"{\"a\":1}\n{\"a\":\n").unwrap_err();
        assert!(matches!(err, AppError::UnreadableFile(_)));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn scalar_document_is_unreadable() {
        assert!(matches!(read_json(b"42"), Err(AppError::UnreadableFile(_))));
    }
}
