use chrono::NaiveDateTime;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::AppError;

pub const DATETIME_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single cell. `Float` never holds NaN, use [`Value::float`] to build one.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    DateTime(NaiveDateTime),
    Missing,
}

impl Value {
    pub fn float(f: f64) -> Self {
        if f.is_nan() {
            Value::Missing
        } else {
            Value::Float(f)
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Element type of a non-missing value.
    pub fn kind(&self) -> Option<ColumnType> {
        match self {
            Value::Integer(_) => Some(ColumnType::Integer),
            Value::Float(_) => Some(ColumnType::Float),
            Value::Text(_) => Some(ColumnType::Text),
            Value::Boolean(_) => Some(ColumnType::Boolean),
            Value::DateTime(_) => Some(ColumnType::DateTime),
            Value::Missing => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Boolean(_) => 0,
            Value::Integer(_) | Value::Float(_) => 1,
            Value::DateTime(_) => 2,
            Value::Text(_) => 3,
            Value::Missing => 4,
        }
    }

    /// Total order used for sorting: numbers numerically, text lexically,
    /// datetimes chronologically, `Missing` last.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (a, b) if a.rank() == 1 && b.rank() == 1 => {
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.total_cmp(&y)
            }
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

fn normalized_bits(f: f64) -> u64 {
    if f == 0.0 {
        0.0f64.to_bits()
    } else {
        f.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => normalized_bits(*a) == normalized_bits(*b),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Missing, Value::Missing) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => normalized_bits(*f).hash(state),
            Value::Text(s) => s.hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::DateTime(dt) => dt.hash(state),
            Value::Missing => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) if v.fract() == 0.0 && v.abs() < 1e16 => write!(f, "{:.1}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_DISPLAY_FORMAT)),
            Value::Missing => write!(f, "null"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::DateTime(dt) => {
                serializer.serialize_str(&dt.format(DATETIME_DISPLAY_FORMAT).to_string())
            }
            Value::Missing => serializer.serialize_none(),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Missing, Into::into)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Text,
    DateTime,
    Mixed,
}

impl ColumnType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Infers the declared type from the non-missing values.
    pub fn infer(values: &[Value]) -> Self {
        values
            .iter()
            .filter_map(Value::kind)
            .try_fold(None, |acc: Option<ColumnType>, kind| match (acc, kind) {
                (None, k) => Some(Some(k)),
                (Some(a), k) if a == k => Some(Some(a)),
                (Some(ColumnType::Integer), ColumnType::Float)
                | (Some(ColumnType::Float), ColumnType::Integer) => Some(Some(ColumnType::Float)),
                _ => None,
            })
            .map_or(ColumnType::Mixed, |kind| kind.unwrap_or(ColumnType::Text))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub dtype: ColumnType,
    pub values: Vec<Value>,
}

impl Column {
    /// Builds a column whose type is inferred from its values. Integer cells of
    /// a float column are promoted so the column stays homogeneous.
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        let dtype = ColumnType::infer(&values);
        Self::with_type(name, dtype, values)
    }

    pub fn with_type(name: impl Into<String>, dtype: ColumnType, values: Vec<Value>) -> Self {
        let values = if dtype == ColumnType::Float {
            values
                .into_iter()
                .map(|v| match v {
                    Value::Integer(i) => Value::Float(i as f64),
                    other => other,
                })
                .collect()
        } else {
            values
        };
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_numeric(&self) -> bool {
        self.dtype.is_numeric()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_missing()).count()
    }

    fn take(&self, indices: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            dtype: self.dtype,
            values: indices.iter().map(|&i| self.values[i].clone()).collect(),
        }
    }
}

/// Ordered named columns of equal length. Rows are addressed by their dense
/// position `0..height()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self, AppError> {
        if let Some(first) = columns.first() {
            if let Some(bad) = columns.iter().find(|c| c.len() != first.len()) {
                return Err(AppError::InvalidInput(format!(
                    "Column '{}' has {} values, expected {}",
                    bad.name,
                    bad.len(),
                    first.len()
                )));
            }
        }
        Ok(Self { columns })
    }

    // Callers guarantee equal lengths (columns taken from an existing table).
    pub(crate) fn from_columns(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn height(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Like [`Table::column`] but reports a missing column as an error.
    pub fn require(&self, name: &str) -> Result<&Column, AppError> {
        self.column(name)
            .ok_or_else(|| AppError::ColumnNotFound(name.to_string()))
    }

    pub fn row(&self, idx: usize) -> Vec<&Value> {
        self.columns.iter().map(|c| &c.values[idx]).collect()
    }

    /// New table holding the given rows, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
        }
    }

    pub fn head(&self, n: usize) -> Table {
        let indices: Vec<usize> = (0..self.height().min(n)).collect();
        self.take_rows(&indices)
    }
}

/// Serializes a table as a list of row objects keyed by column name.
pub struct Records<'a>(pub &'a Table);

impl Serialize for Records<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let table = self.0;
        let mut seq = serializer.serialize_seq(Some(table.height()))?;
        for row in 0..table.height() {
            seq.serialize_element(&RecordRow { table, row })?;
        }
        seq.end()
    }
}

struct RecordRow<'a> {
    table: &'a Table,
    row: usize,
}

impl Serialize for RecordRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.table.width()))?;
        for column in self.table.columns() {
            map.serialize_entry(&column.name, &column.values[self.row])?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn infers_column_types() {
        assert_eq!(
            ColumnType::infer(&[Value::Integer(1), Value::Missing, Value::Integer(3)]),
            ColumnType::Integer
        );
        assert_eq!(
            ColumnType::infer(&[Value::Integer(1), Value::Float(2.5)]),
            ColumnType::Float
        );
        assert_eq!(
            ColumnType::infer(&[Value::Integer(1), Value::text("a")]),
            ColumnType::Mixed
        );
        assert_eq!(ColumnType::infer(&[Value::Missing]), ColumnType::Text);
        assert_eq!(ColumnType::infer(&[]), ColumnType::Text);
    }

    #[test]
    fn float_columns_promote_integers() {
        let col = Column::new("v", vec![Value::Integer(1), Value::Float(2.5)]);
        assert_eq!(col.dtype, ColumnType::Float);
        assert_eq!(col.values[0], Value::Float(1.0));
    }

    #[test]
    fn nan_is_missing() {
        assert!(Value::float(f64::NAN).is_missing());
        assert_eq!(Value::Float(0.0), Value::Float(-0.0));
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = Table::new(vec![
            Column::new("a", vec![Value::Integer(1)]),
            Column::new("b", vec![]),
        ]);
        assert!(matches!(err, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn sort_puts_missing_last() {
        let mut values = vec![Value::Missing, Value::Float(2.5), Value::Integer(1)];
        values.sort_by(Value::sort_cmp);
        assert_eq!(values, vec![Value::Integer(1), Value::Float(2.5), Value::Missing]);
    }

    #[test]
    fn display_matches_text_coercion() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(8, 30, 0))
            .unwrap();
        assert_eq!(Value::Float(10.0).to_string(), "10.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::DateTime(dt).to_string(), "2024-03-01 08:30:00");
        assert_eq!(Value::Missing.to_string(), "null");
    }

    #[test]
    fn records_serialize_in_column_order() {
        let table = Table::new(vec![
            Column::new("b", vec![Value::Integer(1)]),
            Column::new("a", vec![Value::Missing]),
        ])
        .unwrap();
        let json = serde_json::to_string(&Records(&table)).unwrap();
        assert_eq!(json, r#"[{"b":1,"a":null}]"#);
    }
}
