use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::AppError;
use crate::models::{Column, ColumnType, Table, Value};

/// Key column of an aggregation result.
pub const KEY_COLUMN: &str = "x";
/// Reduced value column of an aggregation result.
pub const VALUE_COLUMN: &str = "valor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", rename_all = "snake_case")]
pub enum AggMode {
    Sum,
    Mean,
    Count,
    Median,
    Max,
    Min,
}

impl FromStr for AggMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "soma" | "sum" => Ok(AggMode::Sum),
            "média" | "media" | "mean" => Ok(AggMode::Mean),
            "contagem" | "count" => Ok(AggMode::Count),
            "mediana" | "median" => Ok(AggMode::Median),
            "máximo" | "maximo" | "max" => Ok(AggMode::Max),
            "mínimo" | "minimo" | "min" => Ok(AggMode::Min),
            other => Err(AppError::InvalidInput(format!(
                "Unknown aggregation '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for AggMode {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Rows sharing a key, in the order keys are first seen.
pub(crate) struct Group {
    pub key: Vec<Value>,
    pub rows: Vec<usize>,
}

pub(crate) fn group_rows(keys: &[&Column], height: usize) -> Vec<Group> {
    let mut positions: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for row in 0..height {
        let key: Vec<Value> = keys.iter().map(|c| c.values[row].clone()).collect();
        match positions.get(&key) {
            Some(&idx) => groups[idx].rows.push(row),
            None => {
                positions.insert(key.clone(), groups.len());
                groups.push(Group { key, rows: vec![row] });
            }
        }
    }

    groups
}

pub(crate) fn require_reducible(column: &Column) -> Result<(), AppError> {
    match column.dtype {
        ColumnType::Integer | ColumnType::Float | ColumnType::Boolean => Ok(()),
        _ => Err(AppError::InvalidInput(format!(
            "Column '{}' is not numeric",
            column.name
        ))),
    }
}

fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

/// Reduces the non-missing cells of `column` at `rows`. Integer-like columns
/// keep integer sums and extremes.
pub(crate) fn reduce(column: &Column, rows: &[usize], mode: AggMode) -> Value {
    let integral = matches!(column.dtype, ColumnType::Integer | ColumnType::Boolean);
    let cells = rows.iter().map(|&r| &column.values[r]).filter(|v| !v.is_missing());

    if integral && matches!(mode, AggMode::Sum | AggMode::Max | AggMode::Min) {
        let ints: Vec<i64> = cells
            .filter_map(|v| match v {
                Value::Integer(i) => Some(*i),
                Value::Boolean(b) => Some(*b as i64),
                _ => None,
            })
            .collect();
        return match mode {
            AggMode::Sum => Value::Integer(ints.iter().fold(0i64, |acc, i| acc.saturating_add(*i))),
            AggMode::Max => ints.iter().max().copied().into(),
            _ => ints.iter().min().copied().into(),
        };
    }

    let nums: Vec<f64> = cells.filter_map(Value::as_f64).collect();
    match mode {
        AggMode::Count => Value::Integer(nums.len() as i64),
        AggMode::Sum => Value::float(nums.iter().sum()),
        AggMode::Mean if nums.is_empty() => Value::Missing,
        AggMode::Mean => Value::float(nums.iter().sum::<f64>() / nums.len() as f64),
        AggMode::Median => {
            let mut sorted = nums;
            sorted.sort_by(f64::total_cmp);
            median(&sorted).into()
        }
        AggMode::Max => nums.into_iter().reduce(f64::max).into(),
        AggMode::Min => nums.into_iter().reduce(f64::min).into(),
    }
}

pub(crate) fn result_table(key_dtype: ColumnType, keys: Vec<Value>, values: Vec<Value>) -> Table {
    Table::from_columns(vec![
        Column::with_type(KEY_COLUMN, key_dtype, keys),
        Column::new(VALUE_COLUMN, values),
    ])
}

/// Groups by `key` and reduces `value` with `mode`. Without a value column,
/// or with [`AggMode::Count`], counts rows per key. Missing keys form their
/// own group; groups keep first-seen order.
pub fn aggregate(
    table: &Table,
    key: &str,
    value: Option<&str>,
    mode: AggMode,
) -> Result<Table, AppError> {
    let key_column = table.require(key)?;
    let value_column = match value {
        Some(name) if mode != AggMode::Count => {
            let column = table.require(name)?;
            require_reducible(column)?;
            Some(column)
        }
        _ => None,
    };

    let groups = group_rows(&[key_column], table.height());
    tracing::debug!("Aggregating {} rows into {} groups by '{}'", table.height(), groups.len(), key);

    let (keys, values): (Vec<Value>, Vec<Value>) = groups
        .into_iter()
        .map(|mut group| {
            let reduced = match value_column {
                Some(column) => reduce(column, &group.rows, mode),
                None => Value::Integer(group.rows.len() as i64),
            };
            (group.key.swap_remove(0), reduced)
        })
        .unzip();

    Ok(result_table(key_column.dtype, keys, values))
}

fn descending_missing_last(a: &Value, b: &Value) -> Ordering {
    match (a.is_missing(), b.is_missing()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.sort_cmp(a),
    }
}

/// Keeps the `n` rows with the largest `valor`; ties keep their order.
/// `n == 0` keeps the result untouched.
pub fn top_n(result: &Table, n: usize) -> Result<Table, AppError> {
    if n == 0 {
        return Ok(result.clone());
    }
    let values = &result.require(VALUE_COLUMN)?.values;
    let mut order: Vec<usize> = (0..result.height()).collect();
    order.sort_by(|&a, &b| descending_missing_last(&values[a], &values[b]));
    order.truncate(n);
    Ok(result.take_rows(&order))
}
