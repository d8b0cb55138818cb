use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::AppError;
use crate::models::{ColumnType, Table, Value};
use crate::services::aggregate::{reduce, require_reducible, result_table, AggMode};
use crate::services::inference::coerce_datetime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", rename_all = "snake_case")]
pub enum Frequency {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl FromStr for Frequency {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "d" | "day" | "dia" => Ok(Frequency::Day),
            "w" | "week" | "semana" => Ok(Frequency::Week),
            "m" | "month" | "mês" | "mes" => Ok(Frequency::Month),
            "q" | "quarter" | "trimestre" => Ok(Frequency::Quarter),
            "y" | "year" | "ano" => Ok(Frequency::Year),
            other => Err(AppError::InvalidInput(format!("Unknown frequency '{}'", other))),
        }
    }
}

impl TryFrom<String> for Frequency {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Frequency {
    /// Start of the period containing `ts`. Weeks start on Monday.
    pub fn bucket_start(self, ts: NaiveDateTime) -> NaiveDateTime {
        let date = ts.date();
        let start = match self {
            Frequency::Day => date,
            Frequency::Week => date - Duration::days(date.weekday().num_days_from_monday() as i64),
            Frequency::Month => date - Duration::days(date.day0() as i64),
            Frequency::Quarter => {
                let month = (date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
            }
            Frequency::Year => date - Duration::days(date.ordinal0() as i64),
        };
        start.and_time(NaiveTime::MIN)
    }
}

/// Buckets rows by the period of `date_column` and reduces each bucket like
/// [`crate::services::aggregate::aggregate`]. Rows whose date cannot be read
/// are left out; empty periods are not emitted. Sorted by period start.
pub fn aggregate_by_time(
    table: &Table,
    date_column: &str,
    value: Option<&str>,
    mode: AggMode,
    freq: Frequency,
) -> Result<Table, AppError> {
    let dates = coerce_datetime(table.require(date_column)?);
    let value_column = match value {
        Some(name) if mode != AggMode::Count => {
            let column = table.require(name)?;
            require_reducible(column)?;
            Some(column)
        }
        _ => None,
    };

    let mut buckets: BTreeMap<NaiveDateTime, Vec<usize>> = BTreeMap::new();
    let mut skipped = 0usize;
    for (row, ts) in dates.into_iter().enumerate() {
        match ts {
            Some(ts) => buckets.entry(freq.bucket_start(ts)).or_default().push(row),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!("{} rows without a readable '{}' were skipped", skipped, date_column);
    }

    let (keys, values): (Vec<Value>, Vec<Value>) = buckets
        .into_iter()
        .map(|(start, rows)| {
            let reduced = match value_column {
                Some(column) => reduce(column, &rows, mode),
                None => Value::Integer(rows.len() as i64),
            };
            (Value::DateTime(start), reduced)
        })
        .unzip();

    Ok(result_table(ColumnType::DateTime, keys, values))
}
