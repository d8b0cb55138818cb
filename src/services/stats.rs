use rayon::prelude::*;
use serde::Serialize;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use std::mem::size_of;

use crate::models::{Column, Table, Value};
use crate::services::inference::classify;

pub const TOP_CATEGORY_COLUMNS: usize = 10;
pub const TOP_VALUES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    /// (rows, columns)
    pub shape: (usize, usize),
    pub memory_mb: f64,
    pub nulls_total: usize,
    pub duplicates: usize,
    pub describe_num: Option<Vec<NumericSummary>>,
    pub top_categories: Vec<CategoryFrequencies>,
}

/// Descriptive statistics of one numeric column, rounded to 3 decimals.
/// Everything but `count` is absent when the column has no values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryFrequencies {
    pub column: String,
    pub values: SmallVec<[ValueCount; TOP_VALUES]>,
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Linear interpolation between closest ranks.
fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

fn describe_column(column: &Column) -> NumericSummary {
    let mut nums: Vec<f64> = column.values.iter().filter_map(Value::as_f64).collect();
    nums.sort_by(f64::total_cmp);

    let count = nums.len();
    let mean = (count > 0).then(|| nums.iter().sum::<f64>() / count as f64);
    let std = mean.filter(|_| count > 1).map(|m| {
        let var = nums.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (count - 1) as f64;
        var.sqrt()
    });

    NumericSummary {
        column: column.name.clone(),
        count,
        mean: mean.map(round3),
        std: std.map(round3),
        min: nums.first().copied().map(round3),
        q25: quantile(&nums, 0.25).map(round3),
        median: quantile(&nums, 0.5).map(round3),
        q75: quantile(&nums, 0.75).map(round3),
        max: nums.last().copied().map(round3),
    }
}

/// Frequencies of the text rendering of each cell, missing included.
/// Ties keep first-seen order.
fn top_values(column: &Column) -> CategoryFrequencies {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<ValueCount> = Vec::new();

    for value in &column.values {
        let text = value.to_string();
        match positions.get(&text) {
            Some(&idx) => counts[idx].count += 1,
            None => {
                positions.insert(text.clone(), counts.len());
                counts.push(ValueCount { value: text, count: 1 });
            }
        }
    }

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    CategoryFrequencies {
        column: column.name.clone(),
        values: counts.into_iter().take(TOP_VALUES).collect(),
    }
}

fn estimate_memory_bytes(table: &Table) -> usize {
    table
        .columns()
        .par_iter()
        .map(|column| {
            let heap: usize = column
                .values
                .iter()
                .map(|v| match v {
                    Value::Text(s) => s.len(),
                    _ => 0,
                })
                .sum();
            size_of::<Column>() + column.name.len() + column.len() * size_of::<Value>() + heap
        })
        .sum()
}

fn count_duplicate_rows(table: &Table) -> usize {
    let mut seen = HashSet::with_capacity(table.height());
    (0..table.height())
        .filter(|&row| !seen.insert(table.row(row)))
        .count()
}

pub fn summarize(table: &Table) -> SummaryReport {
    let classes = classify(table);

    let numeric: Vec<&Column> = table.columns().iter().filter(|c| c.is_numeric()).collect();
    let describe_num = (!numeric.is_empty() && table.height() > 0)
        .then(|| numeric.par_iter().map(|c| describe_column(c)).collect::<Vec<_>>());

    let top_categories = classes
        .text
        .iter()
        .take(TOP_CATEGORY_COLUMNS)
        .filter_map(|name| table.column(name))
        .collect::<Vec<_>>()
        .par_iter()
        .map(|c| top_values(c))
        .collect();

    let report = SummaryReport {
        shape: table.shape(),
        memory_mb: estimate_memory_bytes(table) as f64 / (1024.0 * 1024.0),
        nulls_total: table.columns().iter().map(Column::null_count).sum(),
        duplicates: count_duplicate_rows(table),
        describe_num,
        top_categories,
    };
    tracing::debug!(
        "Summarized {:?} table: {} nulls, {} duplicate rows",
        report.shape,
        report.nulls_total,
        report.duplicates
    );
    report
}
