//! Shapes the series each chart kind needs. Rendering is left to the caller.

use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::models::{Column, ColumnType, Table, Value};
use crate::services::aggregate::{group_rows, reduce, AggMode, VALUE_COLUMN};

pub const HISTOGRAM_BINS: usize = 30;
pub const PIE_HOLE: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Histogram,
    Scatter,
}

impl FromStr for ChartKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bar" | "barras" => Ok(ChartKind::Bar),
            "line" | "linha" => Ok(ChartKind::Line),
            "pie" | "pizza" => Ok(ChartKind::Pie),
            "histogram" | "histograma" => Ok(ChartKind::Histogram),
            "scatter" => Ok(ChartKind::Scatter),
            _ => Err(AppError::InvalidChartRequest(format!(
                "Unsupported chart type '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartKind::Bar => "Bar",
            ChartKind::Line => "Line",
            ChartKind::Pie => "Pie",
            ChartKind::Histogram => "Histogram",
            ChartKind::Scatter => "Scatter",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: Value,
    pub y: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieSlice {
    pub label: Value,
    pub value: f64,
}

/// Half-open `[start, end)` bin; the last bin also holds `end`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChartData {
    /// Bar, line and scatter. Lines connect points in order.
    Series { points: Vec<ChartPoint>, markers: bool },
    /// Rendered as a ring with the given relative hole size.
    Slices { slices: Vec<PieSlice>, hole: f64 },
    Bins { bins: Vec<HistogramBin> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: Option<String>,
    pub color_label: Option<String>,
    pub data: ChartData,
}

fn axis<'a>(data: &'a Table, name: &str, role: &str) -> Result<&'a Column, AppError> {
    data.column(name).ok_or_else(|| {
        AppError::InvalidChartRequest(format!("{} column '{}' not found", role, name))
    })
}

fn numeric_axis<'a>(data: &'a Table, name: &str, role: &str) -> Result<&'a Column, AppError> {
    let column = axis(data, name, role)?;
    match column.dtype {
        ColumnType::Integer | ColumnType::Float | ColumnType::Boolean => Ok(column),
        _ => Err(AppError::InvalidChartRequest(format!(
            "{} column '{}' must be numeric",
            role, name
        ))),
    }
}

fn sorted_by_x<'a>(data: &'a Table, x: &Column) -> Cow<'a, Table> {
    let mut order: Vec<usize> = (0..data.height()).collect();
    order.sort_by(|&a, &b| x.values[a].sort_cmp(&x.values[b]));
    Cow::Owned(data.take_rows(&order))
}

fn raw_points(x: &Column, y: &Column, color: Option<&Column>) -> Vec<ChartPoint> {
    (0..x.len())
        .map(|row| ChartPoint {
            x: x.values[row].clone(),
            y: y.values[row].clone(),
            color: color.map(|c| c.values[row].clone()),
        })
        .collect()
}

/// One point per distinct (x, color): the row count, or the sum of `y`.
fn grouped_points(data: &Table, x: &Column, y: Option<&Column>, color: Option<&Column>) -> Vec<ChartPoint> {
    let keys: Vec<&Column> = std::iter::once(x).chain(color).collect();
    group_rows(&keys, data.height())
        .into_iter()
        .map(|group| {
            let value = match y {
                Some(y) => reduce(y, &group.rows, AggMode::Sum),
                None => Value::Integer(group.rows.len() as i64),
            };
            let mut key = group.key.into_iter();
            ChartPoint {
                x: key.next().unwrap_or(Value::Missing),
                y: value,
                color: key.next(),
            }
        })
        .collect()
}

fn slices(points: Vec<ChartPoint>) -> Vec<PieSlice> {
    points
        .into_iter()
        .filter_map(|p| p.y.as_f64().map(|value| PieSlice { label: p.x, value }))
        .collect()
}

fn histogram(x: &Column, color: Option<&Column>) -> Vec<HistogramBin> {
    let observations: Vec<(f64, Option<&Value>)> = (0..x.len())
        .filter_map(|row| x.values[row].as_f64().map(|v| (v, color.map(|c| &c.values[row]))))
        .collect();
    if observations.is_empty() {
        return Vec::new();
    }

    let (mut lo, mut hi) = observations
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (v, _)| (lo.min(*v), hi.max(*v)));
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    // Scaled before subtracting, so ranges wider than f64::MAX stay finite.
    let bins = HISTOGRAM_BINS as f64;
    let width = hi / bins - lo / bins;
    let edge = |i: usize| match i {
        0 => lo,
        HISTOGRAM_BINS => hi,
        _ => lo / bins * (bins - i as f64) + hi / bins * i as f64,
    };

    // one set of bins per color value, in first-seen order
    let mut groups: Vec<(Option<&Value>, [usize; HISTOGRAM_BINS])> = Vec::new();
    for (v, c) in observations {
        let idx = ((v / width - lo / width).floor() as usize).min(HISTOGRAM_BINS - 1);
        match groups.iter_mut().find(|(key, _)| *key == c) {
            Some((_, counts)) => counts[idx] += 1,
            None => {
                let mut counts = [0usize; HISTOGRAM_BINS];
                counts[idx] += 1;
                groups.push((c, counts));
            }
        }
    }

    groups
        .into_iter()
        .flat_map(|(color, counts)| {
            counts.into_iter().enumerate().map(move |(i, count)| HistogramBin {
                start: edge(i),
                end: edge(i + 1),
                count,
                color: color.cloned(),
            })
        })
        .collect()
}

/// Builds the data of a `kind` chart from `data`. With `aggregated`, `data`
/// is an aggregation result and `y` defaults to its `valor` column; otherwise
/// bar, line and pie group `data` by `x` themselves.
pub fn build(
    kind: &str,
    data: &Table,
    x: &str,
    y: Option<&str>,
    color: Option<&str>,
    aggregated: bool,
) -> Result<ChartSpec, AppError> {
    let kind: ChartKind = kind.parse()?;
    build_kind(kind, data, x, y, color, aggregated)
}

pub fn build_kind(
    kind: ChartKind,
    data: &Table,
    x: &str,
    y: Option<&str>,
    color: Option<&str>,
    aggregated: bool,
) -> Result<ChartSpec, AppError> {
    let x_column = axis(data, x, "X")?;
    let data = if aggregated && kind != ChartKind::Histogram && x_column.dtype == ColumnType::DateTime {
        sorted_by_x(data, x_column)
    } else {
        Cow::Borrowed(data)
    };
    let data = data.as_ref();
    let x_column = axis(data, x, "X")?;
    let color_column = color.map(|c| axis(data, c, "Color")).transpose()?;
    let aggregated = aggregated && kind != ChartKind::Histogram;

    let (title, y_label, chart_data) = match kind {
        ChartKind::Bar | ChartKind::Line => {
            let markers = kind == ChartKind::Line;
            if aggregated {
                let y = y.unwrap_or(VALUE_COLUMN);
                let y_column = axis(data, y, "Y")?;
                (
                    format!("{}: aggregated", kind),
                    Some(y.to_string()),
                    ChartData::Series { points: raw_points(x_column, y_column, color_column), markers },
                )
            } else {
                match y {
                    Some(y) => {
                        let y_column = numeric_axis(data, y, "Y")?;
                        (
                            format!("{}: {} by {}", kind, y, x),
                            Some(y.to_string()),
                            ChartData::Series {
                                points: grouped_points(data, x_column, Some(y_column), color_column),
                                markers,
                            },
                        )
                    }
                    None if kind == ChartKind::Line => {
                        return Err(AppError::InvalidChartRequest(
                            "Line charts need a numeric Y column".to_string(),
                        ))
                    }
                    None => (
                        format!("{}: count by {}", kind, x),
                        Some("count".to_string()),
                        ChartData::Series {
                            points: grouped_points(data, x_column, None, color_column),
                            markers,
                        },
                    ),
                }
            }
        }
        ChartKind::Pie => {
            let (title, y_label, points) = if aggregated {
                let y = y.unwrap_or(VALUE_COLUMN);
                let y_column = axis(data, y, "Y")?;
                (format!("{}: aggregated", kind), y.to_string(), raw_points(x_column, y_column, None))
            } else if let Some(y) = y {
                let y_column = numeric_axis(data, y, "Y")?;
                (
                    format!("{}: {} by {}", kind, y, x),
                    y.to_string(),
                    grouped_points(data, x_column, Some(y_column), None),
                )
            } else {
                let mut counts = grouped_points(data, x_column, None, None);
                counts.sort_by(|a, b| b.y.sort_cmp(&a.y));
                (format!("{}: distribution of {}", kind, x), "count".to_string(), counts)
            };
            (title, Some(y_label), ChartData::Slices { slices: slices(points), hole: PIE_HOLE })
        }
        ChartKind::Histogram => {
            let x_column = numeric_axis(data, x, "X")?;
            (
                format!("{}: {}", kind, x),
                Some("count".to_string()),
                ChartData::Bins { bins: histogram(x_column, color_column) },
            )
        }
        ChartKind::Scatter => {
            let y = y.ok_or_else(|| {
                AppError::InvalidChartRequest("Scatter charts need a numeric Y column".to_string())
            })?;
            let y_column = axis(data, y, "Y")?;
            (
                format!("{}: {} vs {}", kind, y, x),
                Some(y.to_string()),
                ChartData::Series { points: raw_points(x_column, y_column, color_column), markers: true },
            )
        }
    };

    tracing::debug!("Built {} chart '{}'", kind, title);
    Ok(ChartSpec {
        kind,
        title,
        x_label: x.to_string(),
        y_label,
        color_label: color.map(str::to_string),
        data: chart_data,
    })
}
