use serde::Deserialize;

use crate::error::AppError;
use crate::models::Table;
use crate::services::aggregate::{aggregate, top_n, AggMode, KEY_COLUMN, VALUE_COLUMN};
use crate::services::chart::{build_kind, ChartKind, ChartSpec};
use crate::services::filter::{apply_filters, Filter};
use crate::services::time_aggregate::{aggregate_by_time, Frequency};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeGrouping {
    pub date_column: String,
    pub freq: Frequency,
}

/// Everything the "generate chart" action collects from the user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChartPlan {
    pub kind: String,
    pub x: Option<String>,
    pub y: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    /// Aggregate bar/line/pie data before charting.
    pub mode: Option<AggMode>,
    /// Group bar/line data by calendar period instead of by `x`.
    pub time: Option<TimeGrouping>,
    /// Keep the N largest aggregated values, 0 keeps all.
    #[serde(default)]
    pub top_n: usize,
}

impl ChartPlan {
    fn x_column(&self) -> Result<&str, AppError> {
        self.x
            .as_deref()
            .ok_or_else(|| AppError::InvalidChartRequest("An X column is required".to_string()))
    }

    pub fn execute(&self, table: &Table) -> Result<ChartSpec, AppError> {
        let kind: ChartKind = self.kind.parse()?;
        let filtered = apply_filters(table, &self.filters)?;
        let color = self.color.as_deref();
        let groupable = matches!(kind, ChartKind::Bar | ChartKind::Line | ChartKind::Pie);

        match (&self.time, self.mode) {
            (Some(time), mode) if matches!(kind, ChartKind::Bar | ChartKind::Line) => {
                let agg = aggregate_by_time(
                    &filtered,
                    &time.date_column,
                    self.y.as_deref(),
                    mode.unwrap_or(AggMode::Sum),
                    time.freq,
                )?;
                let agg = top_n(&agg, self.top_n)?;
                build_kind(kind, &agg, KEY_COLUMN, Some(VALUE_COLUMN), color, true)
            }
            (_, Some(mode)) if groupable => {
                let agg = aggregate(&filtered, self.x_column()?, self.y.as_deref(), mode)?;
                let agg = top_n(&agg, self.top_n)?;
                build_kind(kind, &agg, KEY_COLUMN, Some(VALUE_COLUMN), color, true)
            }
            _ => build_kind(kind, &filtered, self.x_column()?, self.y.as_deref(), color, false),
        }
    }
}
