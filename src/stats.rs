//! Per-column aggregate statistics.
//!
//! [`compute_statistics`] is a pure function of the dataset and its inferred
//! types: numeric columns get `sum`/`min`/`max`/`avg` over the values that
//! coerce, textual columns get a frequency table. A final cross-column pass
//! expresses each numeric sum as a percentage of the sum of all numeric sums.
//!
//! The percentage treats every numeric column as part of one whole, even when
//! the columns measure unrelated quantities. That contract is kept as is.

use serde::Serialize;

use crate::{
    data::{ColumnMap, format_number},
    frequency::FrequencyTable,
    inference::{ColumnKind, DataTypes},
    parser::Dataset,
};

pub type Statistics = ColumnMap<ColumnStatistics>;
pub type MissingValues = ColumnMap<usize>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumericAggregate {
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// `count` is the number of values that coerced to a number. When nothing
/// coerces the aggregate is absent and only `count: 0` remains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericStatistics {
    #[serde(flatten)]
    pub aggregate: Option<NumericAggregate>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pct_of_total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalStatistics {
    pub count: usize,
    pub value_counts: FrequencyTable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnStatistics {
    Numeric(NumericStatistics),
    Categorical(CategoricalStatistics),
}

impl ColumnStatistics {
    pub fn count(&self) -> usize {
        match self {
            ColumnStatistics::Numeric(stats) => stats.count,
            ColumnStatistics::Categorical(stats) => stats.count,
        }
    }

    pub fn aggregate(&self) -> Option<&NumericAggregate> {
        match self {
            ColumnStatistics::Numeric(stats) => stats.aggregate.as_ref(),
            ColumnStatistics::Categorical(_) => None,
        }
    }

    pub fn sum(&self) -> Option<f64> {
        self.aggregate().map(|agg| agg.sum)
    }

    pub fn pct_of_total(&self) -> Option<f64> {
        match self {
            ColumnStatistics::Numeric(stats) => stats.pct_of_total,
            ColumnStatistics::Categorical(_) => None,
        }
    }

    pub fn value_counts(&self) -> Option<&FrequencyTable> {
        match self {
            ColumnStatistics::Numeric(_) => None,
            ColumnStatistics::Categorical(stats) => Some(&stats.value_counts),
        }
    }
}

#[derive(Debug, Default)]
struct NumericAccumulator {
    sum: f64,
    count: usize,
    min: Option<f64>,
    max: Option<f64>,
}

impl NumericAccumulator {
    fn add_value(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = Some(self.min.map_or(value, |current| current.min(value)));
        self.max = Some(self.max.map_or(value, |current| current.max(value)));
    }

    fn finish(self) -> NumericStatistics {
        let aggregate = match (self.min, self.max) {
            (Some(min), Some(max)) if self.count > 0 => Some(NumericAggregate {
                sum: self.sum,
                min,
                max,
                avg: self.sum / self.count as f64,
            }),
            _ => None,
        };
        NumericStatistics {
            aggregate,
            count: self.count,
            pct_of_total: None,
        }
    }
}

pub fn compute_statistics(dataset: &Dataset, types: &DataTypes) -> Statistics {
    let mut statistics = Statistics::with_capacity(dataset.column_count());
    for (idx, name) in dataset.columns().iter().enumerate() {
        let kind = types.get(name).copied().unwrap_or(ColumnKind::String);
        let column = match kind {
            ColumnKind::Number => {
                let mut acc = NumericAccumulator::default();
                for value in dataset.column_values(idx).filter_map(|v| v.as_number()) {
                    acc.add_value(value);
                }
                ColumnStatistics::Numeric(acc.finish())
            }
            ColumnKind::String => {
                let value_counts = FrequencyTable::count_present(dataset.column_values(idx));
                ColumnStatistics::Categorical(CategoricalStatistics {
                    count: value_counts.total(),
                    value_counts,
                })
            }
        };
        statistics.insert(name.clone(), column);
    }
    apply_percentages(&mut statistics);
    statistics
}

/// Fills `pct_of_total` for every column with a sum. A zero (or non-finite)
/// grand total leaves the field absent everywhere.
fn apply_percentages(statistics: &mut Statistics) {
    let grand_total: f64 = statistics.values().filter_map(ColumnStatistics::sum).sum();
    if grand_total == 0.0 || !grand_total.is_finite() {
        return;
    }
    for (_, column) in statistics.iter_mut() {
        if let ColumnStatistics::Numeric(stats) = column
            && let Some(aggregate) = stats.aggregate
        {
            stats.pct_of_total = Some(100.0 * aggregate.sum / grand_total);
        }
    }
}

pub fn count_missing(dataset: &Dataset) -> MissingValues {
    dataset
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let missing = dataset
                .column_values(idx)
                .filter(|value| value.is_missing())
                .count();
            (name.clone(), missing)
        })
        .collect()
}

/// Table rows for terminal output: one line per column.
pub fn render_rows(
    statistics: &Statistics,
    types: &DataTypes,
    missing: &MissingValues,
) -> Vec<Vec<String>> {
    statistics
        .iter()
        .map(|(name, column)| {
            let kind = types.get(name).copied().unwrap_or(ColumnKind::String);
            let metric = |value: Option<f64>| value.map(format_metric).unwrap_or_default();
            let aggregate = column.aggregate();
            let top_value = column
                .value_counts()
                .and_then(|counts| counts.top(1).into_iter().next())
                .map(|(value, count)| format!("{value} ({count})"))
                .unwrap_or_default();
            vec![
                name.to_string(),
                kind.to_string(),
                column.count().to_string(),
                missing.get(name).copied().unwrap_or_default().to_string(),
                metric(aggregate.map(|agg| agg.sum)),
                metric(aggregate.map(|agg| agg.min)),
                metric(aggregate.map(|agg| agg.max)),
                metric(aggregate.map(|agg| agg.avg)),
                column
                    .pct_of_total()
                    .map(|pct| format!("{pct:.2}%"))
                    .unwrap_or_default(),
                top_value,
            ]
        })
        .collect()
}

pub fn render_headers() -> Vec<String> {
    [
        "column", "type", "count", "missing", "sum", "min", "max", "avg", "pct_of_total", "top",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect()
}

fn format_metric(value: f64) -> String {
    if value.fract() == 0.0 {
        format_number(value)
    } else {
        format!("{value:.4}")
    }
}
