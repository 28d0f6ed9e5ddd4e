//! Chart recommendations derived from a parsed dataset.
//!
//! Derivation is an ordered list of [`ChartRule`]s evaluated in sequence.
//! Each rule looks at the dataset through a shared [`ChartContext`] and
//! either produces one fully materialized [`ChartSpecification`] or steps
//! aside; a rule that finds nothing to plot never blocks the rules after it.
//! Mutually exclusive alternatives are grouped with [`FirstApplicable`].
//!
//! Default order:
//!
//! 1. category share (pie, donut above six slices) and the companion bar of
//!    per-column numeric sums;
//! 2. missing values per column, else a categorical breakdown of the first
//!    non-identifier text column, else of the first text column;
//! 3. histogram of the first numeric column;
//! 4. cumulative trend (area) of the first numeric column;
//! 5. scatter of the first two numeric columns;
//! 6. top values of the first text column as a line.

use std::sync::LazyLock;

use itertools::{Itertools, MinMaxResult};
use log::debug;
use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::{
    data::{Record, display_name, number_to_json, round2},
    frequency::FrequencyTable,
    inference::{ColumnKind, DataTypes},
    parser::Dataset,
    stats::{MissingValues, count_missing},
};

pub const MAX_CHARTS: usize = 6;
const CATEGORY_COLUMN_LIMIT: usize = 8;
const PIE_SLICE_LIMIT: usize = 6;
const MISSING_COLUMN_LIMIT: usize = 8;
const CATEGORY_TOP_VALUES: usize = 10;
const FALLBACK_MAX_DISTINCT: usize = 15;
const HISTOGRAM_BINS: usize = 10;
const TREND_MIN_ROWS: usize = 10;
const TREND_MAX_POINTS: usize = 30;
const TREND_MIN_POINTS: usize = 5;
const SCATTER_MIN_ROWS: usize = 20;
const SCATTER_MAX_POINTS: usize = 100;
const SCATTER_MIN_POINTS: usize = 10;
const LINE_TOP_VALUES: usize = 12;
const LINE_MIN_VALUES: usize = 4;

static IDENTIFIER_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(id|name|number|code|key|uuid|guid|employeenumber|index)$")
        .expect("identifier pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Pie,
    Donut,
    Histogram,
    Area,
    Line,
    Scatter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartConfig {
    pub x_axis: String,
    pub y_axis: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bins: Option<usize>,
}

impl ChartConfig {
    fn axes(x_axis: &str, y_axis: &str) -> Self {
        Self {
            x_axis: x_axis.to_string(),
            y_axis: y_axis.to_string(),
            bins: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpecification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub title: String,
    pub config: ChartConfig,
    pub data: Vec<Record>,
}

/// Column classification shared by every rule of one derivation run.
pub struct ChartContext<'a> {
    pub dataset: &'a Dataset,
    pub numeric_columns: Vec<usize>,
    pub textual_columns: Vec<usize>,
    pub missing: MissingValues,
}

impl<'a> ChartContext<'a> {
    pub fn new(dataset: &'a Dataset, types: &DataTypes) -> Self {
        let (numeric_columns, textual_columns): (Vec<usize>, Vec<usize>) =
            (0..dataset.column_count()).partition(|&idx| {
                types
                    .get(&dataset.columns()[idx])
                    .is_some_and(ColumnKind::is_numeric)
            });
        Self {
            dataset,
            numeric_columns,
            textual_columns,
            missing: count_missing(dataset),
        }
    }

    fn column_name(&self, idx: usize) -> &str {
        &self.dataset.columns()[idx]
    }

    fn numbers(&self, idx: usize) -> Vec<f64> {
        self.dataset
            .column_values(idx)
            .filter_map(|value| value.as_number())
            .collect()
    }

    /// Sums of the leading numeric columns, keeping only nonzero totals.
    fn category_sums(&self) -> Vec<(String, f64)> {
        self.numeric_columns
            .iter()
            .take(CATEGORY_COLUMN_LIMIT)
            .filter_map(|&idx| {
                let sum: f64 = self.numbers(idx).iter().sum();
                (sum != 0.0).then(|| (display_name(self.column_name(idx)), round2(sum)))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    /// The rule's precondition does not hold for this dataset.
    NotApplicable,
    /// The rule applied but the data did not meet its thresholds.
    Skipped,
    Produced(ChartSpecification),
}

pub trait ChartRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn try_produce(&self, ctx: &ChartContext<'_>) -> RuleOutcome;
}

/// Tries each inner rule in order and stops at the first one whose
/// precondition holds, whether or not it ends up producing a chart.
pub struct FirstApplicable {
    name: &'static str,
    rules: Vec<Box<dyn ChartRule>>,
}

impl FirstApplicable {
    pub fn new(name: &'static str, rules: Vec<Box<dyn ChartRule>>) -> Self {
        Self { name, rules }
    }
}

impl ChartRule for FirstApplicable {
    fn name(&self) -> &'static str {
        self.name
    }

    fn try_produce(&self, ctx: &ChartContext<'_>) -> RuleOutcome {
        for rule in &self.rules {
            match rule.try_produce(ctx) {
                RuleOutcome::NotApplicable => continue,
                outcome => {
                    debug!("Rule '{}' selected '{}'", self.name, rule.name());
                    return outcome;
                }
            }
        }
        RuleOutcome::NotApplicable
    }
}

pub struct CategoryShareRule;

impl ChartRule for CategoryShareRule {
    fn name(&self) -> &'static str {
        "category-share"
    }

    fn try_produce(&self, ctx: &ChartContext<'_>) -> RuleOutcome {
        let sums = ctx.category_sums();
        if sums.is_empty() {
            return RuleOutcome::NotApplicable;
        }
        let kind = if sums.len() > PIE_SLICE_LIMIT {
            ChartKind::Donut
        } else {
            ChartKind::Pie
        };
        let data = sums
            .into_iter()
            .map(|(name, value)| {
                record(vec![
                    ("name", JsonValue::String(name)),
                    ("value", number_to_json(value)),
                ])
            })
            .collect();
        RuleOutcome::Produced(ChartSpecification {
            id: "chart-category-share".to_string(),
            kind,
            title: "Distribution by Category".to_string(),
            config: ChartConfig::axes("name", "value"),
            data,
        })
    }
}

pub struct CategoryBarRule;

impl ChartRule for CategoryBarRule {
    fn name(&self) -> &'static str {
        "category-bar"
    }

    fn try_produce(&self, ctx: &ChartContext<'_>) -> RuleOutcome {
        let sums = ctx.category_sums();
        if sums.is_empty() {
            return RuleOutcome::NotApplicable;
        }
        let data = sums
            .into_iter()
            .map(|(name, value)| bar_record(name, number_to_json(value)))
            .collect();
        RuleOutcome::Produced(ChartSpecification {
            id: "chart-category-bar".to_string(),
            kind: ChartKind::Bar,
            title: "Values by Category".to_string(),
            config: ChartConfig::axes("state", "value"),
            data,
        })
    }
}

pub struct MissingValuesRule;

impl ChartRule for MissingValuesRule {
    fn name(&self) -> &'static str {
        "missing-values"
    }

    fn try_produce(&self, ctx: &ChartContext<'_>) -> RuleOutcome {
        let incomplete = ctx
            .missing
            .iter()
            .filter(|(_, missing)| **missing > 0)
            .sorted_by(|a, b| b.1.cmp(a.1))
            .take(MISSING_COLUMN_LIMIT)
            .map(|(name, missing)| bar_record(display_name(name), JsonValue::from(*missing)))
            .collect::<Vec<_>>();
        if incomplete.is_empty() {
            return RuleOutcome::NotApplicable;
        }
        RuleOutcome::Produced(ChartSpecification {
            id: "chart-missing-values".to_string(),
            kind: ChartKind::Bar,
            title: "Columns with Most Missing Values".to_string(),
            config: ChartConfig::axes("state", "value"),
            data: incomplete,
        })
    }
}

/// Top values of one text column as a bar chart.
///
/// With `skip_identifiers` the rule only considers columns whose names do not
/// look like identifiers and requires fewer distinct values than rows.
/// Without it, any text column qualifies but must have between two and
/// fifteen distinct values.
pub struct CategoricalBreakdownRule {
    pub skip_identifiers: bool,
}

impl ChartRule for CategoricalBreakdownRule {
    fn name(&self) -> &'static str {
        if self.skip_identifiers {
            "categorical-breakdown"
        } else {
            "categorical-fallback"
        }
    }

    fn try_produce(&self, ctx: &ChartContext<'_>) -> RuleOutcome {
        let Some(&idx) = ctx
            .textual_columns
            .iter()
            .find(|&&idx| !self.skip_identifiers || !is_identifier_like(ctx.column_name(idx)))
        else {
            return RuleOutcome::NotApplicable;
        };
        let table = FrequencyTable::count_all(ctx.dataset.column_values(idx));
        let distinct = table.distinct();
        let within_bounds = if self.skip_identifiers {
            distinct > 0 && distinct < ctx.dataset.row_count()
        } else {
            distinct > 1 && distinct <= FALLBACK_MAX_DISTINCT
        };
        if !within_bounds {
            debug!(
                "Column '{}' has {distinct} distinct value(s); no categorical chart",
                ctx.column_name(idx)
            );
            return RuleOutcome::Skipped;
        }
        let data = table
            .top(CATEGORY_TOP_VALUES)
            .into_iter()
            .map(|(value, count)| bar_record(value.to_string(), JsonValue::from(count)))
            .collect();
        RuleOutcome::Produced(ChartSpecification {
            id: "chart-categorical".to_string(),
            kind: ChartKind::Bar,
            title: format!("Top {} by Count", display_name(ctx.column_name(idx))),
            config: ChartConfig::axes("state", "value"),
            data,
        })
    }
}

pub struct HistogramRule;

impl ChartRule for HistogramRule {
    fn name(&self) -> &'static str {
        "histogram"
    }

    fn try_produce(&self, ctx: &ChartContext<'_>) -> RuleOutcome {
        let Some(&idx) = ctx.numeric_columns.first() else {
            return RuleOutcome::NotApplicable;
        };
        let column = ctx.column_name(idx);
        let values = ctx.numbers(idx);
        let (min, max) = match values.iter().copied().minmax() {
            MinMaxResult::NoElements => return RuleOutcome::Skipped,
            MinMaxResult::OneElement(only) => (only, only),
            MinMaxResult::MinMax(min, max) => (min, max),
        };
        let mut width = (max - min) / HISTOGRAM_BINS as f64;
        if !width.is_finite() {
            width = max / HISTOGRAM_BINS as f64 - min / HISTOGRAM_BINS as f64;
        }
        let step = if width > 0.0 { width } else { 1.0 };

        let mut counts = [0usize; HISTOGRAM_BINS];
        for value in &values {
            let bin = ((value - min) / step).floor() as usize;
            counts[bin.min(HISTOGRAM_BINS - 1)] += 1;
        }
        let data = counts
            .iter()
            .enumerate()
            .map(|(bin, count)| {
                let lower = min + bin as f64 * step;
                record(vec![
                    (column, number_to_json(round2(lower))),
                    ("count", JsonValue::from(*count)),
                ])
            })
            .collect();
        RuleOutcome::Produced(ChartSpecification {
            id: "chart-histogram".to_string(),
            kind: ChartKind::Histogram,
            title: format!("Distribution of {}", display_name(column)),
            config: ChartConfig {
                bins: Some(HISTOGRAM_BINS),
                ..ChartConfig::axes(column, "count")
            },
            data,
        })
    }
}

pub struct CumulativeTrendRule;

impl ChartRule for CumulativeTrendRule {
    fn name(&self) -> &'static str {
        "cumulative-trend"
    }

    fn try_produce(&self, ctx: &ChartContext<'_>) -> RuleOutcome {
        let row_count = ctx.dataset.row_count();
        let Some(&idx) = ctx.numeric_columns.first() else {
            return RuleOutcome::NotApplicable;
        };
        if row_count < TREND_MIN_ROWS {
            return RuleOutcome::NotApplicable;
        }
        let stride = (row_count / TREND_MAX_POINTS).max(1);
        let mut cumulative = 0.0;
        let mut data = Vec::new();
        for (slot, row) in (0..row_count)
            .step_by(stride)
            .take(TREND_MAX_POINTS)
            .enumerate()
        {
            let Some(value) = ctx.dataset.value(row, idx).as_number() else {
                continue;
            };
            cumulative += value;
            data.push(record(vec![
                ("index", JsonValue::from(slot + 1)),
                ("label", JsonValue::String(format!("Segment {}", slot + 1))),
                ("value", number_to_json(value)),
                ("cumulative", number_to_json(round2(cumulative))),
            ]));
        }
        if data.len() < TREND_MIN_POINTS {
            return RuleOutcome::Skipped;
        }
        RuleOutcome::Produced(ChartSpecification {
            id: "chart-area-trend".to_string(),
            kind: ChartKind::Area,
            title: format!(
                "Cumulative Trend: {}",
                display_name(ctx.column_name(idx))
            ),
            config: ChartConfig::axes("label", "cumulative"),
            data,
        })
    }
}

pub struct ScatterRule;

impl ChartRule for ScatterRule {
    fn name(&self) -> &'static str {
        "scatter"
    }

    fn try_produce(&self, ctx: &ChartContext<'_>) -> RuleOutcome {
        let row_count = ctx.dataset.row_count();
        let (&x_idx, &y_idx) = match ctx.numeric_columns.as_slice() {
            [x, y, ..] if row_count >= SCATTER_MIN_ROWS => (x, y),
            _ => return RuleOutcome::NotApplicable,
        };
        let x_name = ctx.column_name(x_idx);
        let y_name = ctx.column_name(y_idx);
        let sample_size = SCATTER_MAX_POINTS.min(row_count);
        let stride = (row_count / sample_size).max(1);

        let mut data = Vec::new();
        for row in (0..row_count).step_by(stride) {
            if data.len() >= sample_size {
                break;
            }
            let x = ctx.dataset.value(row, x_idx).as_number();
            let y = ctx.dataset.value(row, y_idx).as_number();
            if let (Some(x), Some(y)) = (x, y) {
                data.push(record(vec![
                    (x_name, number_to_json(x)),
                    (y_name, number_to_json(y)),
                ]));
            }
        }
        if data.len() < SCATTER_MIN_POINTS {
            return RuleOutcome::Skipped;
        }
        RuleOutcome::Produced(ChartSpecification {
            id: "chart-scatter".to_string(),
            kind: ChartKind::Scatter,
            title: format!("{} vs {}", display_name(x_name), display_name(y_name)),
            config: ChartConfig::axes(x_name, y_name),
            data,
        })
    }
}

pub struct CategoricalLineRule;

impl ChartRule for CategoricalLineRule {
    fn name(&self) -> &'static str {
        "categorical-line"
    }

    fn try_produce(&self, ctx: &ChartContext<'_>) -> RuleOutcome {
        let Some(&idx) = ctx.textual_columns.first() else {
            return RuleOutcome::NotApplicable;
        };
        let table = FrequencyTable::count_all(ctx.dataset.column_values(idx));
        let top = table.top(LINE_TOP_VALUES);
        if top.len() < LINE_MIN_VALUES {
            return RuleOutcome::Skipped;
        }
        let data = top
            .into_iter()
            .enumerate()
            .map(|(rank, (value, count))| {
                record(vec![
                    ("index", JsonValue::from(rank + 1)),
                    ("name", JsonValue::String(value.to_string())),
                    ("value", JsonValue::from(count)),
                    ("label", JsonValue::String(value.to_string())),
                ])
            })
            .collect();
        RuleOutcome::Produced(ChartSpecification {
            id: "chart-line-categorical".to_string(),
            kind: ChartKind::Line,
            title: format!("Trend: {} Counts", display_name(ctx.column_name(idx))),
            config: ChartConfig::axes("name", "value"),
            data,
        })
    }
}

pub fn default_rules() -> Vec<Box<dyn ChartRule>> {
    vec![
        Box::new(CategoryShareRule),
        Box::new(CategoryBarRule),
        Box::new(FirstApplicable::new(
            "quality-or-category",
            vec![
                Box::new(MissingValuesRule),
                Box::new(CategoricalBreakdownRule {
                    skip_identifiers: true,
                }),
                Box::new(CategoricalBreakdownRule {
                    skip_identifiers: false,
                }),
            ],
        )),
        Box::new(HistogramRule),
        Box::new(CumulativeTrendRule),
        Box::new(ScatterRule),
        Box::new(CategoricalLineRule),
    ]
}

pub struct ChartDeriver {
    rules: Vec<Box<dyn ChartRule>>,
    max_charts: usize,
}

impl Default for ChartDeriver {
    fn default() -> Self {
        Self::with_rules(default_rules())
    }
}

impl ChartDeriver {
    pub fn with_rules(rules: Vec<Box<dyn ChartRule>>) -> Self {
        Self {
            rules,
            max_charts: MAX_CHARTS,
        }
    }

    pub fn derive(&self, dataset: &Dataset, types: &DataTypes) -> Vec<ChartSpecification> {
        let ctx = ChartContext::new(dataset, types);
        let mut charts = Vec::new();
        for rule in &self.rules {
            if charts.len() >= self.max_charts {
                debug!("Chart limit of {} reached before '{}'", self.max_charts, rule.name());
                break;
            }
            match rule.try_produce(&ctx) {
                RuleOutcome::Produced(chart) => {
                    debug!("Rule '{}' produced {}", rule.name(), chart.id);
                    charts.push(chart);
                }
                RuleOutcome::Skipped => debug!("Rule '{}' skipped", rule.name()),
                RuleOutcome::NotApplicable => debug!("Rule '{}' not applicable", rule.name()),
            }
        }
        charts
    }
}

pub fn derive_charts(dataset: &Dataset, types: &DataTypes) -> Vec<ChartSpecification> {
    ChartDeriver::default().derive(dataset, types)
}

/// Case-insensitive match against common identifier column names, ignoring
/// separators such as `_`, `-`, spaces and dots.
pub fn is_identifier_like(column: &str) -> bool {
    let compact = column
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' ' | '.'))
        .collect::<String>();
    IDENTIFIER_LIKE.is_match(&compact)
}

fn record(fields: Vec<(&str, JsonValue)>) -> Record {
    fields
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn bar_record(label: String, value: JsonValue) -> Record {
    record(vec![("state", JsonValue::String(label)), ("value", value)])
}
