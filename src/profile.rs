//! Distribution profile for numeric columns: median, sample standard
//! deviation, and z-score outliers, plus a direction-of-travel trend for
//! numeric columns when the dataset has a date-like column. Reported next to
//! the aggregate statistics rather than inside them.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::debug;
use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{
    data::ColumnMap,
    inference::DataTypes,
    parser::Dataset,
};

const MIN_VALUES_FOR_ANOMALIES: usize = 3;
const TREND_COLUMN_LIMIT: usize = 3;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetProfile {
    pub columns: ColumnMap<NumericProfile>,
    pub trends: TrendSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
}

/// Serializes as `{ "time_series_columns": [...], "<column>_trend": "increasing" }`;
/// an empty object when no column looks like a date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendSummary {
    pub time_series_columns: Vec<String>,
    pub directions: ColumnMap<TrendDirection>,
}

impl Serialize for TrendSummary {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        if !self.time_series_columns.is_empty() {
            map.serialize_entry("time_series_columns", &self.time_series_columns)?;
        }
        for (column, direction) in self.directions.iter() {
            map.serialize_entry(&format!("{column}_trend"), direction)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericProfile {
    pub median: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
    pub anomaly_count: usize,
    pub anomaly_percentage: f64,
    pub anomaly_values: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct ProfileOptions {
    pub z_threshold: f64,
    pub sample_limit: usize,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            z_threshold: 2.0,
            sample_limit: 5,
        }
    }
}

pub fn profile_dataset(
    dataset: &Dataset,
    types: &DataTypes,
    options: &ProfileOptions,
) -> DatasetProfile {
    DatasetProfile {
        columns: profile_numeric_columns(dataset, types, options),
        trends: detect_trends(dataset, types),
    }
}

pub fn profile_numeric_columns(
    dataset: &Dataset,
    types: &DataTypes,
    options: &ProfileOptions,
) -> ColumnMap<NumericProfile> {
    let mut profiles = ColumnMap::new();
    for (idx, name) in dataset.columns().iter().enumerate() {
        if !types.get(name).is_some_and(|kind| kind.is_numeric()) {
            continue;
        }
        let values = dataset
            .column_values(idx)
            .filter_map(|value| value.as_number())
            .collect::<Vec<_>>();
        if let Some(profile) = profile_values(&values, options) {
            profiles.insert(name.clone(), profile);
        }
    }
    profiles
}

pub fn profile_values(values: &[f64], options: &ProfileOptions) -> Option<NumericProfile> {
    let median = median(values)?;
    let std_dev = std_dev(values);
    let mut anomalies = Vec::new();
    if values.len() >= MIN_VALUES_FOR_ANOMALIES
        && let Some(sd) = std_dev.filter(|sd| *sd > 0.0)
    {
        let mean = mean(values);
        anomalies = values
            .iter()
            .copied()
            .filter(|value| ((value - mean) / sd).abs() > options.z_threshold)
            .collect();
    }
    let anomaly_count = anomalies.len();
    anomalies.truncate(options.sample_limit);
    Some(NumericProfile {
        median,
        std_dev,
        anomaly_count,
        anomaly_percentage: anomaly_count as f64 / values.len() as f64 * 100.0,
        anomaly_values: anomalies,
    })
}

/// Textual columns whose non-missing values all read as dates or timestamps
/// are time-series columns. Rows are ordered by the first of them (rows
/// without a date last) and a least-squares slope over row position gives
/// the direction for each of the first three numeric columns. Missing
/// numbers carry the previous value forward; a flat slope reads as
/// decreasing.
pub fn detect_trends(dataset: &Dataset, types: &DataTypes) -> TrendSummary {
    let date_columns = dataset
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, name)| !types.get(name).is_some_and(|kind| kind.is_numeric()))
        .filter(|(idx, _)| is_date_column(dataset, *idx))
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    let Some(&date_idx) = date_columns.first() else {
        return TrendSummary::default();
    };

    let mut order = (0..dataset.row_count())
        .map(|row| (parse_timestamp(&dataset.value(row, date_idx).as_display()), row))
        .collect::<Vec<_>>();
    order.sort_by_key(|(stamp, _)| (stamp.is_none(), *stamp));

    let mut directions = ColumnMap::new();
    let numeric = dataset
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, name)| types.get(name).is_some_and(|kind| kind.is_numeric()))
        .take(TREND_COLUMN_LIMIT);
    for (idx, name) in numeric {
        let mut carried = None;
        let mut points = Vec::new();
        for (position, (_, row)) in order.iter().enumerate() {
            if let Some(value) = dataset.value(*row, idx).as_number() {
                carried = Some(value);
            }
            if let Some(value) = carried {
                points.push((position as f64, value));
            }
        }
        if let Some(slope) = slope(&points) {
            let direction = if slope > 0.0 {
                TrendDirection::Increasing
            } else {
                TrendDirection::Decreasing
            };
            debug!("Column '{name}' trends {direction:?} (slope {slope})");
            directions.insert(name.clone(), direction);
        }
    }

    TrendSummary {
        time_series_columns: date_columns
            .iter()
            .map(|&idx| dataset.columns()[idx].clone())
            .collect(),
        directions,
    }
}

fn is_date_column(dataset: &Dataset, idx: usize) -> bool {
    let mut seen = false;
    for value in dataset.column_values(idx).filter(|value| !value.is_missing()) {
        if parse_timestamp(&value.as_display()).is_none() {
            return false;
        }
        seen = true;
    }
    seen
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn slope(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let (sxy, sxx) = points.iter().fold((0.0, 0.0), |(sxy, sxx), (x, y)| {
        (sxy + (x - mean_x) * (y - mean_y), sxx + (x - mean_x) * (x - mean_x))
    });
    (sxx > 0.0).then(|| sxy / sxx)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len().is_multiple_of(2) {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn std_dev(values: &[f64]) -> Option<f64> {
    let count = values.len();
    if count < 2 {
        return None;
    }
    let mean = mean(values);
    let sum_squares = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>();
    Some((sum_squares / (count as f64 - 1.0)).max(0.0).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::ColumnKind;

    #[test]
    fn median_handles_odd_and_even_counts() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn std_dev_uses_sample_denominator() {
        let sd = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.138_089_935).abs() < 1e-6);
        assert_eq!(std_dev(&[1.0]), None);
    }

    #[test]
    fn outliers_beyond_threshold_are_reported() {
        let mut values = vec![10.0; 19];
        values.push(100.0);
        let profile = profile_values(&values, &ProfileOptions::default()).unwrap();
        assert_eq!(profile.anomaly_count, 1);
        assert_eq!(profile.anomaly_values, vec![100.0]);
        assert!((profile.anomaly_percentage - 5.0).abs() < 1e-9);
    }

    #[test]
    fn constant_columns_have_no_anomalies() {
        let profile = profile_values(&[4.0, 4.0, 4.0], &ProfileOptions::default()).unwrap();
        assert_eq!(profile.std_dev, Some(0.0));
        assert_eq!(profile.anomaly_count, 0);
    }

    #[test]
    fn only_numeric_columns_with_values_are_profiled() {
        let dataset = Dataset::from_text_rows(
            &["v", "label", "blank"],
            &[vec!["1", "a", "x"], vec!["3", "b", "y"]],
        );
        let mut types = DataTypes::new();
        types.insert("v", ColumnKind::Number);
        types.insert("label", ColumnKind::String);
        types.insert("blank", ColumnKind::Number);
        let profiles = profile_numeric_columns(&dataset, &types, &ProfileOptions::default());
        assert_eq!(profiles.keys().collect::<Vec<_>>(), vec!["v"]);
        assert_eq!(profiles.get("v").unwrap().median, 2.0);
    }

    fn kinds(entries: &[(&str, ColumnKind)]) -> DataTypes {
        let mut types = DataTypes::new();
        for (name, kind) in entries {
            types.insert(*name, *kind);
        }
        types
    }

    #[test]
    fn timestamps_parse_in_common_layouts() {
        let midnight = NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-05"), Some(midnight));
        assert_eq!(parse_timestamp("03/05/2024"), Some(midnight));
        assert_eq!(parse_timestamp("2024/03/05"), Some(midnight));
        assert_eq!(
            parse_timestamp("2024-03-05T10:30:00"),
            midnight.checked_add_signed(chrono::Duration::minutes(630))
        );
        assert_eq!(
            parse_timestamp("2024-03-05T10:30:00+02:00"),
            midnight.checked_add_signed(chrono::Duration::minutes(510))
        );
        assert_eq!(parse_timestamp("March"), None);
        assert_eq!(parse_timestamp("  "), None);
    }

    #[test]
    fn trends_follow_date_order_not_row_order() {
        let dataset = Dataset::from_text_rows(
            &["day", "sales", "returns"],
            &[
                vec!["2024-01-03", "30", "1"],
                vec!["2024-01-01", "10", "5"],
                vec!["2024-01-02", "20", "3"],
            ],
        );
        let types = kinds(&[
            ("day", ColumnKind::String),
            ("sales", ColumnKind::Number),
            ("returns", ColumnKind::Number),
        ]);
        let trends = detect_trends(&dataset, &types);
        assert_eq!(trends.time_series_columns, vec!["day"]);
        assert_eq!(trends.directions.get("sales"), Some(&TrendDirection::Increasing));
        assert_eq!(trends.directions.get("returns"), Some(&TrendDirection::Decreasing));
        assert_eq!(
            serde_json::to_value(&trends).unwrap(),
            serde_json::json!({
                "time_series_columns": ["day"],
                "sales_trend": "increasing",
                "returns_trend": "decreasing"
            })
        );
    }

    #[test]
    fn missing_values_carry_forward_and_flat_reads_as_decreasing() {
        let dataset = Dataset::from_text_rows(
            &["when", "level", "flat"],
            &[
                vec!["2024-02-01", "", "7"],
                vec!["2024-02-02", "4", "7"],
                vec!["2024-02-03", "", "7"],
                vec!["2024-02-04", "9", "7"],
            ],
        );
        let types = kinds(&[
            ("when", ColumnKind::String),
            ("level", ColumnKind::Number),
            ("flat", ColumnKind::Number),
        ]);
        let trends = detect_trends(&dataset, &types);
        assert_eq!(trends.directions.get("level"), Some(&TrendDirection::Increasing));
        assert_eq!(trends.directions.get("flat"), Some(&TrendDirection::Decreasing));
    }

    #[test]
    fn only_first_three_numeric_columns_get_trends() {
        let dataset = Dataset::from_text_rows(
            &["d", "a", "b", "c", "e"],
            &[
                vec!["2024-01-01", "1", "1", "1", "1"],
                vec!["2024-01-02", "2", "2", "2", "2"],
            ],
        );
        let mut types = kinds(&[("d", ColumnKind::String)]);
        for name in ["a", "b", "c", "e"] {
            types.insert(name, ColumnKind::Number);
        }
        let trends = detect_trends(&dataset, &types);
        assert_eq!(trends.directions.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn no_trends_without_a_fully_date_like_column() {
        let dataset = Dataset::from_text_rows(
            &["d", "v"],
            &[vec!["2024-01-01", "1"], vec!["soon", "2"]],
        );
        let types = kinds(&[("d", ColumnKind::String), ("v", ColumnKind::Number)]);
        let trends = detect_trends(&dataset, &types);
        assert_eq!(trends, TrendSummary::default());
        assert_eq!(serde_json::to_value(&trends).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn every_date_column_is_listed_but_the_first_orders_rows() {
        let dataset = Dataset::from_text_rows(
            &["opened", "closed", "v"],
            &[
                vec!["2024-01-02", "2024-05-01", "1"],
                vec!["2024-01-01", "2024-06-01", "5"],
            ],
        );
        let types = kinds(&[
            ("opened", ColumnKind::String),
            ("closed", ColumnKind::String),
            ("v", ColumnKind::Number),
        ]);
        let trends = detect_trends(&dataset, &types);
        assert_eq!(trends.time_series_columns, vec!["opened", "closed"]);
        assert_eq!(trends.directions.get("v"), Some(&TrendDirection::Decreasing));
    }

    #[test]
    fn single_row_has_no_direction() {
        let dataset = Dataset::from_text_rows(&["d", "v"], &[vec!["2024-01-01", "3"]]);
        let types = kinds(&[("d", ColumnKind::String), ("v", ColumnKind::Number)]);
        let trends = detect_trends(&dataset, &types);
        assert_eq!(trends.time_series_columns, vec!["d"]);
        assert!(trends.directions.is_empty());
    }
}
