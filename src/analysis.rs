//! End-to-end analysis of one upload: parse, infer, aggregate, derive charts.
//!
//! Everything here is synchronous and request-local. The only inputs are the
//! bytes and the filename; the outputs are immutable values ready to be
//! serialized for persistence or prompt construction.

use log::{debug, warn};
use serde::Serialize;

use crate::{
    charts::{ChartSpecification, derive_charts},
    config::AnalysisOptions,
    data::Record,
    error::Result,
    inference::{DataTypes, infer_types},
    parser::{Dataset, parse_bytes},
    preview::preview_rows,
    profile::{DatasetProfile, ProfileOptions, profile_dataset},
    stats::{MissingValues, Statistics, compute_statistics, count_missing},
    store::{BlobHandle, BlobStore},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub data_types: DataTypes,
    pub missing_values: MissingValues,
    pub statistics: Statistics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub data_summary: DataSummary,
    pub charts: Vec<ChartSpecification>,
    pub preview: Vec<Record>,
    pub profile: DatasetProfile,
}

pub fn summarize(dataset: &Dataset, types: DataTypes) -> DataSummary {
    DataSummary {
        rows: dataset.row_count(),
        columns: dataset.column_count(),
        column_names: dataset.columns().to_vec(),
        missing_values: count_missing(dataset),
        statistics: compute_statistics(dataset, &types),
        data_types: types,
    }
}

pub fn analyze_dataset(dataset: &Dataset, options: &AnalysisOptions) -> Analysis {
    if dataset.require_columns().is_err() {
        warn!("Dataset has no columns; producing empty analysis");
    }
    let types = infer_types(dataset, &options.inference);
    let charts = derive_charts(dataset, &types);
    let profile = profile_dataset(
        dataset,
        &types,
        &ProfileOptions {
            z_threshold: options.anomaly_z_threshold,
            sample_limit: options.anomaly_sample_limit,
        },
    );
    let data_summary = summarize(dataset, types);
    debug!(
        "Analysis produced {} statistic(s) and {} chart(s)",
        data_summary.statistics.len(),
        charts.len()
    );
    Analysis {
        data_summary,
        charts,
        preview: preview_rows(dataset, Some(options.preview_rows)),
        profile,
    }
}

pub fn analyze_bytes(bytes: &[u8], filename: &str, options: &AnalysisOptions) -> Result<Analysis> {
    let dataset = parse_bytes(bytes, filename)?;
    Ok(analyze_dataset(&dataset, options))
}

pub fn analyze_blob(
    store: &dyn BlobStore,
    handle: &BlobHandle,
    filename: &str,
    options: &AnalysisOptions,
) -> Result<Analysis> {
    let bytes = store.get(handle)?;
    analyze_bytes(&bytes, filename, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::AnalysisError, inference::ColumnKind, store::MemoryBlobStore};

    #[test]
    fn summary_matches_mixed_numeric_scenario() {
        let analysis =
            analyze_bytes(b"a,b\n1,2\n3,4\n5,x\n", "data.csv", &AnalysisOptions::default())
                .unwrap();
        let summary = &analysis.data_summary;
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.columns, 2);
        assert_eq!(summary.data_types.get("b"), Some(&ColumnKind::Number));
        assert_eq!(summary.missing_values.get("a"), Some(&0));
        let json = serde_json::to_value(summary.statistics.get("b").unwrap()).unwrap();
        assert_eq!(json["sum"], 6.0);
        assert_eq!(json["count"], 2);
    }

    #[test]
    fn empty_column_is_textual_with_no_counts() {
        let analysis =
            analyze_bytes(b"a,b\n1,\n2,\n", "data.csv", &AnalysisOptions::default()).unwrap();
        let summary = &analysis.data_summary;
        assert_eq!(summary.data_types.get("b"), Some(&ColumnKind::String));
        assert_eq!(summary.missing_values.get("b"), Some(&2));
        assert_eq!(
            serde_json::to_value(summary.statistics.get("b").unwrap()).unwrap(),
            serde_json::json!({ "count": 0, "value_counts": {} })
        );
    }

    #[test]
    fn separator_only_row_is_counted_as_missing() {
        let analysis =
            analyze_bytes(b"a,b\n1,2\n,\n3,4\n", "x.csv", &AnalysisOptions::default()).unwrap();
        let summary = &analysis.data_summary;
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.missing_values.get("a"), Some(&1));
        assert_eq!(summary.missing_values.get("b"), Some(&1));
        assert!(analysis.charts.iter().any(|c| c.id == "chart-missing-values"));
    }

    #[test]
    fn dated_rows_report_numeric_trends() {
        let analysis = analyze_bytes(
            b"day,sales\n2024-01-02,5\n2024-01-01,9\n2024-01-03,4\n",
            "daily.csv",
            &AnalysisOptions::default(),
        )
        .unwrap();
        let json = serde_json::to_value(&analysis.profile).unwrap();
        assert_eq!(
            json["trends"],
            serde_json::json!({"time_series_columns": ["day"], "sales_trend": "decreasing"})
        );
        assert_eq!(json["columns"]["sales"]["median"], 5.0);
    }

    #[test]
    fn empty_input_produces_empty_outputs() {
        let analysis = analyze_bytes(b"", "empty.csv", &AnalysisOptions::default()).unwrap();
        assert_eq!(analysis.data_summary.rows, 0);
        assert!(analysis.data_summary.column_names.is_empty());
        assert!(analysis.charts.is_empty());
        assert!(analysis.preview.is_empty());
    }

    #[test]
    fn unsupported_extension_propagates() {
        assert!(matches!(
            analyze_bytes(b"{}", "data.json", &AnalysisOptions::default()),
            Err(AnalysisError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn blob_analysis_reads_through_store() {
        let store = MemoryBlobStore::default();
        let handle = store.put(b"x,y\n1,2\n").unwrap();
        let analysis =
            analyze_blob(&store, &handle, "upload.csv", &AnalysisOptions::default()).unwrap();
        assert_eq!(analysis.data_summary.column_names, vec!["x", "y"]);
    }

    #[test]
    fn summary_serializes_in_documented_shape() {
        let analysis = analyze_bytes(b"k,v\na,1\n", "d.csv", &AnalysisOptions::default()).unwrap();
        let json = serde_json::to_value(&analysis.data_summary).unwrap();
        let keys = json.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec![
                "rows",
                "columns",
                "column_names",
                "data_types",
                "missing_values",
                "statistics"
            ]
        );
        assert_eq!(json["data_types"], serde_json::json!({"k": "string", "v": "number"}));
    }
}
