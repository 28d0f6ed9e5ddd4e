use crate::{
    config::DEFAULT_PREVIEW_ROWS,
    data::{Record, Value},
    parser::Dataset,
};

/// First `limit` rows as plain records, in file order. Always a prefix.
pub fn preview_rows(dataset: &Dataset, limit: Option<usize>) -> Vec<Record> {
    let limit = limit.unwrap_or(DEFAULT_PREVIEW_ROWS);
    (0..dataset.row_count().min(limit))
        .map(|row| dataset.record(row))
        .collect()
}

/// First `limit` rows as display strings for terminal tables.
pub fn preview_table(dataset: &Dataset, limit: usize) -> Vec<Vec<String>> {
    dataset
        .rows()
        .iter()
        .take(limit)
        .map(|row| row.iter().map(Value::as_display).collect())
        .collect()
}

/// One line per row with cells joined by `", "`, used as the sample-data
/// block handed to the text-generation service.
pub fn sample_lines(dataset: &Dataset, limit: usize) -> String {
    preview_table(dataset, limit)
        .iter()
        .map(|cells| cells.join(", "))
        .collect::<Vec<_>>()
        .join("\n")
}
