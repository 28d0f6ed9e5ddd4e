//! Tabular parsing of uploaded CSV and spreadsheet bytes.
//!
//! The filename extension selects the branch; both branches produce the same
//! [`Dataset`] shape: an ordered list of unique column names plus rows whose
//! cells line up with those columns. Malformed rows are recovered locally
//! (short rows leave trailing cells absent, unreadable rows are skipped) so a
//! single bad line never aborts the whole parse.

use std::{collections::HashSet, io::Cursor};

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use log::{debug, warn};

use crate::{
    data::{Record, Value},
    error::{AnalysisError, Result},
    io_utils::{self, FileFormat},
};

const BLANK_HEADER: &str = "__EMPTY";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Builds a dataset, padding short rows with absent cells and dropping
    /// cells beyond the last column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Convenience constructor for textual rows, as produced by CSV input.
    pub fn from_text_rows<S: AsRef<str>>(columns: &[S], rows: &[Vec<S>]) -> Self {
        let columns = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| Value::Text(cell.as_ref().to_string()))
                    .collect()
            })
            .collect();
        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn value(&self, row: usize, column: usize) -> &Value {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(&Value::Null)
    }

    pub fn column_values(&self, column: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(column).unwrap_or(&Value::Null))
    }

    /// Returns the row as a plain record. Absent cells are omitted, empty
    /// strings are kept.
    pub fn record(&self, row: usize) -> Record {
        let mut record = Record::new();
        if let Some(cells) = self.rows.get(row) {
            for (name, cell) in self.columns.iter().zip(cells) {
                if !matches!(cell, Value::Null) {
                    record.insert(name.clone(), cell.to_json());
                }
            }
        }
        record
    }

    pub fn require_columns(&self) -> Result<()> {
        if self.columns.is_empty() {
            Err(AnalysisError::EmptyOrUnparseableFile)
        } else {
            Ok(())
        }
    }
}

/// Parses raw upload bytes. Only the extension of `filename` is consulted.
pub fn parse_bytes(bytes: &[u8], filename: &str) -> Result<Dataset> {
    let dataset = match io_utils::resolve_format(filename)? {
        FileFormat::Csv => parse_csv(bytes),
        FileFormat::Spreadsheet => parse_spreadsheet(bytes)?,
    };
    debug!(
        "Parsed {} row(s) across {} column(s) from '{}'",
        dataset.row_count(),
        dataset.column_count(),
        filename
    );
    Ok(dataset)
}

pub fn parse_csv(bytes: &[u8]) -> Dataset {
    let mut reader = io_utils::open_csv_reader(io_utils::decoding_reader(bytes));
    let headers = match reader.headers() {
        Ok(headers) => unique_headers(headers.iter().map(str::to_string)),
        Err(err) => {
            warn!("Unable to read CSV header: {err}");
            return Dataset::default();
        }
    };

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!("Skipping unreadable CSV row {}: {err}", idx + 2);
                continue;
            }
        };
        let row = (0..headers.len())
            .map(|col| {
                record
                    .get(col)
                    .map(|field| Value::Text(field.to_string()))
                    .unwrap_or(Value::Null)
            })
            .collect::<Vec<_>>();
        rows.push(row);
    }

    finish(headers, rows)
}

pub fn parse_spreadsheet(bytes: &[u8]) -> Result<Dataset> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|err| AnalysisError::Spreadsheet(err.to_string()))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|err| AnalysisError::Spreadsheet(err.to_string()))?,
        None => return Ok(Dataset::default()),
    };

    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Ok(Dataset::default());
    };
    let headers = unique_headers(header_row.iter().map(header_text));

    let mut rows = Vec::new();
    for cells in sheet_rows {
        let row = (0..headers.len())
            .map(|col| cells.get(col).map(cell_value).unwrap_or(Value::Null))
            .collect::<Vec<_>>();
        if row.iter().all(Value::is_missing) {
            continue;
        }
        rows.push(row);
    }

    Ok(finish(headers, rows))
}

fn finish(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Dataset {
    if rows.is_empty() {
        return Dataset::default();
    }
    Dataset::new(headers, rows)
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::Text(s.clone()),
        Data::Int(i) => Value::Number(*i as f64),
        Data::Float(f) => Value::Number(*f),
        Data::Bool(b) => Value::Boolean(*b),
        Data::DateTime(dt) => Value::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(err) => Value::Text(err.to_string()),
    }
}

/// Blank names become `__EMPTY`; repeats get a numeric suffix so every
/// column name is unique.
fn unique_headers<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut headers = Vec::new();
    for name in names {
        let base = if name.is_empty() {
            BLANK_HEADER.to_string()
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut suffix = 2;
        while seen.contains(&candidate) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        seen.insert(candidate.clone());
        headers.push(candidate);
    }
    headers
}
