//! Column type inference.
//!
//! Each column is classified once for the whole dataset by looking at its
//! first non-missing values in row order. The default sample size of one
//! reproduces the single-representative heuristic: the first value decides.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    config::InferenceOptions,
    data::{ColumnMap, Value},
    parser::Dataset,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Number,
    String,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Number => "number",
            ColumnKind::String => "string",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnKind::Number)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type DataTypes = ColumnMap<ColumnKind>;

pub fn infer_types(dataset: &Dataset, options: &InferenceOptions) -> DataTypes {
    dataset
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let kind = infer_column(dataset.column_values(idx), options.sample_size);
            debug!("Column '{name}' inferred as {kind}");
            (name.clone(), kind)
        })
        .collect()
}

/// A column with no usable sample stays textual since it cannot be shown to
/// be numeric.
pub fn infer_column<'a, I>(values: I, sample_size: usize) -> ColumnKind
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut sampled = 0usize;
    let mut numeric = 0usize;
    for value in values
        .into_iter()
        .filter(|value| !value.is_missing())
        .take(sample_size.max(1))
    {
        sampled += 1;
        if value.as_number().is_some() {
            numeric += 1;
        }
    }
    if sampled > 0 && numeric * 2 > sampled {
        ColumnKind::Number
    } else {
        ColumnKind::String
    }
}
