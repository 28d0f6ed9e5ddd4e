use std::collections::HashMap;

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::data::Value;

/// Label used for absent cells when every row must be accounted for.
pub const ABSENT_LABEL: &str = "Unknown";

/// Value counts keyed by exact string representation. Entries keep the
/// order in which values were first seen, so ties in [`FrequencyTable::top`]
/// and the serialized form are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    entries: Vec<(String, usize)>,
    positions: HashMap<String, usize>,
    total: usize,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts only non-missing values.
    pub fn count_present<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut table = Self::new();
        for value in values {
            if !value.is_missing() {
                table.record(&value.as_display());
            }
        }
        table
    }

    /// Counts every row; absent cells are tallied under [`ABSENT_LABEL`].
    pub fn count_all<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut table = Self::new();
        for value in values {
            match value {
                Value::Null => table.record(ABSENT_LABEL),
                other => table.record(&other.as_display()),
            }
        }
        table
    }

    pub fn record(&mut self, value: &str) {
        self.total += 1;
        match self.positions.get(value) {
            Some(&pos) => self.entries[pos].1 += 1,
            None => {
                self.positions.insert(value.to_string(), self.entries.len());
                self.entries.push((value.to_string(), 1));
            }
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn distinct(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, value: &str) -> Option<usize> {
        self.positions.get(value).map(|&pos| self.entries[pos].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries
            .iter()
            .map(|(value, count)| (value.as_str(), *count))
    }

    /// Most frequent values first; equal counts keep first-seen order.
    /// A `limit` of zero returns every value.
    pub fn top(&self, limit: usize) -> Vec<(&str, usize)> {
        let mut items = self.iter().collect::<Vec<_>>();
        items.sort_by(|a, b| b.1.cmp(&a.1));
        if limit > 0 && items.len() > limit {
            items.truncate(limit);
        }
        items
    }
}

impl Serialize for FrequencyTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (value, count) in &self.entries {
            map.serialize_entry(value, count)?;
        }
        map.end()
    }
}
