use std::fmt;

use serde::{Serialize, Serializer, ser::SerializeMap};

/// A plain, self-contained record as handed to chart renderers and previews.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A single cell. CSV input only ever yields `Text` and `Null`; spreadsheets
/// also produce `Number` and `Boolean`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Number(f64),
    Boolean(bool),
}

impl Value {
    /// Absent cells and empty strings both count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::Number(_) | Value::Boolean(_) => false,
        }
    }

    /// Numeric coercion used by statistics and charts. Failure is not an
    /// error: the value is simply left out of numeric aggregates.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Text(s) => parse_number(s),
            _ => None,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Boolean(b) => b.to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Number(n) => number_to_json(*n),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Boolean(b) => serializer.serialize_bool(*b),
        }
    }
}

/// Parses a textual number, ignoring thousands separators. Only finite
/// results count.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned = if trimmed.contains(',') {
        trimmed.replace(',', "")
    } else {
        trimmed.to_string()
    };
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// Non-finite numbers serialize as `null` rather than producing invalid JSON.
pub fn number_to_json(value: f64) -> serde_json::Value {
    serde_json::Number::from_f64(value)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Rounds to two decimals for chart display values. Magnitudes too large to
/// scale are returned unchanged.
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / 100.0
}

/// Column names with underscores shown as spaces, for chart titles and labels.
pub fn display_name(column: &str) -> String {
    column.replace('_', " ")
}

/// Insertion-ordered map keyed by column name. Serializes as a JSON object
/// whose keys follow dataset column order.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for ColumnMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> ColumnMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Replaces the value in place when the column is already present.
    pub fn insert(&mut self, column: impl Into<String>, value: T) {
        let column = column.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut T)> {
        self.entries
            .iter_mut()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, value)| value)
    }
}

impl<T> FromIterator<(String, T)> for ColumnMap<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        let mut map = ColumnMap::new();
        for (column, value) in iter {
            map.insert(column, value);
        }
        map
    }
}

impl<T: Serialize> Serialize for ColumnMap<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_number_strips_thousands_separators() {
        assert_eq!(parse_number("1,234.5"), Some(1234.5));
        assert_eq!(parse_number(" 42 "), Some(42.0));
        assert_eq!(parse_number("-0.5"), Some(-0.5));
    }

    #[test]
    fn parse_number_rejects_text_and_non_finite() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("x"), None);
        assert_eq!(parse_number("12abc"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn missing_covers_null_and_empty_text() {
        assert!(Value::Null.is_missing());
        assert!(Value::Text(String::new()).is_missing());
        assert!(!Value::Text("0".into()).is_missing());
        assert!(!Value::Boolean(false).is_missing());
        assert!(!Value::Number(0.0).is_missing());
    }

    #[test]
    fn booleans_do_not_coerce_to_numbers() {
        assert_eq!(Value::Boolean(true).as_number(), None);
        assert_eq!(Value::Number(3.5).as_number(), Some(3.5));
    }

    #[test]
    fn round2_keeps_values_too_large_to_scale() {
        assert_eq!(round2(1.234), 1.23);
        assert_eq!(round2(1.7e308), 1.7e308);
        assert_eq!(round2(-1.7e308), -1.7e308);
        assert!(number_to_json(round2(f64::MAX)).is_number());
    }

    #[test]
    fn display_drops_integral_fraction() {
        assert_eq!(Value::Number(3.0).as_display(), "3");
        assert_eq!(Value::Number(2.5).as_display(), "2.5");
        assert_eq!(Value::Null.as_display(), "");
    }

    #[test]
    fn column_map_keeps_insertion_order_and_replaces() {
        let mut map = ColumnMap::new();
        map.insert("b", 1);
        map.insert("a", 2);
        map.insert("b", 3);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(map.get("b"), Some(&3));
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"b":3,"a":2}"#);
    }

    #[test]
    fn non_finite_numbers_serialize_as_null() {
        assert_eq!(number_to_json(f64::NAN), serde_json::Value::Null);
        assert_eq!(round2(1.005 * 1000.0), 1005.0);
    }
}
