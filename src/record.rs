//! The report record: a flat JSON object with tolerant accessors.
//!
//! Records come from upstream writers and scrapers with no guaranteed shape.
//! Numbers may arrive as JSON numbers or as strings like `"₹1,234 Cr."`, and
//! absent text may be `null`, `""`, or the literal string `"null"`. Every
//! accessor here returns `Option` and never fails on a bad value.

use crate::error::DeckError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// One report's input fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportRecord {
    fields: Map<String, Value>,
}

impl ReportRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, DeckError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(DeckError::InvalidRecord(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, DeckError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| DeckError::InvalidRecord(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// `true` when the key holds a usable scalar.
    pub fn has(&self, key: &str) -> bool {
        self.text(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Scalar value as display text; null-like values are `None`.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) => {
                let t = s.trim();
                (!is_null_text(t)).then(|| t.to_string())
            }
            Value::Number(n) => Some(number_text(n)),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// First usable value among `keys`.
    pub fn text_any(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.text(k))
    }

    /// Numeric value; strings are parsed with [`parse_number`].
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.fields.get(key)? {
            Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
            Value::String(s) => parse_number(s),
            _ => None,
        }
    }

    /// First numeric value among `keys`.
    pub fn number_any<'k>(&self, keys: impl IntoIterator<Item = &'k str>) -> Option<f64> {
        keys.into_iter().find_map(|k| self.number(k))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Store a finite number; non-finite values are ignored.
    pub fn set_number(&mut self, key: impl Into<String>, value: f64) {
        if let Some(n) = Number::from_f64(value) {
            self.fields.insert(key.into(), Value::Number(n));
        }
    }

    /// Insert only when the key has no usable value yet.
    pub fn set_if_absent(&mut self, key: &str, value: impl Into<Value>) -> bool {
        if self.has(key) {
            return false;
        }
        self.fields.insert(key.to_string(), value.into());
        true
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl From<Map<String, Value>> for ReportRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn is_null_text(s: &str) -> bool {
    s.is_empty()
        || s.eq_ignore_ascii_case("null")
        || s.eq_ignore_ascii_case("none")
        || s == "[null]"
}

/// Integers print without a fractional part; other values use the shortest
/// representation that round-trips.
fn number_text(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Parse a loosely formatted number.
///
/// Strips currency (`₹`, `Rs.`), thousands separators, `%` and the `Cr.`
/// unit suffix. Returns `None` for anything else that does not parse, for
/// dashes, and for NaN/∞.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_end_matches("Cr.")
        .trim_end_matches("Cr")
        .trim_start_matches("Rs.")
        .chars()
        .filter(|c| !matches!(c, '₹' | ',' | '%' | ' '))
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '-') {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
}
