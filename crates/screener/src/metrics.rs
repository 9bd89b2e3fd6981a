//! Flat metric map produced by a scrape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// `key → number | string`, e.g. `revenue_fy25 → 9841.2`, `sector → "IT"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metrics(Map<String, Value>);

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    /// Like Python truthiness: present and non-zero.
    pub(crate) fn nonzero(&self, key: &str) -> Option<f64> {
        self.get(key).filter(|v| *v != 0.0)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Store a finite number; NaN and infinities are dropped.
    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        if let Some(n) = Number::from_f64(value) {
            self.0.insert(key.into(), Value::Number(n));
        }
    }

    pub(crate) fn set_opt(&mut self, key: &str, value: Option<f64>) {
        if let Some(v) = value {
            self.set(key, v);
        }
    }

    /// Store rounded to `decimals` places.
    pub(crate) fn set_rounded(&mut self, key: impl Into<String>, value: f64, decimals: i32) {
        self.set(key, round_to(value, decimals));
    }

    pub fn set_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), Value::String(value.into()));
    }

    /// Overlay `other`; its values win.
    pub fn overlay(&mut self, other: Metrics) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    (value * f).round() / f
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_values_are_dropped() {
        let mut m = Metrics::new();
        m.set("a", f64::NAN);
        m.set("b", f64::INFINITY);
        m.set("c", 1.5);
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("c"), Some(1.5));
    }

    #[test]
    fn overlay_prefers_other() {
        let mut a = Metrics::new();
        a.set("pe_ttm", 20.0);
        a.set("roe", 15.0);
        let mut b = Metrics::new();
        b.set("pe_ttm", 22.0);
        a.overlay(b);
        assert_eq!(a.get("pe_ttm"), Some(22.0));
        assert_eq!(a.get("roe"), Some(15.0));
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(12.3456, 2), 12.35);
        assert_eq!(round_to(0.123456, 4), 0.1235);
    }
}
