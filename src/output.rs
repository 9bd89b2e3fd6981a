//! Result types returned by a generation pass.

use crate::error::FieldError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What happened to one field during a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FieldOutcome {
    /// Substituted or placed at `locations` sites (always ≥ 1).
    Applied { locations: usize },
    /// The record had a value but the template has no site for it.
    NotFound,
    /// The record had no usable value; nothing was attempted.
    Skipped,
    /// An attempt was made and failed for a reason other than a missing site.
    Failed { error: FieldError },
}

impl FieldOutcome {
    /// `Applied` for a positive count, `NotFound` for zero.
    pub fn from_count(locations: usize) -> Self {
        if locations > 0 {
            FieldOutcome::Applied { locations }
        } else {
            FieldOutcome::NotFound
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, FieldOutcome::Applied { .. })
    }
}

impl fmt::Display for FieldOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldOutcome::Applied { locations: 1 } => write!(f, "applied"),
            FieldOutcome::Applied { locations } => write!(f, "applied at {locations} sites"),
            FieldOutcome::NotFound => write!(f, "placeholder not in template"),
            FieldOutcome::Skipped => write!(f, "no value in record"),
            FieldOutcome::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// Per-field outcomes for one pass, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PopulationResult {
    fields: BTreeMap<String, FieldOutcome>,
}

impl PopulationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome; a later record for the same field replaces it.
    pub fn record(&mut self, field: impl Into<String>, outcome: FieldOutcome) {
        self.fields.insert(field.into(), outcome);
    }

    pub fn get(&self, field: &str) -> Option<&FieldOutcome> {
        self.fields.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldOutcome)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of fields that were applied somewhere.
    pub fn succeeded(&self) -> usize {
        self.fields.values().filter(|o| o.is_applied()).count()
    }

    /// Flat `field → bool` view; only `Applied` is `true`.
    pub fn as_bool_map(&self) -> BTreeMap<String, bool> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.is_applied()))
            .collect()
    }
}

/// Aggregate counters for a pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub applied: usize,
    pub not_found: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Images fetched successfully (whether or not they were placed).
    pub images_downloaded: usize,
    pub slide_count: usize,
    pub duration_ms: u64,
}

impl GenerationStats {
    pub(crate) fn tally(&mut self, results: &PopulationResult) {
        for (_, outcome) in results.iter() {
            match outcome {
                FieldOutcome::Applied { .. } => self.applied += 1,
                FieldOutcome::NotFound => self.not_found += 1,
                FieldOutcome::Skipped => self.skipped += 1,
                FieldOutcome::Failed { .. } => self.failed += 1,
            }
        }
    }
}

/// The serialised deck plus everything learned while producing it.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    /// `.pptx` bytes.
    pub bytes: Vec<u8>,
    /// Deterministic file name derived from the record and timestamp.
    pub file_name: String,
    pub results: PopulationResult,
    pub stats: GenerationStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_applied_maps_to_true() {
        let mut r = PopulationResult::new();
        r.record("company_name", FieldOutcome::Applied { locations: 1 });
        r.record("bom_code", FieldOutcome::NotFound);
        r.record("price_chart", FieldOutcome::Skipped);
        r.record(
            "chart_custom",
            FieldOutcome::Failed {
                error: FieldError::HttpStatus {
                    field: "chart_custom".into(),
                    url: "https://x/c.png".into(),
                    status: 500,
                },
            },
        );

        let map = r.as_bool_map();
        assert_eq!(map["company_name"], true);
        assert_eq!(map.values().filter(|v| **v).count(), 1);
        assert_eq!(r.succeeded(), 1);

        let mut stats = GenerationStats::default();
        stats.tally(&r);
        assert_eq!((stats.applied, stats.not_found, stats.skipped, stats.failed), (1, 1, 1, 1));
    }

    #[test]
    fn zero_count_is_not_found() {
        assert_eq!(FieldOutcome::from_count(0), FieldOutcome::NotFound);
        assert_eq!(FieldOutcome::from_count(3), FieldOutcome::Applied { locations: 3 });
    }

    #[test]
    fn outcome_serialises_with_status_tag() {
        let json = serde_json::to_value(FieldOutcome::Applied { locations: 2 }).unwrap();
        assert_eq!(json["status"], "applied");
        assert_eq!(json["locations"], 2);
    }
}
