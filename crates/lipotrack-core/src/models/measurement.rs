//! Measurement models.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One timestamped lab draw for a patient.
///
/// Immutable once stored: corrections are a new measurement carrying a
/// `supersedes` marker, never an in-place edit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Measurement {
    /// Unique measurement ID
    pub id: String,
    /// Calendar date of the draw
    pub taken_on: NaiveDate,
    /// Analyte name -> numeric value (open mapping, see `AnalyteCatalog`)
    pub values: BTreeMap<String, f64>,
    /// Analyte name -> unit annotation (optional, sparse)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub units: BTreeMap<String, String>,
    /// ID of an earlier measurement this one corrects, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<String>,
    /// Entry timestamp (when the record was keyed in, not the draw date)
    pub recorded_at: String,
}

impl Measurement {
    /// Create a new measurement for the given draw date.
    pub fn new(taken_on: NaiveDate, values: BTreeMap<String, f64>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            taken_on,
            values,
            units: BTreeMap::new(),
            supersedes: None,
            recorded_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Create a measurement holding a single analyte value.
    pub fn single(taken_on: NaiveDate, analyte: impl Into<String>, value: f64) -> Self {
        let mut values = BTreeMap::new();
        values.insert(analyte.into(), value);
        Self::new(taken_on, values)
    }

    /// Annotate an analyte with a unit.
    pub fn with_unit(mut self, analyte: impl Into<String>, unit: impl Into<String>) -> Self {
        self.units.insert(analyte.into(), unit.into());
        self
    }

    /// Mark this measurement as a correction of an earlier one.
    pub fn superseding(mut self, measurement_id: impl Into<String>) -> Self {
        self.supersedes = Some(measurement_id.into());
        self
    }

    /// Get the value for one analyte, if present.
    pub fn value(&self, analyte: &str) -> Option<f64> {
        self.values.get(analyte).copied()
    }

    /// Get the unit annotation for one analyte, if present.
    pub fn unit(&self, analyte: &str) -> Option<&str> {
        self.units.get(analyte).map(String::as_str)
    }
}
