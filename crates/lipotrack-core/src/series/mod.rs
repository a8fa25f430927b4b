//! Measurement series: a read-only, time-ordered view of one patient's
//! history.
//!
//! The store hands out series snapshots; nothing built on a series can write
//! back, so derived analytics can never leak into persistence.

use chrono::NaiveDate;
use std::collections::HashSet;
use thiserror::Error;

use crate::models::Measurement;

/// Internal consistency failure: the store handed back a list that breaks
/// the sorted or unique-identity invariant.
#[derive(Error, Debug)]
#[error("measurement series invariant violated: {0}")]
pub struct InvariantViolation(pub String);

/// Time-ordered snapshot of one patient's measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSeries {
    measurements: Vec<Measurement>,
}

impl MeasurementSeries {
    /// Build a series from stored measurements, asserting the invariants
    /// the store is supposed to maintain.
    pub fn from_records(measurements: Vec<Measurement>) -> Result<Self, InvariantViolation> {
        if let Some(w) = measurements.windows(2).find(|w| w[0].taken_on > w[1].taken_on) {
            return Err(InvariantViolation(format!(
                "unsorted measurements: {} precedes {}",
                w[0].taken_on, w[1].taken_on
            )));
        }
        let mut seen = HashSet::with_capacity(measurements.len());
        for m in &measurements {
            if !seen.insert(m.id.as_str()) {
                return Err(InvariantViolation(format!(
                    "duplicate measurement id {}",
                    m.id
                )));
            }
        }
        Ok(Self { measurements })
    }

    /// Number of measurements in the series.
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    /// Whether the series is empty.
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// All measurements, oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, Measurement> {
        self.measurements.iter()
    }

    /// Measurements with a draw date in `[start, end]`, oldest first.
    ///
    /// The returned iterator is lazy and restartable (it is `Clone`); an
    /// empty range is an empty iterator, never an error.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> std::slice::Iter<'_, Measurement> {
        if start > end {
            return self.measurements[0..0].iter();
        }
        let lo = self.measurements.partition_point(|m| m.taken_on < start);
        let hi = self.measurements.partition_point(|m| m.taken_on <= end);
        self.measurements[lo..hi].iter()
    }

    /// The most recent `n` measurements (or fewer if history is shorter),
    /// oldest first.
    pub fn latest(&self, n: usize) -> &[Measurement] {
        let start = self.measurements.len().saturating_sub(n);
        &self.measurements[start..]
    }

    /// Measurements that have not been superseded by a later correction.
    pub fn effective(&self) -> impl Iterator<Item = &Measurement> {
        let superseded: HashSet<&str> = self
            .measurements
            .iter()
            .filter_map(|m| m.supersedes.as_deref())
            .collect();
        self.measurements
            .iter()
            .filter(move |m| !superseded.contains(m.id.as_str()))
    }

    /// Dated values for one analyte, restricted to an optional date range
    /// and to non-superseded measurements.
    pub fn analyte_points(
        &self,
        analyte: &str,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Vec<(NaiveDate, f64)> {
        self.effective()
            .filter(|m| match range {
                Some((start, end)) => m.taken_on >= start && m.taken_on <= end,
                None => true,
            })
            .filter_map(|m| m.value(analyte).map(|v| (m.taken_on, v)))
            .collect()
    }
}
