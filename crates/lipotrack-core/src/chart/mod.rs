//! Chart data adapter.
//!
//! Shapes a `TrendResult` into renderer-agnostic point sequences for the
//! excluded presentation layer. Pure transformation: no I/O, and an
//! insufficient trend becomes an explicit empty series rather than an error.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{MedicationOrder, ReferenceRange};
use crate::trend::TrendResult;

/// Days of padding added on each side of the plotted date range so edge
/// points do not sit on the axis.
const DATE_PADDING_DAYS: u64 = 8;

/// One plottable point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ChartPoint {
    /// X coordinate
    pub date: NaiveDate,
    /// Y coordinate
    pub value: f64,
    /// Whether the point should be rendered as an outlier
    pub outlier: bool,
}

/// A dated marker for a medication order, rendered as a vertical line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicationMarker {
    /// Therapy start date
    pub date: NaiveDate,
    /// Medication name
    pub name: String,
    /// Dosage text, if recorded
    pub dosage: Option<String>,
}

/// Renderer-agnostic chart payload for one analyte.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartSeries {
    /// Analyte the series describes
    pub analyte: String,
    /// Display unit, if known
    pub unit: Option<String>,
    /// Raw measurements, outlier-tagged
    pub raw: Vec<ChartPoint>,
    /// Moving-average line, parallel to `raw`
    pub moving_average: Vec<ChartPoint>,
    /// Fitted trend line evaluated at each timestamp; empty when the trend
    /// is undefined
    pub trend: Vec<ChartPoint>,
    /// Reference band for shading, if configured for the analyte
    pub reference: Option<ReferenceRange>,
    /// Medication markers to overlay
    pub medications: Vec<MedicationMarker>,
    /// Suggested x-axis limits, padded by eight days on each side
    pub date_limits: Option<(NaiveDate, NaiveDate)>,
}

impl ChartSeries {
    /// Whether there is anything to draw.
    pub fn has_data(&self) -> bool {
        !self.raw.is_empty() || !self.medications.is_empty()
    }

    /// Attach a reference band.
    pub fn with_reference(mut self, reference: ReferenceRange) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Attach medication markers from a patient's orders. Orders without a
    /// start date cannot be positioned and are skipped; inactive orders are
    /// skipped too.
    pub fn with_medications(mut self, orders: &[MedicationOrder]) -> Self {
        self.medications = orders
            .iter()
            .filter(|o| o.active)
            .filter_map(|o| {
                o.started_on.map(|date| MedicationMarker {
                    date,
                    name: o.name.clone(),
                    dosage: o.dosage.clone(),
                })
            })
            .collect();
        self.date_limits = padded_limits(
            self.raw
                .iter()
                .map(|p| p.date)
                .chain(self.medications.iter().map(|m| m.date)),
        );
        self
    }

    /// Display unit to use for the y-axis.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Shape a trend result into chart sequences.
pub fn to_series(result: &TrendResult) -> ChartSeries {
    let raw: Vec<ChartPoint> = result
        .points
        .iter()
        .enumerate()
        .map(|(i, p)| ChartPoint {
            date: p.date,
            value: p.value,
            outlier: result.outliers.contains(&i),
        })
        .collect();

    let moving_average: Vec<ChartPoint> = result
        .points
        .iter()
        .zip(&result.moving_average)
        .map(|(p, &avg)| ChartPoint {
            date: p.date,
            value: avg,
            outlier: false,
        })
        .collect();

    let trend: Vec<ChartPoint> = match result.fit {
        Some(fit) => result
            .points
            .iter()
            .map(|p| ChartPoint {
                date: p.date,
                value: fit.at(p.day),
                outlier: false,
            })
            .collect(),
        None => Vec::new(),
    };

    ChartSeries {
        analyte: result.analyte.clone(),
        unit: None,
        date_limits: padded_limits(raw.iter().map(|p| p.date)),
        raw,
        moving_average,
        trend,
        reference: None,
        medications: Vec::new(),
    }
}

/// Collapse same-day points into their per-day average, for renderers that
/// want one marker per date. Outlier tags survive if any collapsed point
/// carried one.
pub fn collapse_same_day(points: &[ChartPoint]) -> Vec<ChartPoint> {
    let mut collapsed: Vec<ChartPoint> = Vec::new();
    let mut count = 0usize;
    for p in points {
        match collapsed.last_mut() {
            Some(last) if last.date == p.date => {
                last.value = (last.value * count as f64 + p.value) / (count + 1) as f64;
                last.outlier |= p.outlier;
                count += 1;
            }
            _ => {
                collapsed.push(*p);
                count = 1;
            }
        }
    }
    collapsed
}

fn padded_limits(dates: impl Iterator<Item = NaiveDate>) -> Option<(NaiveDate, NaiveDate)> {
    let mut min: Option<NaiveDate> = None;
    let mut max: Option<NaiveDate> = None;
    for d in dates {
        min = Some(min.map_or(d, |m| m.min(d)));
        max = Some(max.map_or(d, |m| m.max(d)));
    }
    let pad = Days::new(DATE_PADDING_DAYS);
    match (min, max) {
        (Some(lo), Some(hi)) => Some((
            lo.checked_sub_days(pad).unwrap_or(lo),
            hi.checked_add_days(pad).unwrap_or(hi),
        )),
        _ => None,
    }
}
