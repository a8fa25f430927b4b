//! Trend and statistics engine.
//!
//! Consumes a measurement series snapshot and produces derived analytics
//! for one analyte:
//! - ordinary least-squares trend fit over days since the first draw
//! - trailing moving average with shrinking boundary windows
//! - advisory outlier flags against the local window
//!
//! Fewer than two usable points is not an error: the result carries no fit
//! and the UI renders "nothing to show yet" instead of an error banner.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::series::MeasurementSeries;

/// Engine configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrendConfig {
    /// Number of measurements in the smoothing window
    pub window: usize,
    /// Outlier threshold as a multiple of the local standard deviation
    pub outlier_sigma: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window: 3,
            outlier_sigma: 2.0,
        }
    }
}

/// One analyte value positioned on the time axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrendPoint {
    /// Draw date
    pub date: NaiveDate,
    /// Days since the first point in the result (keeps the fit conditioned)
    pub day: f64,
    /// Analyte value
    pub value: f64,
}

/// Fitted least-squares line, in value units per day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrendFit {
    /// Slope (value change per day)
    pub slope: f64,
    /// Value at day zero (the first point's date)
    pub intercept: f64,
    /// Coefficient of determination of the fit
    pub r_squared: f64,
}

impl TrendFit {
    /// Evaluate the fitted line at a day offset.
    pub fn at(&self, day: f64) -> f64 {
        self.intercept + self.slope * day
    }
}

/// Derived analytics for one analyte over a series snapshot.
///
/// Recomputed on demand, never persisted, never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendResult {
    /// Analyte the result describes
    pub analyte: String,
    /// Underlying points, oldest first
    pub points: Vec<TrendPoint>,
    /// Fitted line; `None` means insufficient data, not failure
    pub fit: Option<TrendFit>,
    /// Moving average aligned index-for-index with `points`
    pub moving_average: Vec<f64>,
    /// Indices into `points` flagged as outliers (advisory only)
    pub outliers: Vec<usize>,
}

impl TrendResult {
    /// Whether there was enough data to fit a trend.
    pub fn has_trend(&self) -> bool {
        self.fit.is_some()
    }

    /// An empty "nothing to show yet" result.
    pub fn insufficient(analyte: impl Into<String>) -> Self {
        Self {
            analyte: analyte.into(),
            points: Vec::new(),
            fit: None,
            moving_average: Vec::new(),
            outliers: Vec::new(),
        }
    }
}

/// Stateless analytics engine.
#[derive(Debug, Clone, Default)]
pub struct TrendEngine {
    config: TrendConfig,
}

impl TrendEngine {
    /// Create an engine with the given configuration.
    pub fn new(config: TrendConfig) -> Self {
        Self { config }
    }

    /// Analyze one analyte over a series snapshot, optionally restricted to
    /// a date range.
    pub fn analyze(
        &self,
        series: &MeasurementSeries,
        analyte: &str,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> TrendResult {
        let raw = series.analyte_points(analyte, range);
        let Some(&(first_date, _)) = raw.first() else {
            return TrendResult::insufficient(analyte);
        };

        let points: Vec<TrendPoint> = raw
            .iter()
            .map(|&(date, value)| TrendPoint {
                date,
                day: (date - first_date).num_days() as f64,
                value,
            })
            .collect();

        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        let moving_average = trailing_moving_average(&values, self.config.window);
        let outliers = flag_outliers(
            &values,
            &moving_average,
            self.config.window,
            self.config.outlier_sigma,
        );
        let fit = linear_fit(&points);

        TrendResult {
            analyte: analyte.to_string(),
            points,
            fit,
            moving_average,
            outliers,
        }
    }
}

/// Ordinary least-squares fit of value against day offset.
///
/// Returns `None` when fewer than two points exist or when all points share
/// one date (a vertical line has no slope).
fn linear_fit(points: &[TrendPoint]) -> Option<TrendFit> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.day).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.value).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for p in points {
        sxx += (p.day - mean_x) * (p.day - mean_x);
        sxy += (p.day - mean_x) * (p.value - mean_y);
    }
    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let ss_tot: f64 = points.iter().map(|p| (p.value - mean_y).powi(2)).sum();
    let ss_res: f64 = points
        .iter()
        .map(|p| (p.value - (intercept + slope * p.day)).powi(2))
        .sum();
    let r_squared = if ss_tot == 0.0 {
        1.0
    } else {
        1.0 - ss_res / ss_tot
    };

    Some(TrendFit {
        slope,
        intercept,
        r_squared,
    })
}

/// Trailing moving average; the window shrinks at the start of the series
/// instead of padding with synthetic values.
fn trailing_moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let start = (i + 1).saturating_sub(window);
            mean(&values[start..=i])
        })
        .collect()
}

/// Flag indices whose deviation from the moving average exceeds
/// `sigma` times the spread of the same window with the candidate excluded.
///
/// A window of fewer than two neighbors, or neighbors with zero spread,
/// never flags.
fn flag_outliers(values: &[f64], moving_average: &[f64], window: usize, sigma: f64) -> Vec<usize> {
    let window = window.max(1);
    let mut flagged = Vec::new();
    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(window);
        let neighbors: Vec<f64> = (start..=i).filter(|&j| j != i).map(|j| values[j]).collect();
        if neighbors.len() < 2 {
            continue;
        }
        let spread = population_std(&neighbors);
        if spread == 0.0 {
            continue;
        }
        if (values[i] - moving_average[i]).abs() > sigma * spread {
            flagged.push(i);
        }
    }
    flagged
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}
