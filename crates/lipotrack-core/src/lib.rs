//! LipoTrack Core Library
//!
//! Local-first patient lipid-panel store with longitudinal trend analytics.
//!
//! # Architecture
//!
//! ```text
//! caller (HTTP/view layer, excluded)
//!     │
//!     ▼
//! RecordStore ──── load / upsert / append ──── backing JSON file
//!     │                                        (temp-write + rename)
//!     ▼
//! MeasurementSeries (read-only snapshot)
//!     │
//!     ▼
//! TrendEngine ──── fit / moving average / outlier flags
//!     │
//!     ▼
//! chart::to_series ──── point sequences + markers ──── renderer (excluded)
//! ```
//!
//! # Core Principle
//!
//! **The store is the single writer.** Everything downstream of it operates
//! on snapshots, so derived analytics can never leak into persistence.
//!
//! # Modules
//!
//! - [`store`]: file-backed record store with atomic-rename persistence
//! - [`models`]: domain types (Patient, Measurement, MedicationOrder, ...)
//! - [`series`]: time-ordered measurement view
//! - [`trend`]: trend fit, moving statistics, outlier flags
//! - [`chart`]: renderer-agnostic chart payloads

pub mod chart;
pub mod models;
pub mod series;
pub mod store;
pub mod trend;

// Re-export commonly used types
pub use chart::{ChartPoint, ChartSeries, MedicationMarker};
pub use models::{
    AnalyteCatalog, AnalyteSpec, Measurement, MedicationOrder, Patient, RangeBand, ReferenceRange,
};
pub use series::MeasurementSeries;
pub use store::{PatientRecord, RecordStore, StoreError};
pub use trend::{TrendConfig, TrendEngine, TrendFit, TrendResult};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

// =========================================================================
// Top-Level Error Type
// =========================================================================

/// Errors surfaced across the public facade.
#[derive(Debug, thiserror::Error)]
pub enum LipoTrackError {
    #[error(transparent)]
    Store(#[from] store::StoreError),

    #[error(transparent)]
    Invariant(#[from] series::InvariantViolation),

    #[error("store lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for LipoTrackError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        LipoTrackError::LockPoisoned(e.to_string())
    }
}

type LipoResult<T> = Result<T, LipoTrackError>;

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe facade over one record store.
///
/// Reads and writes both take the lock: the store rewrites its whole file on
/// mutation, and the atomic-rename sequence must never interleave.
pub struct LipoTrack {
    store: Arc<Mutex<RecordStore>>,
    engine: TrendEngine,
}

impl LipoTrack {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> LipoResult<Self> {
        Self::open_with(path, AnalyteCatalog::default(), TrendConfig::default())
    }

    /// Open with a custom analyte catalog and trend configuration.
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        catalog: AnalyteCatalog,
        config: TrendConfig,
    ) -> LipoResult<Self> {
        let store = RecordStore::open_with_catalog(path, catalog)?;
        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            engine: TrendEngine::new(config),
        })
    }

    // =====================================================================
    // Patient Operations
    // =====================================================================

    /// Register a new patient or update an existing profile.
    pub fn register_patient(&self, profile: Patient) -> LipoResult<()> {
        let mut store = self.store.lock()?;
        store.upsert_patient(profile)?;
        Ok(())
    }

    /// Get a patient's profile and full history.
    pub fn get_patient(&self, patient_id: &str) -> LipoResult<PatientRecord> {
        let store = self.store.lock()?;
        Ok(store.get_patient(patient_id)?.clone())
    }

    /// List all patient profiles.
    pub fn list_patients(&self) -> LipoResult<Vec<Patient>> {
        let store = self.store.lock()?;
        Ok(store.list_patients().into_iter().cloned().collect())
    }

    // =====================================================================
    // Measurement Operations
    // =====================================================================

    /// Record a lab draw for a patient.
    ///
    /// `date` must be a `YYYY-MM-DD` calendar date; anything else is a
    /// validation error.
    pub fn record_measurement(
        &self,
        patient_id: &str,
        date: &str,
        values: BTreeMap<String, f64>,
    ) -> LipoResult<Measurement> {
        let taken_on = parse_date(date)?;
        let measurement = Measurement::new(taken_on, values);
        let mut store = self.store.lock()?;
        store.append_measurement(patient_id, measurement.clone())?;
        Ok(measurement)
    }

    /// Record a pre-built measurement (for unit annotations or supersede
    /// markers).
    pub fn record_measurement_full(
        &self,
        patient_id: &str,
        measurement: Measurement,
    ) -> LipoResult<()> {
        let mut store = self.store.lock()?;
        store.append_measurement(patient_id, measurement)?;
        Ok(())
    }

    /// Record a medication order for a patient.
    pub fn record_medication(&self, patient_id: &str, order: MedicationOrder) -> LipoResult<()> {
        let mut store = self.store.lock()?;
        store.record_medication(patient_id, order)?;
        Ok(())
    }

    // =====================================================================
    // Analytics Operations
    // =====================================================================

    /// Compute trend analytics for one analyte, optionally restricted to a
    /// date range. An empty history yields an insufficient-data result, not
    /// an error.
    pub fn get_trends(
        &self,
        patient_id: &str,
        analyte: &str,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> LipoResult<TrendResult> {
        let store = self.store.lock()?;
        let series = store.series(patient_id)?;
        Ok(self.engine.analyze(&series, analyte, range))
    }

    /// Produce the chart payload for one analyte: raw points, moving
    /// average, trend line, reference band, and medication markers.
    pub fn get_chart_data(
        &self,
        patient_id: &str,
        analyte: &str,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> LipoResult<ChartSeries> {
        let store = self.store.lock()?;
        let series = store.series(patient_id)?;
        let result = self.engine.analyze(&series, analyte, range);

        let mut chart = chart::to_series(&result)
            .with_medications(&store.get_patient(patient_id)?.medications);
        if let Some(reference) = store.catalog().reference_range(analyte) {
            chart = chart.with_reference(reference);
        }
        if let Some(unit) = store.catalog().default_unit(analyte) {
            chart = chart.with_unit(unit.to_string());
        }
        Ok(chart)
    }
}

fn parse_date(date: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| StoreError::Validation(format!("invalid date: {:?}", date)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, LipoTrack) {
        let dir = tempfile::tempdir().unwrap();
        let app = LipoTrack::open(dir.path().join("store.json")).unwrap();
        (dir, app)
    }

    fn ldl(value: f64) -> BTreeMap<String, f64> {
        let mut values = BTreeMap::new();
        values.insert("ldl".to_string(), value);
        values
    }

    #[test]
    fn test_register_and_get() {
        let (_dir, app) = open_temp();
        app.register_patient(Patient::new("p1", "Anna")).unwrap();
        let record = app.get_patient("p1").unwrap();
        assert_eq!(record.profile.name, "Anna");
        assert!(record.measurements.is_empty());
    }

    #[test]
    fn test_record_measurement_parses_date() {
        let (_dir, app) = open_temp();
        app.register_patient(Patient::new("p1", "Anna")).unwrap();
        app.record_measurement("p1", "2024-01-01", ldl(130.0))
            .unwrap();

        let err = app
            .record_measurement("p1", "01/02/2024", ldl(130.0))
            .unwrap_err();
        assert!(matches!(
            err,
            LipoTrackError::Store(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_trends_on_empty_history() {
        let (_dir, app) = open_temp();
        app.register_patient(Patient::new("p1", "Anna")).unwrap();
        let result = app.get_trends("p1", "ldl", None).unwrap();
        assert!(!result.has_trend());
    }

    #[test]
    fn test_unknown_patient_errors() {
        let (_dir, app) = open_temp();
        assert!(matches!(
            app.get_trends("ghost", "ldl", None),
            Err(LipoTrackError::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn test_chart_data_carries_catalog_metadata() {
        let (_dir, app) = open_temp();
        app.register_patient(Patient::new("p1", "Anna")).unwrap();
        app.record_measurement("p1", "2024-01-01", ldl(130.0))
            .unwrap();
        app.record_measurement("p1", "2024-02-01", ldl(150.0))
            .unwrap();

        let chart = app.get_chart_data("p1", "ldl", None).unwrap();
        assert_eq!(chart.unit.as_deref(), Some("mg/dL"));
        assert!(chart.reference.is_some());
        assert_eq!(chart.raw.len(), 2);
    }
}
