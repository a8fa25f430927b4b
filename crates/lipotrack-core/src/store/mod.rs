//! Record store: the file-backed patient database.
//!
//! A single JSON document maps patient ID to profile plus measurement
//! history. The store is the only writer of that file; every mutating
//! operation rewrites the whole document through a temp-file-then-rename
//! sequence, so a crash mid-write leaves the previous valid file intact.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{AnalyteCatalog, Measurement, MedicationOrder, Patient};
use crate::series::MeasurementSeries;

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("patient not found: {0}")]
    NotFound(String),

    #[error("store file is corrupt: {0}")]
    Corrupt(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything the store holds for one patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientRecord {
    /// Profile fields
    pub profile: Patient,
    /// Measurement history, sorted by draw date (ties keep insertion order)
    #[serde(default)]
    pub measurements: Vec<Measurement>,
    /// Medication orders, sorted by start date (undated orders first)
    #[serde(default)]
    pub medications: Vec<MedicationOrder>,
}

// The on-disk document: patient id -> record. Kept as a plain map so the
// file stays hand-inspectable.
type StoreDocument = BTreeMap<String, PatientRecord>;

/// File-backed patient record store.
///
/// Single writer, synchronous persistence: once a mutating call returns
/// `Ok`, the data has been renamed into place and survives a crash.
pub struct RecordStore {
    path: PathBuf,
    patients: StoreDocument,
    catalog: AnalyteCatalog,
}

impl RecordStore {
    /// Open the store backing file, creating an empty store if the file
    /// does not exist yet.
    ///
    /// A file that exists but does not parse as the expected schema is an
    /// error: the store refuses to reinitialize over data it cannot read.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::open_with_catalog(path, AnalyteCatalog::default())
    }

    /// Open with a caller-supplied analyte catalog.
    pub fn open_with_catalog<P: AsRef<Path>>(
        path: P,
        catalog: AnalyteCatalog,
    ) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let patients = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<StoreDocument>(&contents)
                .map_err(|e| StoreError::Corrupt(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreDocument::new(),
            Err(e) => return Err(e.into()),
        };

        // Defensive check: the sorted invariant must hold for data we did
        // not write ourselves in this session.
        for (id, record) in &patients {
            if let Some(pair) = first_unsorted_pair(&record.measurements) {
                return Err(StoreError::Invariant(format!(
                    "measurements for patient {} are not date-sorted ({} after {})",
                    id, pair.1, pair.0
                )));
            }
        }

        info!(path = %path.display(), patients = patients.len(), "opened record store");
        Ok(Self {
            path,
            patients,
            catalog,
        })
    }

    /// The analyte catalog this store validates against.
    pub fn catalog(&self) -> &AnalyteCatalog {
        &self.catalog
    }

    /// Number of patients in the store.
    pub fn len(&self) -> usize {
        self.patients.len()
    }

    /// Whether the store has no patients.
    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    /// Get a patient's record.
    pub fn get_patient(&self, id: &str) -> StoreResult<&PatientRecord> {
        self.patients
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// List all patient profiles, sorted by ID.
    pub fn list_patients(&self) -> Vec<&Patient> {
        self.patients.values().map(|r| &r.profile).collect()
    }

    /// Insert or update a patient profile.
    ///
    /// Updates touch profile fields only; measurement history is never
    /// altered by this call.
    pub fn upsert_patient(&mut self, profile: Patient) -> StoreResult<()> {
        if profile.id.trim().is_empty() {
            return Err(StoreError::Validation("patient id must not be empty".into()));
        }
        match self.patients.get_mut(&profile.id) {
            Some(record) => {
                record.profile.name = profile.name;
                record.profile.date_of_birth = profile.date_of_birth;
                record.profile.notes = profile.notes;
                record.profile.touch();
            }
            None => {
                info!(patient = %profile.id, "registered patient");
                self.patients.insert(
                    profile.id.clone(),
                    PatientRecord {
                        profile,
                        measurements: Vec::new(),
                        medications: Vec::new(),
                    },
                );
            }
        }
        self.save()
    }

    /// Validate and append a measurement to a patient's history.
    ///
    /// The measurement lands at its date-sorted position; same-date entries
    /// keep arrival order. Duplicate (date, values) pairs are stored twice
    /// by design.
    pub fn append_measurement(
        &mut self,
        patient_id: &str,
        measurement: Measurement,
    ) -> StoreResult<()> {
        self.validate_measurement(&measurement)?;
        let record = self
            .patients
            .get_mut(patient_id)
            .ok_or_else(|| StoreError::NotFound(patient_id.to_string()))?;

        // partition_point finds the slot after the last same-date entry,
        // which preserves tie order.
        let idx = record
            .measurements
            .partition_point(|m| m.taken_on <= measurement.taken_on);
        debug!(
            patient = patient_id,
            date = %measurement.taken_on,
            position = idx,
            "appending measurement"
        );
        record.measurements.insert(idx, measurement);
        self.save()
    }

    /// Record a medication order for a patient.
    ///
    /// Orders are kept sorted by start date with undated orders first.
    pub fn record_medication(
        &mut self,
        patient_id: &str,
        order: MedicationOrder,
    ) -> StoreResult<()> {
        let record = self
            .patients
            .get_mut(patient_id)
            .ok_or_else(|| StoreError::NotFound(patient_id.to_string()))?;
        record.medications.push(order);
        record
            .medications
            .sort_by_key(|m| (m.started_on.is_some(), m.started_on));
        self.save()
    }

    /// Materialize a patient's measurement series (a read-only snapshot).
    pub fn series(&self, patient_id: &str) -> StoreResult<MeasurementSeries> {
        let record = self.get_patient(patient_id)?;
        MeasurementSeries::from_records(record.measurements.clone())
            .map_err(|e| StoreError::Invariant(e.to_string()))
    }

    /// Persist the whole store atomically.
    ///
    /// Writes to a sibling temp file, fsyncs, then renames over the backing
    /// file so the previous valid document stays readable until the new one
    /// is complete.
    pub fn save(&self) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(&self.patients)
            .map_err(|e| StoreError::Invariant(format!("store serialization failed: {}", e)))?;

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), bytes = json.len(), "persisted store");
        Ok(())
    }

    fn validate_measurement(&self, measurement: &Measurement) -> StoreResult<()> {
        if measurement.values.is_empty() {
            return Err(StoreError::Validation(
                "measurement carries no analyte values".into(),
            ));
        }
        for (analyte, value) in &measurement.values {
            if !value.is_finite() {
                return Err(StoreError::Validation(format!(
                    "analyte {} has a non-finite value",
                    analyte
                )));
            }
            if *value < 0.0 {
                return Err(StoreError::Validation(format!(
                    "analyte {} has a negative value ({})",
                    analyte, value
                )));
            }
            if !self.catalog.is_recognized(analyte) {
                // Tolerated: stored opaquely rather than dropped.
                warn!(analyte = %analyte, "unrecognized analyte, storing as-is");
            }
        }
        Ok(())
    }
}

/// First adjacent out-of-order date pair, if any.
fn first_unsorted_pair(measurements: &[Measurement]) -> Option<(chrono::NaiveDate, chrono::NaiveDate)> {
    measurements
        .windows(2)
        .find(|w| w[0].taken_on > w[1].taken_on)
        .map(|w| (w[0].taken_on, w[1].taken_on))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn temp_store() -> (tempfile::TempDir, RecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path().join("store.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let (_dir, store) = temp_store();
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_unknown_patient() {
        let (_dir, store) = temp_store();
        assert!(matches!(
            store.get_patient("nobody"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_upsert_updates_profile_only() {
        let (_dir, mut store) = temp_store();
        store.upsert_patient(Patient::new("p1", "Anna")).unwrap();
        store
            .append_measurement("p1", Measurement::single(date(2024, 1, 1), "ldl", 130.0))
            .unwrap();

        let mut updated = Patient::new("p1", "Anna Virtanen");
        updated.notes = Some("follow-up in 6 months".into());
        store.upsert_patient(updated).unwrap();

        let record = store.get_patient("p1").unwrap();
        assert_eq!(record.profile.name, "Anna Virtanen");
        assert_eq!(record.measurements.len(), 1);
    }

    #[test]
    fn test_empty_patient_id_rejected() {
        let (_dir, mut store) = temp_store();
        let result = store.upsert_patient(Patient::new("  ", "Ghost"));
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_append_sorted_insertion() {
        let (_dir, mut store) = temp_store();
        store.upsert_patient(Patient::new("p1", "Anna")).unwrap();
        store
            .append_measurement("p1", Measurement::single(date(2024, 1, 1), "ldl", 130.0))
            .unwrap();
        // Earlier draw arrives late; it must be reordered ahead.
        store
            .append_measurement("p1", Measurement::single(date(2023, 1, 1), "ldl", 150.0))
            .unwrap();

        let record = store.get_patient("p1").unwrap();
        assert_eq!(record.measurements[0].taken_on, date(2023, 1, 1));
        assert_eq!(record.measurements[1].taken_on, date(2024, 1, 1));
    }

    #[test]
    fn test_same_date_keeps_arrival_order() {
        let (_dir, mut store) = temp_store();
        store.upsert_patient(Patient::new("p1", "Anna")).unwrap();
        let first = Measurement::single(date(2024, 1, 1), "glucose", 98.0);
        let second = Measurement::single(date(2024, 1, 1), "glucose", 102.0);
        let (first_id, second_id) = (first.id.clone(), second.id.clone());
        store.append_measurement("p1", first).unwrap();
        store.append_measurement("p1", second).unwrap();

        let record = store.get_patient("p1").unwrap();
        assert_eq!(record.measurements[0].id, first_id);
        assert_eq!(record.measurements[1].id, second_id);
    }

    #[test]
    fn test_duplicate_append_not_deduplicated() {
        let (_dir, mut store) = temp_store();
        store.upsert_patient(Patient::new("p1", "Anna")).unwrap();
        store
            .append_measurement("p1", Measurement::single(date(2024, 1, 1), "ldl", 130.0))
            .unwrap();
        store
            .append_measurement("p1", Measurement::single(date(2024, 1, 1), "ldl", 130.0))
            .unwrap();
        assert_eq!(store.get_patient("p1").unwrap().measurements.len(), 2);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let (_dir, mut store) = temp_store();
        store.upsert_patient(Patient::new("p1", "Anna")).unwrap();

        for bad in [f64::NAN, f64::INFINITY, -5.0] {
            let result =
                store.append_measurement("p1", Measurement::single(date(2024, 1, 1), "ldl", bad));
            assert!(matches!(result, Err(StoreError::Validation(_))));
        }

        let empty = Measurement::new(date(2024, 1, 1), BTreeMap::new());
        assert!(matches!(
            store.append_measurement("p1", empty),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_append_to_unknown_patient() {
        let (_dir, mut store) = temp_store();
        let result =
            store.append_measurement("ghost", Measurement::single(date(2024, 1, 1), "ldl", 130.0));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_medications_sorted_undated_first() {
        let (_dir, mut store) = temp_store();
        store.upsert_patient(Patient::new("p1", "Anna")).unwrap();
        store
            .record_medication(
                "p1",
                MedicationOrder::new("Atorvastatin").started(date(2020, 5, 1)),
            )
            .unwrap();
        store
            .record_medication("p1", MedicationOrder::new("Simvastatin"))
            .unwrap();
        store
            .record_medication(
                "p1",
                MedicationOrder::new("Rosuvastatin").started(date(2018, 1, 1)),
            )
            .unwrap();

        let meds = &store.get_patient("p1").unwrap().medications;
        assert_eq!(meds[0].name, "Simvastatin");
        assert_eq!(meds[1].name, "Rosuvastatin");
        assert_eq!(meds[2].name, "Atorvastatin");
    }

    #[test]
    fn test_corrupt_file_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            RecordStore::open(&path),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_unsorted_file_is_invariant_violation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let json = serde_json::json!({
            "p1": {
                "profile": Patient::new("p1", "Anna"),
                "measurements": [
                    Measurement::single(date(2024, 6, 1), "ldl", 120.0),
                    Measurement::single(date(2024, 1, 1), "ldl", 140.0),
                ],
            }
        });
        fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();
        assert!(matches!(
            RecordStore::open(&path),
            Err(StoreError::Invariant(_))
        ));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = RecordStore::open(&path).unwrap();
        store.upsert_patient(Patient::new("p1", "Anna")).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }
}
