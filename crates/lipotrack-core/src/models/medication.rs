//! Medication order models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A lipid-lowering medication order (e.g., a statin prescription).
///
/// Orders are timeline annotations: the chart layer overlays them on the
/// measurement series so a clinician can see draws relative to therapy start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicationOrder {
    /// Unique order ID
    pub id: String,
    /// Medication name as prescribed
    pub name: String,
    /// Free-text dosage instruction
    pub dosage: Option<String>,
    /// Therapy start date; source records sometimes lack one
    pub started_on: Option<NaiveDate>,
    /// Whether the order is currently active
    pub active: bool,
    /// Entry timestamp
    pub recorded_at: String,
}

impl MedicationOrder {
    /// Create a new active medication order.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            dosage: None,
            started_on: None,
            active: true,
            recorded_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Set the dosage instruction.
    pub fn with_dosage(mut self, dosage: impl Into<String>) -> Self {
        self.dosage = Some(dosage.into());
        self
    }

    /// Set the therapy start date.
    pub fn started(mut self, date: NaiveDate) -> Self {
        self.started_on = Some(date);
        self
    }

    /// Mark the order inactive (discontinued therapy).
    pub fn discontinued(mut self) -> Self {
        self.active = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_order() {
        let order = MedicationOrder::new("Simvastatin 40 MG Oral Tablet")
            .with_dosage("1 tablet daily at bedtime")
            .started(NaiveDate::from_ymd_opt(2008, 3, 15).unwrap());
        assert!(order.active);
        assert_eq!(order.dosage.as_deref(), Some("1 tablet daily at bedtime"));
        assert!(order.started_on.is_some());
    }

    #[test]
    fn test_discontinued() {
        let order = MedicationOrder::new("Atorvastatin 20 MG").discontinued();
        assert!(!order.active);
    }
}
