//! Patient models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A patient profile.
///
/// The identifier is an opaque key supplied by the caller (chart number,
/// national ID, whatever the practice uses) and is unique within a store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Caller-supplied unique identifier
    pub id: String,
    /// Patient name
    pub name: String,
    /// Date of birth
    pub date_of_birth: Option<NaiveDate>,
    /// Free-text clinical notes
    pub notes: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Patient {
    /// Create a new patient profile.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: id.into(),
            name: name.into(),
            date_of_birth: None,
            notes: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Set the date of birth.
    pub fn with_date_of_birth(mut self, dob: NaiveDate) -> Self {
        self.date_of_birth = Some(dob);
        self
    }

    /// Set the notes field.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_patient() {
        let patient = Patient::new("p1", "Anna Virtanen");
        assert_eq!(patient.id, "p1");
        assert_eq!(patient.name, "Anna Virtanen");
        assert!(patient.date_of_birth.is_none());
        assert_eq!(patient.created_at, patient.updated_at);
    }

    #[test]
    fn test_builders() {
        let dob = NaiveDate::from_ymd_opt(1961, 4, 12).unwrap();
        let patient = Patient::new("p2", "Juha Korhonen")
            .with_date_of_birth(dob)
            .with_notes("statin intolerance suspected");
        assert_eq!(patient.date_of_birth, Some(dob));
        assert_eq!(
            patient.notes.as_deref(),
            Some("statin intolerance suspected")
        );
    }
}
