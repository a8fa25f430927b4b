//! Analyte catalog.
//!
//! The set of lab quantities a deployment recognizes is configuration, not
//! code: the default catalog covers the lipid panel plus serum glucose, and
//! callers may build their own. Unknown analyte names are tolerated at
//! ingestion (stored opaquely) so imported data is never silently dropped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Reference band for an analyte, in the analyte's default unit.
///
/// Values below `borderline` are normal, values in `[borderline, high)` are
/// borderline, values at or above `high` are high.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ReferenceRange {
    /// Lower edge of the borderline band
    pub borderline: f64,
    /// Lower edge of the high band
    pub high: f64,
}

impl ReferenceRange {
    /// Classify a value against this range.
    pub fn classify(&self, value: f64) -> RangeBand {
        if value >= self.high {
            RangeBand::High
        } else if value >= self.borderline {
            RangeBand::Borderline
        } else {
            RangeBand::Normal
        }
    }
}

/// Classification of a value against a reference range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RangeBand {
    Normal,
    Borderline,
    High,
}

/// One recognized analyte.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyteSpec {
    /// Canonical analyte name (map key in measurements)
    pub name: String,
    /// Default unit for display
    pub default_unit: Option<String>,
    /// Reference band, if one is clinically established
    pub reference: Option<ReferenceRange>,
}

/// The set of analytes a deployment recognizes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyteCatalog {
    specs: BTreeMap<String, AnalyteSpec>,
}

impl Default for AnalyteCatalog {
    fn default() -> Self {
        Self::lipid_panel()
    }
}

impl AnalyteCatalog {
    /// Build an empty catalog.
    pub fn empty() -> Self {
        Self {
            specs: BTreeMap::new(),
        }
    }

    /// The standard lipid panel plus serum glucose, with mg/dL reference
    /// bands (total cholesterol 200/240, glucose 100/126, etc.).
    pub fn lipid_panel() -> Self {
        let mut catalog = Self::empty();
        catalog.add(spec("total_cholesterol", "mg/dL", Some((200.0, 240.0))));
        catalog.add(spec("ldl", "mg/dL", Some((100.0, 160.0))));
        catalog.add(spec("hdl", "mg/dL", None));
        catalog.add(spec("triglycerides", "mg/dL", Some((150.0, 200.0))));
        catalog.add(spec("glucose", "mg/dL", Some((100.0, 126.0))));
        catalog
    }

    /// Add or replace a spec.
    pub fn add(&mut self, spec: AnalyteSpec) {
        self.specs.insert(spec.name.clone(), spec);
    }

    /// Whether a name is a recognized analyte.
    pub fn is_recognized(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    /// Look up a spec by name.
    pub fn get(&self, name: &str) -> Option<&AnalyteSpec> {
        self.specs.get(name)
    }

    /// Reference range for an analyte, if configured.
    pub fn reference_range(&self, name: &str) -> Option<ReferenceRange> {
        self.specs.get(name).and_then(|s| s.reference)
    }

    /// Default unit for an analyte, if configured.
    pub fn default_unit(&self, name: &str) -> Option<&str> {
        self.specs
            .get(name)
            .and_then(|s| s.default_unit.as_deref())
    }

    /// Iterate over recognized analyte names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }
}

fn spec(name: &str, unit: &str, reference: Option<(f64, f64)>) -> AnalyteSpec {
    AnalyteSpec {
        name: name.to_string(),
        default_unit: Some(unit.to_string()),
        reference: reference.map(|(borderline, high)| ReferenceRange { borderline, high }),
    }
}
