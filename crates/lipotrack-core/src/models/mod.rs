//! Domain models for the LipoTrack core.

mod analyte;
mod measurement;
mod medication;
mod patient;

pub use analyte::*;
pub use measurement::*;
pub use medication::*;
pub use patient::*;
