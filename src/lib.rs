// Main library entry point for Provenance.

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ports;

pub use error::{AnalyzerError, ProvenanceError};
