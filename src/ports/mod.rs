// Port traits between the provenance core and its collaborators.

use crate::domain::event::AnalysisEvent;
use crate::domain::provenance::ProvenanceGraph;
use crate::error::{AnalyzerError, ProvenanceError};
use std::io::Write;
use std::path::{Path, PathBuf};

pub mod dot_exporter;
pub mod json_exporter;

/// Receives analysis events, one at a time, in emission order.
pub trait EventSink {
    fn handle(&mut self, event: AnalysisEvent);
}

impl EventSink for Vec<AnalysisEvent> {
    fn handle(&mut self, event: AnalysisEvent) {
        self.push(event);
    }
}

/// Finds the project a source file belongs to.
pub trait RootLocator {
    fn locate(&self, file: &Path) -> Result<PathBuf, ProvenanceError>;
}

/// Performs one full scan of a project, emitting events into `sink`.
/// Returning means the scan is complete.
pub trait SourceAnalyzer {
    fn analyze(&self, root: &Path, sink: &mut dyn EventSink) -> Result<(), AnalyzerError>;
}

pub trait GraphExporter {
    fn export(&self, graph: &ProvenanceGraph, out: &mut dyn Write) -> std::io::Result<()>;
}
