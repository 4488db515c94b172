// Provenance query use case: locate, analyze, resolve, walk, render.

use crate::domain::provenance::{ProvenanceBuilder, ProvenanceGraph};
use crate::domain::recorder::RelationRecorder;
use crate::domain::span::Position;
use crate::domain::target::TargetQuery;
use crate::error::{ProvenanceError, Result};
use crate::infrastructure::project_relative;
use crate::ports::{GraphExporter, RootLocator, SourceAnalyzer};
use std::io::Write;
use std::path::PathBuf;

/// A cursor in a source file. Line and column are one-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub file: PathBuf,
    pub position: Position,
}

impl Query {
    pub fn new(file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            position: Position::new(line, column),
        }
    }
}

pub struct ProvenanceUsecase<'a> {
    pub locator: &'a dyn RootLocator,
    pub analyzer: &'a dyn SourceAnalyzer,
    pub exporter: &'a dyn GraphExporter,
}

impl<'a> ProvenanceUsecase<'a> {
    /// Build the provenance graph for `query`. Every call owns its own
    /// recorder, so independent queries never share state.
    pub fn trace(&self, query: &Query) -> Result<ProvenanceGraph> {
        let root = self.locator.locate(&query.file)?;
        let file = project_relative(&root, &query.file).ok_or_else(|| {
            ProvenanceError::InvalidQuery {
                file: query.file.clone(),
                reason: format!("not inside project root {}", root.display()),
            }
        })?;
        log::info!("tracing {}:{} in {}", file, query.position, root.display());

        let mut recorder = RelationRecorder::new(TargetQuery {
            file,
            position: query.position,
        });
        self.analyzer
            .analyze(&root, &mut recorder)
            .map_err(|source| ProvenanceError::AnalysisFailed {
                root: root.clone(),
                source,
            })?;

        let recorded = recorder.freeze();
        let target = recorded.resolve_target().ok_or_else(|| {
            let asked = recorded.query();
            ProvenanceError::NoTarget {
                file: asked.file.clone(),
                position: asked.position,
            }
        })?;
        Ok(ProvenanceBuilder::new(&recorded).build(target))
    }

    /// Trace `query` and write the rendered graph to `out`. Nothing is
    /// written unless the whole query succeeds.
    pub fn run(&self, query: &Query, out: &mut dyn Write) -> Result<()> {
        let graph = self.trace(query)?;
        let mut rendered = Vec::new();
        self.exporter.export(&graph, &mut rendered)?;
        out.write_all(&rendered)?;
        out.flush()?;
        Ok(())
    }
}
