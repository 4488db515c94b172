// Error types for provenance queries.

use crate::domain::span::Position;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a source analyzer at the end of its scan.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: syn::Error,
    },

    #[error("invalid manifest {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error("failed to start parser pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("analysis aborted: {0}")]
    Aborted(String),
}

/// Failure of a whole provenance query.
#[derive(Debug, Error)]
pub enum ProvenanceError {
    #[error("no {manifest} found above {}", file.display())]
    RootNotFound { file: PathBuf, manifest: String },

    #[error("cannot query {}: {reason}", file.display())]
    InvalidQuery { file: PathBuf, reason: String },

    #[error("analysis of {} failed", root.display())]
    AnalysisFailed {
        root: PathBuf,
        #[source]
        source: AnalyzerError,
    },

    #[error("no code unit at {file}:{position}")]
    NoTarget { file: String, position: Position },

    #[error("failed to write graph")]
    Output(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProvenanceError>;
