// Infrastructure implementations for Provenance.

pub mod concurrency;
pub mod project_root;
pub mod source_scan;
pub mod syn_analyzer;

pub use project_root::{project_relative, ManifestRootLocator, ProjectManifest, DEFAULT_MANIFEST};
pub use source_scan::ScanConfig;
pub use syn_analyzer::SynAnalyzer;
