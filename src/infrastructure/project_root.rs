use crate::error::{AnalyzerError, ProvenanceError};
use crate::ports::RootLocator;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_MANIFEST: &str = "Cargo.toml";

/// Locates the project root as the nearest ancestor holding a manifest file.
pub struct ManifestRootLocator {
    manifest: String,
}

impl ManifestRootLocator {
    pub fn new(manifest: impl Into<String>) -> Self {
        Self {
            manifest: manifest.into(),
        }
    }

    pub fn manifest(&self) -> &str {
        &self.manifest
    }
}

impl Default for ManifestRootLocator {
    fn default() -> Self {
        Self::new(DEFAULT_MANIFEST)
    }
}

impl RootLocator for ManifestRootLocator {
    fn locate(&self, file: &Path) -> Result<PathBuf, ProvenanceError> {
        let not_found = || ProvenanceError::RootNotFound {
            file: file.to_path_buf(),
            manifest: self.manifest.clone(),
        };
        let absolute = absolute_path(file).map_err(|_| not_found())?;

        let mut dir = absolute.parent();
        while let Some(candidate) = dir {
            if candidate.join(&self.manifest).is_file() {
                log::debug!("project root for {}: {}", file.display(), candidate.display());
                return Ok(candidate.to_path_buf());
            }
            dir = candidate.parent();
        }
        Err(not_found())
    }
}

/// `file` expressed relative to `root`, `/`-separated with a leading `/`
/// (`/src/lib.rs`). This is the filename format analyzers report.
pub fn project_relative(root: &Path, file: &Path) -> Option<String> {
    let file = absolute_path(file).ok()?;
    let root = absolute_path(root).ok()?;
    let relative = file.strip_prefix(&root).ok()?;

    let mut out = String::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                out.push('/');
                out.push_str(part.to_str()?);
            }
            _ => return None,
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn absolute_path(path: &Path) -> std::io::Result<PathBuf> {
    // Canonicalize when possible so symlinked roots compare equal; fall back
    // for files that do not exist yet.
    fs::canonicalize(path).or_else(|_| std::path::absolute(path))
}

/// The fields of a Cargo manifest the analyzer uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectManifest {
    /// Package name with `-` mapped to `_`, as it appears in paths.
    pub crate_name: String,
}

impl ProjectManifest {
    /// Read `manifest` under `root`. A missing manifest, or one without a
    /// `[package]` table, falls back to the directory name.
    pub fn load(root: &Path, manifest: &str) -> Result<Self, AnalyzerError> {
        let path = root.join(manifest);
        if !path.is_file() {
            return Ok(Self::fallback(root));
        }
        let content = fs::read_to_string(&path).map_err(|source| AnalyzerError::Io {
            path: path.clone(),
            source,
        })?;
        let parsed: toml::Value = toml::from_str(&content).map_err(|e| AnalyzerError::Manifest {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        match parsed
            .get("package")
            .and_then(|p| p.get("name"))
            .and_then(|n| n.as_str())
        {
            Some(name) => Ok(Self {
                crate_name: name.replace('-', "_"),
            }),
            // Virtual workspace manifests have no [package].
            None => Ok(Self::fallback(root)),
        }
    }

    fn fallback(root: &Path) -> Self {
        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("crate");
        Self {
            crate_name: name.replace('-', "_"),
        }
    }
}
