use crate::error::AnalyzerError;
use crate::infrastructure::project_root::DEFAULT_MANIFEST;
use std::fs;
use std::path::{Path, PathBuf};

/// Scan settings for the bundled analyzer.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Directory names never descended into.
    pub exclude: Vec<String>,
    /// Parser threads; `None` picks half the available cores.
    pub jobs: Option<usize>,
    /// Manifest file read for the crate name. Match the root locator's.
    pub manifest: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude: vec!["target".to_string(), ".git".to_string()],
            jobs: None,
            manifest: DEFAULT_MANIFEST.to_string(),
        }
    }
}

impl ScanConfig {
    pub fn with_excludes<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(extra.into_iter().map(Into::into));
        self
    }

    fn skips(&self, dir: &Path) -> bool {
        match dir.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.starts_with('.') || self.exclude.iter().any(|e| e == name),
            None => false,
        }
    }
}

/// Collect every `.rs` file under `root`, sorted by path.
pub fn collect_rs_files(root: &Path, config: &ScanConfig) -> Result<Vec<PathBuf>, AnalyzerError> {
    let mut files = Vec::new();
    collect_rs_recursive(root, config, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_rs_recursive(
    dir: &Path,
    config: &ScanConfig,
    out: &mut Vec<PathBuf>,
) -> Result<(), AnalyzerError> {
    let io_err = |source| AnalyzerError::Io {
        path: dir.to_path_buf(),
        source,
    };

    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            if !config.skips(&path) {
                collect_rs_recursive(&path, config, out)?;
            }
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            out.push(path);
        }
    }
    Ok(())
}
