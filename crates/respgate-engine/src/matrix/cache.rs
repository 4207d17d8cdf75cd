use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use respgate_core::errors::GateError;

use super::Matrix;

pub const DEFAULT_MATRIX: &str = "matrices/v0.1.json";

/// Named matrix profiles selectable through `context.profile`.
const PROFILES: &[(&str, &str)] = &[
    ("pr_review_loop", "matrices/pr_loop_demo.json"),
    ("pr_review_loop_converged", "matrices/pr_loop_phase_e.json"),
    ("pr_review_loop_churn", "matrices/pr_loop_churn.json"),
];

/// Matrix path for a profile. Absent, blank or unknown profiles get `default`.
pub fn resolve_matrix_path(profile: Option<&str>, default: &str) -> String {
    let Some(name) = profile.map(str::trim).filter(|p| !p.is_empty()) else {
        return default.to_string();
    };
    PROFILES
        .iter()
        .find(|(p, _)| *p == name)
        .map_or_else(|| default.to_string(), |(_, path)| path.to_string())
}

/// Loaded matrices keyed by resolved path.
///
/// Owned by the gate. Loading a path a second time returns the same
/// `Arc`; entries live until [`MatrixCache::clear`].
pub struct MatrixCache {
    root: PathBuf,
    entries: Mutex<HashMap<PathBuf, Arc<Matrix>>>,
}

impl MatrixCache {
    /// Relative matrix paths resolve against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    pub fn load(&self, path: &str) -> Result<Arc<Matrix>, GateError> {
        let resolved = self.resolve(path);
        let mut entries = self.entries.lock();
        if let Some(m) = entries.get(&resolved) {
            return Ok(m.clone());
        }
        let matrix = Arc::new(Matrix::load(&resolved)?);
        info!(
            path = %resolved.display(),
            version = %matrix.version,
            rules = matrix.rules.len(),
            "matrix loaded"
        );
        entries.insert(resolved, matrix.clone());
        Ok(matrix)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
