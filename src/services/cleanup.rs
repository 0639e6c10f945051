use crate::metrics::RunMetrics;
use crate::models::Mode;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::Arc;

/// What a cleanup pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Files that were deleted
    pub removed: Vec<Utf8PathBuf>,

    /// Files that existed but could not be deleted, with the reason
    pub failed: Vec<(Utf8PathBuf, String)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Removes intermediate files once a Pack queue has drained.
///
/// Dump and KeystoreGen runs have nothing to remove. Deletion failures are
/// reported, never raised.
#[derive(Debug, Clone)]
pub struct ArtifactCleaner {
    metrics: Arc<RunMetrics>,
}

impl ArtifactCleaner {
    pub fn new(metrics: Arc<RunMetrics>) -> Self {
        Self { metrics }
    }

    /// Delete `artifacts` for a drained run of `mode`.
    pub fn clean(&self, mode: Mode, artifacts: &[Utf8PathBuf]) -> CleanupReport {
        let mut report = CleanupReport::default();
        if !mode.has_intermediates() {
            return report;
        }

        for path in artifacts {
            match remove_if_present(path) {
                Ok(true) => {
                    tracing::debug!("Removed intermediate {}", path);
                    self.metrics.record_artifact_removed();
                    report.removed.push(path.clone());
                }
                Ok(false) => {
                    tracing::debug!("Intermediate {} was not created, nothing to remove", path);
                }
                Err(e) => {
                    tracing::warn!("Failed to remove intermediate {}: {}", path, e);
                    self.metrics.record_cleanup_error();
                    report.failed.push((path.clone(), e.to_string()));
                }
            }
        }

        report
    }
}

fn remove_if_present(path: &Utf8Path) -> std::io::Result<bool> {
    if !path.is_file() {
        return Ok(false);
    }
    fs::remove_file(path)?;
    Ok(true)
}
