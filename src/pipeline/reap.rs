//! Delete now-empty extraction subdirectories.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Sweep second-level subdirectories of the extraction root, removing each
/// one that is empty at the instant of listing.
///
/// A directory populated concurrently with the sweep is either skipped or
/// fails removal; both are logged and non-fatal. Re-running on a clean tree
/// is a no-op. File existence is never affected.
pub fn sweep(extracted_root: &Path) -> ReapStats {
    let candidates = match list_candidates(extracted_root) {
        Ok(dirs) => dirs,
        Err(e) => {
            tracing::warn!(
                "Skipping directory cleanup under {}: {:#}",
                extracted_root.display(),
                e
            );
            return ReapStats::default();
        }
    };

    let outcomes: Vec<Result<bool>> = candidates
        .par_iter()
        .map(|dir| remove_if_empty(dir))
        .collect();

    let mut stats = ReapStats {
        scanned: candidates.len(),
        ..ReapStats::default()
    };
    for (dir, outcome) in candidates.iter().zip(outcomes) {
        match outcome {
            Ok(true) => stats.removed += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("Failed to remove directory {}: {:#}", dir.display(), e);
                stats.failed += 1;
            }
        }
    }
    stats
}

/// Second-level directories (`<root>/<archive>/<sub>`), sorted.
fn list_candidates(extracted_root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    if !extracted_root.is_dir() {
        return Ok(dirs);
    }

    for archive in std::fs::read_dir(extracted_root)
        .with_context(|| format!("list {}", extracted_root.display()))?
    {
        let archive = archive?.path();
        if !archive.is_dir() {
            continue;
        }
        for sub in
            std::fs::read_dir(&archive).with_context(|| format!("list {}", archive.display()))?
        {
            let sub = sub?.path();
            if sub.is_dir() {
                dirs.push(sub);
            }
        }
    }

    dirs.sort();
    Ok(dirs)
}

fn remove_if_empty(dir: &Path) -> Result<bool> {
    let empty = std::fs::read_dir(dir)
        .with_context(|| format!("list {}", dir.display()))?
        .next()
        .is_none();
    if !empty {
        return Ok(false);
    }
    std::fs::remove_dir(dir).with_context(|| format!("remove {}", dir.display()))?;
    Ok(true)
}

/// Outcome counts for the cleanup stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReapStats {
    /// Second-level directories examined.
    pub scanned: usize,

    /// Empty directories removed.
    pub removed: usize,

    /// Removals that failed.
    pub failed: usize,
}

impl std::fmt::Display for ReapStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Removed: {}, Failed: {}, Scanned: {}",
            self.removed, self.failed, self.scanned
        )
    }
}
