//! Move pending tiles from the flat staging root into `year/grid_folder/`.

use crate::pipeline::merge::MergedTable;
use crate::tilename::TimeRange;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One pending move: a staged file and the cell folder it belongs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveJob {
    pub source: PathBuf,
    pub cell_folder: String,
}

/// Select pending work from the merged table.
///
/// Pending means an unorganized path with no organized counterpart. A file
/// intersecting several grid cells appears in several rows but must move
/// exactly once; deduplication keeps the first row in table order, so the
/// file lands under that cell's folder while the snapshot still records every
/// intersecting cell.
pub fn plan_moves(table: &MergedTable) -> Vec<MoveJob> {
    let mut seen: HashSet<&Path> = HashSet::new();
    let mut jobs = Vec::new();

    for row in &table.rows {
        let source = match (&row.unorganized_path, &row.organized_path) {
            (Some(source), None) => source,
            _ => continue,
        };
        if seen.insert(source.as_path()) {
            jobs.push(MoveJob {
                source: source.clone(),
                cell_folder: row.cell.folder_name(),
            });
        }
    }

    jobs
}

/// Execute the planned moves in parallel on the current rayon pool.
///
/// Copy-then-delete, per item: partial failure is logged and counted without
/// aborting siblings. At-least-once semantics; a crash between copy and
/// delete leaves the file in both places and the next run treats it as
/// organized.
pub fn relocate(jobs: &[MoveJob], tiles_root: &Path) -> MoveStats {
    if jobs.is_empty() {
        tracing::info!("No new files to move");
        return MoveStats::default();
    }

    let outcomes: Vec<Result<()>> = jobs
        .par_iter()
        .map(|job| move_one(job, tiles_root))
        .collect();

    let mut stats = MoveStats {
        planned: jobs.len(),
        ..MoveStats::default()
    };
    for (job, outcome) in jobs.iter().zip(outcomes) {
        match outcome {
            Ok(()) => stats.moved += 1,
            Err(e) => {
                tracing::warn!("Failed to move {}: {:#}", job.source.display(), e);
                stats.failed += 1;
            }
        }
    }
    stats
}

fn move_one(job: &MoveJob, tiles_root: &Path) -> Result<()> {
    let year = TimeRange::parse(&job.source)?.year();

    let file_name = job
        .source
        .file_name()
        .with_context(|| format!("no file name in {}", job.source.display()))?;
    let dest_dir = tiles_root.join(year.to_string()).join(&job.cell_folder);
    std::fs::create_dir_all(&dest_dir)
        .with_context(|| format!("create {}", dest_dir.display()))?;

    let dest = dest_dir.join(file_name);
    std::fs::copy(&job.source, &dest)
        .with_context(|| format!("copy to {}", dest.display()))?;
    std::fs::remove_file(&job.source)
        .with_context(|| format!("remove {}", job.source.display()))?;

    Ok(())
}

/// Outcome counts for the relocation stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct MoveStats {
    /// Moves planned after filtering and deduplication.
    pub planned: usize,

    /// Files copied and removed from the staging root.
    pub moved: usize,

    /// Items that failed at any step.
    pub failed: usize,
}

impl std::fmt::Display for MoveStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Moved: {}, Failed: {}, Planned: {}",
            self.moved, self.failed, self.planned
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::GridCell;
    use crate::pipeline::merge::{MergedRow, MergedTable};

    fn cell() -> GridCell {
        GridCell {
            west: 0,
            south: 0,
            east: 5,
            north: 5,
        }
    }

    fn pending_row(cell: GridCell, source: &Path) -> MergedRow {
        MergedRow {
            cell,
            grid_id: Some("g1".into()),
            footprint_bounds: Some([0.5, 0.5, 1.5, 1.5]),
            unorganized_path: Some(source.to_path_buf()),
            organized_path: None,
            start_time: None,
            end_time: None,
        }
    }

    fn table(rows: Vec<MergedRow>) -> MergedTable {
        MergedTable {
            rows,
            stats: Default::default(),
        }
    }

    #[test]
    fn test_relocates_to_year_and_cell_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let tiles = tmp.path().join("AEF_tiles");
        std::fs::create_dir_all(&tiles).unwrap();

        let source = tiles.join("tile_20230101_20230115.tif");
        std::fs::write(&source, b"raster").unwrap();

        let jobs = vec![MoveJob {
            source: source.clone(),
            cell_folder: "grid_0_0_5_5".to_string(),
        }];
        let stats = relocate(&jobs, &tiles);

        assert_eq!(stats.moved, 1);
        assert_eq!(stats.failed, 0);

        let dest = tiles
            .join("2023")
            .join("grid_0_0_5_5")
            .join("tile_20230101_20230115.tif");
        assert!(dest.is_file());
        assert!(!source.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"raster");
    }

    #[test]
    fn test_plan_dedups_by_source_keeping_first_cell() {
        let source = PathBuf::from("/tiles/AEF_g1_20230101_20230115.tif");
        let other_cell = GridCell {
            west: 5,
            south: 0,
            east: 10,
            north: 5,
        };

        let jobs = plan_moves(&table(vec![
            pending_row(cell(), &source),
            pending_row(other_cell, &source),
        ]));

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].cell_folder, "grid_0_0_5_5");
    }

    #[test]
    fn test_plan_skips_rows_already_organized() {
        let source = PathBuf::from("/tiles/AEF_g1_20230101_20230115.tif");
        let mut row = pending_row(cell(), &source);
        row.organized_path =
            Some(PathBuf::from("/tiles/2023/grid_0_0_5_5/AEF_g1_20230101_20230115.tif"));

        assert!(plan_moves(&table(vec![row])).is_empty());
    }

    #[test]
    fn test_plan_skips_rows_without_files() {
        let mut row = pending_row(cell(), Path::new("/x.tif"));
        row.unorganized_path = None;
        assert!(plan_moves(&table(vec![row])).is_empty());
    }

    #[test]
    fn test_failure_does_not_abort_siblings() {
        let tmp = tempfile::tempdir().unwrap();
        let tiles = tmp.path().to_path_buf();

        let good = tiles.join("AEF_g1_20230101_20230115.tif");
        std::fs::write(&good, b"ok").unwrap();

        let jobs = vec![
            MoveJob {
                // Never created on disk.
                source: tiles.join("AEF_gone_20230101_20230115.tif"),
                cell_folder: "grid_0_0_5_5".to_string(),
            },
            MoveJob {
                source: good.clone(),
                cell_folder: "grid_0_0_5_5".to_string(),
            },
        ];
        let stats = relocate(&jobs, &tiles);

        assert_eq!(stats.planned, 2);
        assert_eq!(stats.moved, 1);
        assert_eq!(stats.failed, 1);
        assert!(!good.exists());
    }

    #[test]
    fn test_unparseable_year_is_item_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("nodate.tif");
        std::fs::write(&source, b"x").unwrap();

        let jobs = vec![MoveJob {
            source: source.clone(),
            cell_folder: "grid_0_0_5_5".to_string(),
        }];
        let stats = relocate(&jobs, tmp.path());

        assert_eq!(stats.failed, 1);
        // The file is untouched, not half-moved.
        assert!(source.is_file());
    }
}
