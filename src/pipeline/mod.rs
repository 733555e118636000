//! The five-stage distribution pipeline.
//!
//! Stages run strictly in order — load metadata, build the grid, merge and
//! snapshot, relocate, clean up — with parallelism only inside a stage. Each
//! stage drains its worker pool before the next one starts.

pub mod merge;
pub mod relocate;
pub mod reap;


pub use merge::{MergeStats, MergedRow, MergedTable};
pub use reap::ReapStats;
pub use relocate::{MoveJob, MoveStats};

use crate::index::LoadStats;
use crate::io::ScanStats;

/// Statistics from a full pipeline run.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub load: LoadStats,
    pub scan: ScanStats,
    pub merge: MergeStats,
    pub moves: MoveStats,
    pub reap: ReapStats,
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | {} | {} | moves: {} | cleanup: {}",
            self.load, self.scan, self.merge, self.moves, self.reap
        )
    }
}
