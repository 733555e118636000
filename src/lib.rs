//! AEF Tile Distribution Pipeline
//!
//! Organizes AlphaEarth embedding tiles downloaded from GEE: loads per-archive
//! footprint metadata, joins it against a fixed global 5°×5° grid, snapshots
//! the merged coverage table, moves staged tiles into `year/grid_folder/`
//! destinations, and removes emptied extraction directories.
//!
//! # Architecture
//!
//! - **Index**: footprint metadata with R-tree spatial queries, plus the
//!   fixed world grid
//! - **I/O**: filesystem listing scans and the GeoJSON snapshot
//! - **Pipeline**: merge, relocation, and cleanup stages with per-item
//!   outcome collection
//! - **Tools**: archive extraction (`extract`) and per-export coverage
//!   rendering (`vis`)
//!
//! # Usage
//!
//! ```no_run
//! use aef_distribute::{run_pipeline, Config};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file(std::path::Path::new("config.yaml"))?;
//!     let stats = run_pipeline(&config)?;
//!     println!("{}", stats);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod extract;
pub mod index;
pub mod io;
pub mod pipeline;
pub mod tilename;
pub mod vis;

pub use config::{Config, PathsConfig};
pub use index::{FootprintIndex, WorldGrid};
pub use pipeline::PipelineStats;

use anyhow::{Context, Result};

/// Run the full distribution pipeline.
///
/// Stages run strictly in order and each stage's worker pool drains before
/// the next stage starts. The destination tree is assumed to be ours alone
/// for the duration of the run; concurrent external mutation is not guarded
/// against.
pub fn run_pipeline(config: &Config) -> Result<PipelineStats> {
    config.validate()?;
    let paths = &config.paths;
    std::fs::create_dir_all(paths.metadata())
        .with_context(|| format!("create {}", paths.metadata().display()))?;

    tracing::info!("Loading metadata from {}", paths.extracted().display());
    let (footprints, load_stats) = FootprintIndex::load(&paths.extracted())?;
    tracing::info!("{}", load_stats);

    let grid = WorldGrid::build();
    tracing::info!("Created {} grid cells", grid.len());

    tracing::info!("Scanning tiles under {}", paths.tiles().display());
    let listings = io::scan_tiles(&paths.tiles())?;
    tracing::info!("{}", listings.stats);

    let table = pipeline::merge::merge(&grid, &footprints, &listings);
    tracing::info!("{}", table.stats);
    merge_snapshot(config, &table)?;

    let jobs = pipeline::relocate::plan_moves(&table);
    tracing::info!("Moving {} files", jobs.len());
    let move_stats = pipeline::relocate::relocate(&jobs, &paths.tiles());
    tracing::info!("{}", move_stats);

    tracing::info!("Cleaning empty directories under {}", paths.extracted().display());
    let reap_stats = pipeline::reap::sweep(&paths.extracted());
    tracing::info!("{}", reap_stats);

    let stats = PipelineStats {
        load: load_stats,
        scan: listings.stats,
        merge: table.stats,
        moves: move_stats,
        reap: reap_stats,
    };
    tracing::info!("Pipeline complete: {}", stats);
    Ok(stats)
}

fn merge_snapshot(config: &Config, table: &pipeline::MergedTable) -> Result<()> {
    let snapshot = config.paths.snapshot();
    pipeline::merge::write_snapshot(&snapshot, table)?;
    tracing::info!("Merged data saved to {}", snapshot.display());
    Ok(())
}

/// Initialize the global rayon thread pool used by the I/O-bound stages.
pub fn init_rayon(threads: Option<usize>) -> Result<()> {
    if let Some(threads) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to initialize thread pool")?;
    }
    Ok(())
}
