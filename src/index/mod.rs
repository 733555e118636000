//! Footprint metadata and the fixed world grid.

mod footprints;
mod world_grid;

pub use footprints::{FootprintIndex, LoadStats, TileFootprint};
pub use world_grid::{GridCell, WorldGrid, CELL_SIZE_DEG, WORLD_BOUNDS};
