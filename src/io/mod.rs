//! Filesystem listings and the GeoJSON snapshot format.

pub mod geojson;
mod scan;

pub use scan::{scan_tiles, OrganizedFile, ScanStats, TileListings, UnorganizedFile};
