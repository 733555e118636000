//! File-listing scans of the tiles root.
//!
//! Two independent listings feed the merge: flat `*.tif` files directly under
//! the root (not yet organized) and files exactly two levels deep
//! (`<year>/<grid_folder>/*.tif`, already organized). Both correlate with
//! metadata by the grid identifier parsed from the file name.

use crate::tilename::{TileName, TimeRange};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// A tile still sitting in the flat staging root.
#[derive(Debug, Clone)]
pub struct UnorganizedFile {
    pub path: PathBuf,
    pub grid_id: String,
}

/// A tile already nested under `year/grid_folder/`.
#[derive(Debug, Clone)]
pub struct OrganizedFile {
    pub path: PathBuf,
    pub grid_id: String,
    pub range: TimeRange,
}

/// Both listings plus scan outcome counts.
#[derive(Debug, Default)]
pub struct TileListings {
    pub unorganized: Vec<UnorganizedFile>,
    pub organized: Vec<OrganizedFile>,
    pub stats: ScanStats,
}

/// Outcome counts for the listing scans.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanStats {
    /// Flat files listed under the root.
    pub unorganized_found: usize,

    /// Files listed two levels deep.
    pub organized_found: usize,

    /// Files excluded because their name violates the tile convention.
    pub parse_failures: usize,
}

impl std::fmt::Display for ScanStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Listings: {} unorganized, {} organized, {} unparseable names",
            self.unorganized_found, self.organized_found, self.parse_failures
        )
    }
}

/// Scan the tiles root for both listings.
///
/// A missing root yields empty listings (nothing downloaded yet is not an
/// error). File names that fail to parse are logged, counted, and excluded so
/// they can never join against the wrong grid identifier.
pub fn scan_tiles(tiles_root: &Path) -> Result<TileListings> {
    let mut listings = TileListings::default();
    if !tiles_root.is_dir() {
        return Ok(listings);
    }

    for path in glob_files(&tiles_root.join("*.tif"))? {
        listings.stats.unorganized_found += 1;
        match TileName::parse(&path) {
            Ok(name) => listings.unorganized.push(UnorganizedFile {
                path,
                grid_id: name.grid_id,
            }),
            Err(e) => {
                tracing::warn!("Skipping unorganized tile with bad name: {}", e);
                listings.stats.parse_failures += 1;
            }
        }
    }

    for path in glob_files(&tiles_root.join("*/*/*.tif"))? {
        listings.stats.organized_found += 1;
        match TileName::parse(&path) {
            Ok(name) => listings.organized.push(OrganizedFile {
                path,
                grid_id: name.grid_id,
                range: name.range,
            }),
            Err(e) => {
                tracing::warn!("Skipping organized tile with bad name: {}", e);
                listings.stats.parse_failures += 1;
            }
        }
    }

    Ok(listings)
}

/// Expand a glob pattern to plain files, in sorted order.
fn glob_files(pattern: &Path) -> Result<Vec<PathBuf>> {
    let pattern = pattern
        .to_str()
        .with_context(|| format!("non-UTF-8 path: {}", pattern.display()))?;

    Ok(glob::glob(pattern)
        .with_context(|| format!("bad glob pattern: {}", pattern))?
        .filter_map(|entry| match entry {
            Ok(path) if path.is_file() => Some(path),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Unreadable glob entry: {}", e);
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::File::create(path).unwrap();
    }

    #[test]
    fn test_scan_missing_root() {
        let listings = scan_tiles(Path::new("/nonexistent/aef_tiles")).unwrap();
        assert!(listings.unorganized.is_empty());
        assert!(listings.organized.is_empty());
    }

    #[test]
    fn test_scan_both_levels() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();

        touch(&root.join("AEF_g1_20230101_20230115.tif"));
        touch(&root.join("2023/grid_0_0_5_5/AEF_g2_20230101_20230115.tif"));
        // One level deep is neither listing.
        touch(&root.join("2023/AEF_g3_20230101_20230115.tif"));

        let listings = scan_tiles(root).unwrap();
        assert_eq!(listings.unorganized.len(), 1);
        assert_eq!(listings.unorganized[0].grid_id, "g1");
        assert_eq!(listings.organized.len(), 1);
        assert_eq!(listings.organized[0].grid_id, "g2");
        assert_eq!(listings.organized[0].range.year(), 2023);
    }

    #[test]
    fn test_bad_names_counted_and_excluded() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();

        touch(&root.join("AEF_g1_20230101_20230115.tif"));
        touch(&root.join("notadate.tif"));

        let listings = scan_tiles(root).unwrap();
        assert_eq!(listings.stats.unorganized_found, 2);
        assert_eq!(listings.unorganized.len(), 1);
        assert_eq!(listings.stats.parse_failures, 1);
    }

    #[test]
    fn test_non_tif_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();

        touch(&root.join("AEF_g1_20230101_20230115.csv"));

        let listings = scan_tiles(root).unwrap();
        assert_eq!(listings.stats.unorganized_found, 0);
        assert!(listings.unorganized.is_empty());
    }
}
