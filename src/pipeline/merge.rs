//! Spatial join and listing merge.
//!
//! Joins the fixed grid against loaded footprints (left join, intersection
//! predicate), then against the two filesystem listings by grid identifier.
//! The result is the coverage table persisted as the GeoJSON snapshot: what
//! the grid says should exist next to what the filesystem actually has.

use crate::index::{FootprintIndex, GridCell, WorldGrid};
use crate::io::geojson::{Feature, FeatureCollection, Geometry};
use crate::io::{geojson, OrganizedFile, TileListings, UnorganizedFile};
use anyhow::Result;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One row of the merged coverage table.
///
/// `grid_id` and the footprint bounds are `None` for cells no footprint
/// intersects; the two path fields are `None` when no physical file shares the
/// footprint's grid identifier. A row with an unorganized path and no
/// organized path denotes pending relocation work.
#[derive(Debug, Clone)]
pub struct MergedRow {
    pub cell: GridCell,
    pub grid_id: Option<String>,
    pub footprint_bounds: Option<[f64; 4]>,
    pub unorganized_path: Option<PathBuf>,
    pub organized_path: Option<PathBuf>,
    pub start_time: Option<NaiveDate>,
    pub end_time: Option<NaiveDate>,
}

/// The merged table plus outcome counts.
#[derive(Debug)]
pub struct MergedTable {
    pub rows: Vec<MergedRow>,
    pub stats: MergeStats,
}

/// Outcome counts for the merge stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct MergeStats {
    /// Grid cells considered (always the full partition).
    pub cells: usize,

    /// Cells at least one footprint intersects.
    pub cells_with_tiles: usize,

    /// Rows in the merged table.
    pub rows: usize,

    /// Flat files that joined at least one row.
    pub unorganized_files: usize,

    /// Organized files that joined at least one row.
    pub organized_files: usize,
}

impl std::fmt::Display for MergeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Coverage: {}/{} cells with tiles ({:.1}%), {} rows, {} unorganized files joined, {} organized files joined",
            self.cells_with_tiles,
            self.cells,
            self.cells_with_tiles as f64 / self.cells.max(1) as f64 * 100.0,
            self.rows,
            self.unorganized_files,
            self.organized_files
        )
    }
}

/// Build the merged table.
///
/// Row order is deterministic: grid construction order, footprints in load
/// order within a cell, listing files in scan order within a footprint. The
/// two listing joins fan out Cartesian-style per grid identifier, and an
/// identifier present in both listings is considered organized regardless of
/// where its organized copy actually sits.
pub fn merge(
    grid: &WorldGrid,
    footprints: &FootprintIndex,
    listings: &TileListings,
) -> MergedTable {
    let mut by_grid_unorganized: HashMap<&str, Vec<&UnorganizedFile>> = HashMap::new();
    for file in &listings.unorganized {
        by_grid_unorganized
            .entry(file.grid_id.as_str())
            .or_default()
            .push(file);
    }
    let mut by_grid_organized: HashMap<&str, Vec<&OrganizedFile>> = HashMap::new();
    for file in &listings.organized {
        by_grid_organized
            .entry(file.grid_id.as_str())
            .or_default()
            .push(file);
    }

    let mut stats = MergeStats {
        cells: grid.len(),
        ..MergeStats::default()
    };
    let mut joined_unorganized: std::collections::HashSet<&Path> = Default::default();
    let mut joined_organized: std::collections::HashSet<&Path> = Default::default();
    let mut rows = Vec::new();

    for cell in grid.cells() {
        let hits = footprints.query_intersecting(&cell.bounds());
        if hits.is_empty() {
            rows.push(MergedRow {
                cell: *cell,
                grid_id: None,
                footprint_bounds: None,
                unorganized_path: None,
                organized_path: None,
                start_time: None,
                end_time: None,
            });
            continue;
        }

        stats.cells_with_tiles += 1;
        for footprint in hits {
            let unorganized: Vec<Option<&UnorganizedFile>> =
                match by_grid_unorganized.get(footprint.grid_id.as_str()) {
                    Some(files) => files.iter().map(|f| Some(*f)).collect(),
                    None => vec![None],
                };
            let organized: Vec<Option<&OrganizedFile>> =
                match by_grid_organized.get(footprint.grid_id.as_str()) {
                    Some(files) => files.iter().map(|f| Some(*f)).collect(),
                    None => vec![None],
                };

            for u in &unorganized {
                for o in &organized {
                    if let Some(u) = u {
                        joined_unorganized.insert(u.path.as_path());
                    }
                    if let Some(o) = o {
                        joined_organized.insert(o.path.as_path());
                    }
                    rows.push(MergedRow {
                        cell: *cell,
                        grid_id: Some(footprint.grid_id.clone()),
                        footprint_bounds: Some(footprint.bounds),
                        unorganized_path: u.map(|f| f.path.clone()),
                        organized_path: o.map(|f| f.path.clone()),
                        start_time: o.map(|f| f.range.start),
                        end_time: o.map(|f| f.range.end),
                    });
                }
            }
        }
    }

    stats.rows = rows.len();
    stats.unorganized_files = joined_unorganized.len();
    stats.organized_files = joined_organized.len();

    MergedTable { rows, stats }
}

/// Persist the merged table as a GeoJSON snapshot, overwriting any prior one.
///
/// Each row becomes one feature whose geometry is its grid-cell polygon.
pub fn write_snapshot(path: &Path, table: &MergedTable) -> Result<()> {
    let features = table
        .rows
        .iter()
        .map(|row| {
            let mut props = Map::new();
            props.insert("folder_name".into(), Value::from(row.cell.folder_name()));
            props.insert("grid_name".into(), json_opt_str(row.grid_id.as_deref()));
            if let Some([w, s, e, n]) = row.footprint_bounds {
                props.insert("lon_min".into(), Value::from(w));
                props.insert("lat_min".into(), Value::from(s));
                props.insert("lon_max".into(), Value::from(e));
                props.insert("lat_max".into(), Value::from(n));
            } else {
                for key in ["lon_min", "lat_min", "lon_max", "lat_max"] {
                    props.insert(key.into(), Value::Null);
                }
            }
            props.insert(
                "file_path".into(),
                json_opt_str(row.unorganized_path.as_deref().and_then(Path::to_str)),
            );
            props.insert(
                "file_path_copied".into(),
                json_opt_str(row.organized_path.as_deref().and_then(Path::to_str)),
            );
            props.insert(
                "start_time".into(),
                json_opt_str(
                    row.start_time
                        .map(|d| d.format("%Y%m%d").to_string())
                        .as_deref(),
                ),
            );
            props.insert(
                "end_time".into(),
                json_opt_str(
                    row.end_time
                        .map(|d| d.format("%Y%m%d").to_string())
                        .as_deref(),
                ),
            );

            Feature::new(Geometry::polygon(&row.cell.ring()), props)
        })
        .collect();

    geojson::write(path, &FeatureCollection::new(features))
}

fn json_opt_str(value: Option<&str>) -> Value {
    match value {
        Some(s) => Value::from(s),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::TileFootprint;
    use crate::tilename::TimeRange;

    fn range(y: i32) -> TimeRange {
        TimeRange {
            start: NaiveDate::from_ymd_opt(y, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(y, 1, 15).unwrap(),
        }
    }

    fn footprints(entries: &[(&str, [f64; 4])]) -> FootprintIndex {
        FootprintIndex::from_footprints(
            entries
                .iter()
                .map(|(id, bounds)| TileFootprint {
                    grid_id: id.to_string(),
                    bounds: *bounds,
                })
                .collect(),
        )
    }

    #[test]
    fn test_empty_cells_keep_rows() {
        let grid = WorldGrid::build();
        let index = footprints(&[("g1", [0.5, 0.5, 1.5, 1.5])]);
        let table = merge(&grid, &index, &TileListings::default());

        // Every cell yields at least one row; g1 sits wholly inside one cell.
        assert_eq!(table.rows.len(), grid.len());
        assert_eq!(table.stats.cells_with_tiles, 1);

        let hit = table
            .rows
            .iter()
            .find(|r| r.grid_id.is_some())
            .expect("one matched row");
        assert_eq!(hit.cell.folder_name(), "grid_0_0_5_5");
        assert!(hit.unorganized_path.is_none());
        assert!(hit.organized_path.is_none());
    }

    #[test]
    fn test_footprint_spanning_cells_matches_each() {
        let grid = WorldGrid::build();
        // Straddles the lon=5 cell edge.
        let index = footprints(&[("wide", [4.0, 1.0, 6.0, 2.0])]);
        let table = merge(&grid, &index, &TileListings::default());

        let cells: Vec<String> = table
            .rows
            .iter()
            .filter(|r| r.grid_id.is_some())
            .map(|r| r.cell.folder_name())
            .collect();
        assert!(cells.contains(&"grid_0_0_5_5".to_string()));
        assert!(cells.contains(&"grid_5_0_10_5".to_string()));
    }

    #[test]
    fn test_listing_joins_fan_out() {
        let grid = WorldGrid::build();
        let index = footprints(&[
            ("g1", [0.5, 0.5, 1.5, 1.5]),
            ("g1", [1.0, 1.0, 2.0, 2.0]),
        ]);

        let listings = TileListings {
            unorganized: vec![UnorganizedFile {
                path: PathBuf::from("/tiles/AEF_g1_20230101_20230115.tif"),
                grid_id: "g1".into(),
            }],
            organized: vec![],
            stats: Default::default(),
        };

        let table = merge(&grid, &index, &listings);
        let matched: Vec<&MergedRow> = table
            .rows
            .iter()
            .filter(|r| r.grid_id.as_deref() == Some("g1"))
            .collect();

        // Two footprints in the same cell, each joined to the one file.
        assert_eq!(matched.len(), 2);
        assert!(matched.iter().all(|r| r.unorganized_path.is_some()));
        assert!(matched.iter().all(|r| r.organized_path.is_none()));
        assert_eq!(table.stats.unorganized_files, 1);
    }

    #[test]
    fn test_organized_join_carries_time_range() {
        let grid = WorldGrid::build();
        let index = footprints(&[("g1", [0.5, 0.5, 1.5, 1.5])]);

        let listings = TileListings {
            unorganized: vec![],
            organized: vec![OrganizedFile {
                path: PathBuf::from("/tiles/2023/grid_0_0_5_5/AEF_g1_20230101_20230115.tif"),
                grid_id: "g1".into(),
                range: range(2023),
            }],
            stats: Default::default(),
        };

        let table = merge(&grid, &index, &listings);
        let row = table
            .rows
            .iter()
            .find(|r| r.grid_id.as_deref() == Some("g1"))
            .unwrap();
        assert!(row.unorganized_path.is_none());
        assert_eq!(row.start_time, Some(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()));
        assert_eq!(row.end_time, Some(NaiveDate::from_ymd_opt(2023, 1, 15).unwrap()));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let grid = WorldGrid::build();
        let index = footprints(&[("g1", [0.5, 0.5, 1.5, 1.5])]);
        let table = merge(&grid, &index, &TileListings::default());

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("metadata").join("snapshot.geojson");
        write_snapshot(&path, &table).unwrap();

        let back = geojson::read(&path).unwrap();
        assert_eq!(back.features.len(), table.rows.len());
        for feature in &back.features {
            assert_eq!(feature.geometry.kind, "Polygon");
            let ring = &feature.geometry.coordinates[0];
            assert_eq!(ring.len(), 5);
            assert_eq!(ring.first(), ring.last());
        }
    }
}
