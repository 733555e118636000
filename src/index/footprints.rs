//! Load per-archive metadata CSVs and build an R-tree of tile footprints.

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};
use std::path::{Path, PathBuf};

/// A rectangular tile footprint read from a metadata CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct TileFootprint {
    /// Grid identifier correlating the footprint with physical tile files.
    pub grid_id: String,

    /// Bounding box `[lon_min, lat_min, lon_max, lat_max]`.
    pub bounds: [f64; 4],
}

impl TileFootprint {
    /// Closed 5-vertex exterior ring, counter-clockwise from the southwest corner.
    pub fn ring(&self) -> [[f64; 2]; 5] {
        let [w, s, e, n] = self.bounds;
        [[w, s], [e, s], [e, n], [w, n], [w, s]]
    }

    /// Rectangle area in square degrees.
    pub fn area(&self) -> f64 {
        let [w, s, e, n] = self.bounds;
        (e - w) * (n - s)
    }
}

/// R-tree entry: footprint position in load order plus its envelope.
///
/// The index keeps query results sortable back into load order, which fixes
/// merged-row order downstream.
#[derive(Debug, Clone)]
struct IndexedFootprint {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedFootprint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// All loaded footprints with spatial query support.
pub struct FootprintIndex {
    footprints: Vec<TileFootprint>,
    rtree: RTree<IndexedFootprint>,
}

impl FootprintIndex {
    /// Discover and load every `*/metadata/*_grid_cells.csv` under the
    /// extraction root, in parallel on the current rayon pool.
    ///
    /// Individual unreadable files are logged and skipped; the load fails only
    /// when zero metadata files are found or zero rows survive cleaning, which
    /// aborts the pipeline before any side effects.
    pub fn load(extracted_root: &Path) -> Result<(Self, LoadStats)> {
        let pattern = extracted_root.join("*/metadata/*_grid_cells.csv");
        let pattern = pattern
            .to_str()
            .with_context(|| format!("non-UTF-8 path: {}", extracted_root.display()))?;

        let files: Vec<PathBuf> = glob::glob(pattern)
            .with_context(|| format!("bad glob pattern: {}", pattern))?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!("Unreadable glob entry: {}", e);
                    None
                }
            })
            .collect();

        if files.is_empty() {
            bail!("no metadata files found under {}", extracted_root.display());
        }

        tracing::info!("Reading {} metadata files", files.len());

        let per_file: Vec<Result<(Vec<TileFootprint>, FileCounts)>> = files
            .par_iter()
            .map(|file| read_csv_file(file))
            .collect();

        let mut stats = LoadStats {
            files_found: files.len(),
            ..LoadStats::default()
        };
        let mut footprints = Vec::new();
        for (file, result) in files.iter().zip(per_file) {
            match result {
                Ok((rows, counts)) => {
                    stats.files_read += 1;
                    stats.rows_read += counts.rows_read;
                    stats.rows_dropped_numeric += counts.rows_dropped_numeric;
                    stats.rows_dropped_geometry += counts.rows_dropped_geometry;
                    footprints.extend(rows);
                }
                Err(e) => {
                    tracing::warn!("Failed to read metadata file {}: {:#}", file.display(), e);
                    stats.files_failed += 1;
                }
            }
        }

        if footprints.is_empty() {
            bail!(
                "no metadata rows survived cleaning ({} files, {} rows read)",
                stats.files_found,
                stats.rows_read
            );
        }

        stats.footprints = footprints.len();
        Ok((Self::from_footprints(footprints), stats))
    }

    /// Build an index from already-validated footprints.
    pub fn from_footprints(footprints: Vec<TileFootprint>) -> Self {
        let entries: Vec<IndexedFootprint> = footprints
            .iter()
            .enumerate()
            .map(|(index, fp)| IndexedFootprint {
                index,
                envelope: AABB::from_corners(
                    [fp.bounds[0], fp.bounds[1]],
                    [fp.bounds[2], fp.bounds[3]],
                ),
            })
            .collect();
        let rtree = RTree::bulk_load(entries);
        Self { footprints, rtree }
    }

    /// Footprints intersecting the given bounds, in load order.
    ///
    /// Closed-box intersection: footprints touching the query boundary count.
    pub fn query_intersecting(&self, bounds: &[f64; 4]) -> Vec<&TileFootprint> {
        let envelope = AABB::from_corners([bounds[0], bounds[1]], [bounds[2], bounds[3]]);
        let mut hits: Vec<usize> = self
            .rtree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.index)
            .collect();
        hits.sort_unstable();
        hits.into_iter().map(|i| &self.footprints[i]).collect()
    }

    /// All footprints, in load order.
    pub fn footprints(&self) -> &[TileFootprint] {
        &self.footprints
    }

    pub fn len(&self) -> usize {
        self.footprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.footprints.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct FileCounts {
    rows_read: usize,
    rows_dropped_numeric: usize,
    rows_dropped_geometry: usize,
}

/// Read one metadata CSV into footprints.
fn read_csv_file(file: &Path) -> Result<(Vec<TileFootprint>, FileCounts)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(file)
        .with_context(|| format!("open {}", file.display()))?;

    let headers = reader.headers()?.clone();
    let lon_min_col = find_column(&headers, &["lon_min", "min_lon", "xmin", "west"])?;
    let lat_min_col = find_column(&headers, &["lat_min", "min_lat", "ymin", "south"])?;
    let lon_max_col = find_column(&headers, &["lon_max", "max_lon", "xmax", "east"])?;
    let lat_max_col = find_column(&headers, &["lat_max", "max_lat", "ymax", "north"])?;
    let grid_col = find_column(&headers, &["grid_name", "grid_id", "name"])?;

    let mut counts = FileCounts::default();
    let mut footprints = Vec::new();

    for record in reader.records() {
        let record = record.with_context(|| format!("read {}", file.display()))?;
        counts.rows_read += 1;

        let bounds = [
            parse_bound(&record, lon_min_col),
            parse_bound(&record, lat_min_col),
            parse_bound(&record, lon_max_col),
            parse_bound(&record, lat_max_col),
        ];
        // Invalid values become missing, and rows with any missing bound drop.
        let bounds = match bounds {
            [Some(w), Some(s), Some(e), Some(n)] => [w, s, e, n],
            _ => {
                counts.rows_dropped_numeric += 1;
                continue;
            }
        };

        if !valid_rectangle(&bounds) {
            tracing::warn!(
                "Dropping degenerate footprint in {}: lon_min={}, lat_min={}, lon_max={}, lat_max={}",
                file.display(),
                bounds[0],
                bounds[1],
                bounds[2],
                bounds[3]
            );
            counts.rows_dropped_geometry += 1;
            continue;
        }

        let grid_id = record.get(grid_col).unwrap_or("").trim().to_string();
        footprints.push(TileFootprint { grid_id, bounds });
    }

    Ok((footprints, counts))
}

/// Find a column by checking multiple possible header names.
fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Result<usize> {
    for name in names {
        if let Some(idx) = headers.iter().position(|h| h.trim() == *name) {
            return Ok(idx);
        }
    }
    bail!("could not find column with any of these names: {:?}", names)
}

fn parse_bound(record: &csv::StringRecord, col: usize) -> Option<f64> {
    record.get(col)?.trim().parse::<f64>().ok()
}

/// Bounds must be finite and ordered to form a real rectangle.
fn valid_rectangle(bounds: &[f64; 4]) -> bool {
    bounds.iter().all(|v| v.is_finite()) && bounds[0] < bounds[2] && bounds[1] < bounds[3]
}

/// Outcome counts for the metadata-loading stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoadStats {
    /// Metadata files discovered by the glob.
    pub files_found: usize,

    /// Files parsed to the end.
    pub files_read: usize,

    /// Files skipped after a read/parse error.
    pub files_failed: usize,

    /// Data rows seen across all readable files.
    pub rows_read: usize,

    /// Rows dropped because a bound failed numeric coercion.
    pub rows_dropped_numeric: usize,

    /// Rows dropped because the bounds do not form a finite rectangle.
    pub rows_dropped_geometry: usize,

    /// Footprints that survived cleaning.
    pub footprints: usize,
}

impl std::fmt::Display for LoadStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Footprints: {} (files {}/{} read, {} rows, {} dropped non-numeric, {} dropped degenerate)",
            self.footprints,
            self.files_read,
            self.files_found,
            self.rows_read,
            self.rows_dropped_numeric,
            self.rows_dropped_geometry
        )
    }
}
