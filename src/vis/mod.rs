//! Render per-export coverage images for extracted tile directories.
//!
//! Tiles belonging to one GEE export (shards named
//! `<export-name>-<shard>[-<shard>].tif`) are grouped, their georeferenced
//! extents unioned, and one PNG per export is written showing every shard
//! footprint inside the union extent. An export whose PNG already exists is
//! skipped, so re-runs only render what is missing.

mod geotiff;

pub use geotiff::{read_bounds, RasterBounds};

use crate::tilename;
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Output image edge length in pixels.
const CANVAS_SIZE: u32 = 1024;

/// Fraction of the union extent added as margin on each side.
const PADDING: f64 = 0.03;

/// Fill opacity for shard footprints.
const FILL_ALPHA: f64 = 0.3;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const UNION_COLOR: Rgb<u8> = Rgb([214, 39, 40]);
const SHARD_PALETTE: [Rgb<u8>; 6] = [
    Rgb([31, 119, 180]),
    Rgb([44, 160, 44]),
    Rgb([148, 103, 189]),
    Rgb([255, 127, 14]),
    Rgb([23, 190, 207]),
    Rgb([140, 86, 75]),
];

/// Render one coverage image per export group found in `tiles_dir`.
pub fn visualize_dir(tiles_dir: &Path, out_dir: &Path) -> Result<VisStats> {
    std::fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;

    let pattern = tiles_dir.join("*.tif");
    let pattern = pattern
        .to_str()
        .with_context(|| format!("non-UTF-8 path: {}", tiles_dir.display()))?;

    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for entry in glob::glob(pattern).with_context(|| format!("bad glob pattern: {}", pattern))? {
        let path = match entry {
            Ok(path) if path.is_file() => path,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!("Unreadable glob entry: {}", e);
                continue;
            }
        };
        if let Some(name) = tilename::export_group(&path) {
            groups.entry(name).or_default().push(path);
        }
    }

    let mut stats = VisStats {
        groups: groups.len(),
        ..VisStats::default()
    };

    for (name, members) in &groups {
        let output = out_dir.join(format!("{}.png", name));
        if output.exists() {
            stats.skipped_existing += 1;
            continue;
        }

        match render_group(name, members, &output) {
            Ok(true) => stats.rendered += 1,
            Ok(false) => {
                tracing::warn!("No bounds found for {}, skipping visualization", name);
                stats.skipped_empty += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to visualize {}: {:#}", name, e);
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}

/// Render one group. Returns `Ok(false)` when no member had readable bounds.
fn render_group(name: &str, members: &[PathBuf], output: &Path) -> Result<bool> {
    let mut bounds = Vec::with_capacity(members.len());
    for member in members {
        match read_bounds(member) {
            Ok(b) => bounds.push(b),
            Err(e) => tracing::warn!("Unreadable raster in group {}: {:#}", name, e),
        }
    }
    if bounds.is_empty() {
        return Ok(false);
    }

    let union = bounds
        .iter()
        .skip(1)
        .fold(bounds[0], |acc, b| acc.union(b));

    let mut canvas = GeoCanvas::new(&union);
    for (i, b) in bounds.iter().enumerate() {
        let color = SHARD_PALETTE[i % SHARD_PALETTE.len()];
        canvas.fill_rect(b, color, FILL_ALPHA);
        canvas.outline_rect(b, color, 1);
    }
    canvas.outline_rect(&union, UNION_COLOR, 2);

    canvas
        .image
        .save(output)
        .with_context(|| format!("save {}", output.display()))?;
    Ok(true)
}

/// A raster canvas with a geographic extent mapped onto it.
struct GeoCanvas {
    image: RgbImage,
    left: f64,
    bottom: f64,
    right: f64,
    top: f64,
}

impl GeoCanvas {
    fn new(extent: &RasterBounds) -> Self {
        // Degenerate extents still get a drawable window.
        let width = extent.width().max(f64::EPSILON);
        let height = extent.height().max(f64::EPSILON);
        let pad_x = width * PADDING;
        let pad_y = height * PADDING;

        Self {
            image: RgbImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, BACKGROUND),
            left: extent.left - pad_x,
            bottom: extent.bottom - pad_y,
            right: extent.right + pad_x,
            top: extent.top + pad_y,
        }
    }

    /// Geographic point to pixel, y axis flipped.
    fn to_px(&self, x: f64, y: f64) -> (i64, i64) {
        let max = (CANVAS_SIZE - 1) as f64;
        let col = (x - self.left) / (self.right - self.left) * max;
        let row = (self.top - y) / (self.top - self.bottom) * max;
        (col.round() as i64, row.round() as i64)
    }

    fn fill_rect(&mut self, bounds: &RasterBounds, color: Rgb<u8>, alpha: f64) {
        let (x0, y0) = self.to_px(bounds.left, bounds.top);
        let (x1, y1) = self.to_px(bounds.right, bounds.bottom);
        for y in y0.max(0)..=y1.min(CANVAS_SIZE as i64 - 1) {
            for x in x0.max(0)..=x1.min(CANVAS_SIZE as i64 - 1) {
                let px = self.image.get_pixel_mut(x as u32, y as u32);
                for c in 0..3 {
                    px.0[c] =
                        (px.0[c] as f64 * (1.0 - alpha) + color.0[c] as f64 * alpha).round() as u8;
                }
            }
        }
    }

    fn outline_rect(&mut self, bounds: &RasterBounds, color: Rgb<u8>, thickness: i64) {
        let (x0, y0) = self.to_px(bounds.left, bounds.top);
        let (x1, y1) = self.to_px(bounds.right, bounds.bottom);
        for t in 0..thickness {
            self.h_line(x0, x1, y0 + t, color);
            self.h_line(x0, x1, y1 - t, color);
            self.v_line(y0, y1, x0 + t, color);
            self.v_line(y0, y1, x1 - t, color);
        }
    }

    fn h_line(&mut self, x0: i64, x1: i64, y: i64, color: Rgb<u8>) {
        if y < 0 || y >= CANVAS_SIZE as i64 {
            return;
        }
        for x in x0.max(0)..=x1.min(CANVAS_SIZE as i64 - 1) {
            self.image.put_pixel(x as u32, y as u32, color);
        }
    }

    fn v_line(&mut self, y0: i64, y1: i64, x: i64, color: Rgb<u8>) {
        if x < 0 || x >= CANVAS_SIZE as i64 {
            return;
        }
        for y in y0.max(0)..=y1.min(CANVAS_SIZE as i64 - 1) {
            self.image.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Outcome counts for a visualization run.
#[derive(Debug, Default, Clone, Copy)]
pub struct VisStats {
    /// Export groups discovered.
    pub groups: usize,

    /// Images rendered this run.
    pub rendered: usize,

    /// Groups whose image already existed.
    pub skipped_existing: usize,

    /// Groups with no readable georeferencing.
    pub skipped_empty: usize,

    /// Groups that failed to render.
    pub failed: usize,
}

impl std::fmt::Display for VisStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Rendered: {}, Existing: {}, Empty: {}, Failed: {}, Groups: {}",
            self.rendered, self.skipped_existing, self.skipped_empty, self.failed, self.groups
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vis::geotiff::tests::write_geotiff;

    #[test]
    fn test_renders_one_image_per_group() {
        let tmp = tempfile::tempdir().unwrap();
        let tiles = tmp.path().join("extracted");
        let out = tmp.path().join("vis");
        std::fs::create_dir_all(&tiles).unwrap();

        write_geotiff(
            &tiles.join("Africa_grid_2_4_16_14-0000000000-0000000000.tif"),
            8,
            8,
            (2.0, 14.0),
            0.5,
        );
        write_geotiff(
            &tiles.join("Africa_grid_2_4_16_14-0000000000-0000000008.tif"),
            8,
            8,
            (6.0, 14.0),
            0.5,
        );
        write_geotiff(
            &tiles.join("Other_export-0000000000-0000000000.tif"),
            4,
            4,
            (0.0, 0.0),
            1.0,
        );

        let stats = visualize_dir(&tiles, &out).unwrap();
        assert_eq!(stats.groups, 2);
        assert_eq!(stats.rendered, 2);
        assert!(out.join("Africa_grid_2_4_16_14.png").is_file());
        assert!(out.join("Other_export.png").is_file());
    }

    #[test]
    fn test_existing_output_short_circuits() {
        let tmp = tempfile::tempdir().unwrap();
        let tiles = tmp.path().join("extracted");
        let out = tmp.path().join("vis");
        std::fs::create_dir_all(&tiles).unwrap();

        write_geotiff(&tiles.join("export-0000000000.tif"), 4, 4, (0.0, 4.0), 1.0);

        let first = visualize_dir(&tiles, &out).unwrap();
        assert_eq!(first.rendered, 1);

        let second = visualize_dir(&tiles, &out).unwrap();
        assert_eq!(second.rendered, 0);
        assert_eq!(second.skipped_existing, 1);
    }

    #[test]
    fn test_group_without_georeferencing_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let tiles = tmp.path().join("extracted");
        let out = tmp.path().join("vis");
        std::fs::create_dir_all(&tiles).unwrap();
        // Plain bytes: not a decodable raster at all.
        std::fs::write(tiles.join("broken-0000000000.tif"), b"junk").unwrap();

        let stats = visualize_dir(&tiles, &out).unwrap();
        assert_eq!(stats.groups, 1);
        assert_eq!(stats.skipped_empty, 1);
        assert_eq!(stats.rendered, 0);
    }

    #[test]
    fn test_canvas_maps_corners() {
        let extent = RasterBounds {
            left: 0.0,
            bottom: 0.0,
            right: 10.0,
            top: 10.0,
        };
        let canvas = GeoCanvas::new(&extent);

        // Top-left of the padded extent is pixel (0, 0).
        let (x, y) = canvas.to_px(canvas.left, canvas.top);
        assert_eq!((x, y), (0, 0));
        let (x, y) = canvas.to_px(canvas.right, canvas.bottom);
        assert_eq!((x, y), (CANVAS_SIZE as i64 - 1, CANVAS_SIZE as i64 - 1));
    }
}
