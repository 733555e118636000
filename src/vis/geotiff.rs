//! Read georeferenced bounds from GeoTIFF tags.
//!
//! Only the georeferencing is decoded: the `ModelPixelScale` (33550) and
//! `ModelTiepoint` (33922) tags plus the image dimensions. Pixel data is
//! never read.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::Decoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;

/// Georeferenced extent of a raster, in its native CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterBounds {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl RasterBounds {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    /// Smallest bounds covering both extents.
    pub fn union(&self, other: &RasterBounds) -> RasterBounds {
        RasterBounds {
            left: self.left.min(other.left),
            bottom: self.bottom.min(other.bottom),
            right: self.right.max(other.right),
            top: self.top.max(other.top),
        }
    }
}

/// Read the georeferenced bounds of a GeoTIFF.
///
/// Assumes a north-up raster (no rotation), which is what GEE exports. Fails
/// on rasters without the two georeferencing tags.
pub fn read_bounds(path: &Path) -> Result<RasterBounds> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut decoder =
        Decoder::new(BufReader::new(file)).with_context(|| format!("decode {}", path.display()))?;

    let (width, height) = decoder
        .dimensions()
        .with_context(|| format!("dimensions of {}", path.display()))?;

    let scale = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE))
        .with_context(|| format!("ModelPixelScale tag of {}", path.display()))?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT))
        .with_context(|| format!("ModelTiepoint tag of {}", path.display()))?;

    if scale.len() < 2 {
        bail!("short ModelPixelScale tag in {}", path.display());
    }
    if tiepoint.len() < 6 {
        bail!("short ModelTiepoint tag in {}", path.display());
    }

    // Tiepoint maps raster (i, j) onto model (x, y); scale is per-pixel size.
    let (sx, sy) = (scale[0], scale[1]);
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);

    let left = x - i * sx;
    let top = y + j * sy;
    let right = left + width as f64 * sx;
    let bottom = top - height as f64 * sy;

    if ![left, bottom, right, top].iter().all(|v| v.is_finite()) {
        bail!("non-finite bounds in {}", path.display());
    }

    Ok(RasterBounds {
        left,
        bottom,
        right,
        top,
    })
}
