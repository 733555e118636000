//! Tile filename parsing.
//!
//! Exported tiles follow the naming convention
//!
//! ```text
//! <product>_<grid-id>_<YYYYMMDD>_<YYYYMMDD>.tif
//! ```
//!
//! where `product` is a single underscore-free token, `grid-id` is one or more
//! tokens joined by underscores (the identifier itself may contain underscores,
//! e.g. `Africa_grid_-15_10_-10_15`), and the final two tokens are the
//! acquisition start/end dates. A filename that violates the convention is a
//! parse error, never a silently wrong substring.

use chrono::NaiveDate;
use std::fmt;
use std::path::Path;

/// Accepted raster extensions, matched case-insensitively.
const TIF_EXTENSIONS: &[&str] = &["tif", "tiff"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// Not a `.tif`/`.tiff` file, or the path has no usable file name.
    NotATile(String),
    /// Fewer underscore-delimited tokens than the convention requires.
    TooFewSegments(String),
    /// One of the two trailing date tokens is not a valid `YYYYMMDD` date.
    BadDate(String, String),
    /// Nothing remains for the grid identifier once product and dates are removed.
    EmptyGridId(String),
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameError::NotATile(name) => write!(f, "not a tile file: {}", name),
            NameError::TooFewSegments(name) => {
                write!(f, "file name has too few '_' segments: {}", name)
            }
            NameError::BadDate(name, tok) => {
                write!(f, "invalid YYYYMMDD date '{}' in file name: {}", tok, name)
            }
            NameError::EmptyGridId(name) => {
                write!(f, "file name carries no grid identifier: {}", name)
            }
        }
    }
}

impl std::error::Error for NameError {}

/// The acquisition time range embedded at the end of a tile file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeRange {
    /// Parse the trailing `_<YYYYMMDD>_<YYYYMMDD>.tif` suffix of a path.
    ///
    /// This is the minimal parse the mover needs: destination years come from
    /// the start date alone, so a file whose grid identifier is unusable can
    /// still be relocated.
    pub fn parse(path: &Path) -> Result<Self, NameError> {
        let stem = tile_stem(path)?;
        let tokens: Vec<&str> = stem.split('_').collect();
        if tokens.len() < 3 {
            return Err(NameError::TooFewSegments(stem.to_string()));
        }

        let start = parse_date(stem, tokens[tokens.len() - 2])?;
        let end = parse_date(stem, tokens[tokens.len() - 1])?;
        Ok(TimeRange { start, end })
    }

    /// Calendar year of the acquisition start, used as the destination folder.
    pub fn year(&self) -> i32 {
        use chrono::Datelike;
        self.start.year()
    }
}

/// A fully parsed tile file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileName {
    /// Leading product token (e.g. `AEF`).
    pub product: String,

    /// Grid identifier correlating the file with its metadata row.
    pub grid_id: String,

    /// Acquisition time range.
    pub range: TimeRange,
}

impl TileName {
    /// Parse a full tile file name into product, grid identifier, and dates.
    pub fn parse(path: &Path) -> Result<Self, NameError> {
        let stem = tile_stem(path)?;
        let tokens: Vec<&str> = stem.split('_').collect();
        // product + at least one grid token + two dates
        if tokens.len() < 4 {
            return Err(NameError::TooFewSegments(stem.to_string()));
        }

        let range = TimeRange::parse(path)?;

        let grid_tokens = &tokens[1..tokens.len() - 2];
        if grid_tokens.iter().all(|t| t.is_empty()) {
            return Err(NameError::EmptyGridId(stem.to_string()));
        }

        Ok(TileName {
            product: tokens[0].to_string(),
            grid_id: grid_tokens.join("_"),
            range,
        })
    }
}

/// Group key for GEE export shards (`<export-name>-<shard>[-<shard>].tif`).
///
/// Shard suffixes are separated from the export name by the first `-`; a stem
/// with no `-` is its own group.
pub fn export_group(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let name = stem.split('-').next().unwrap_or(stem);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Check the extension and return the file stem.
fn tile_stem(path: &Path) -> Result<&str, NameError> {
    let display = || path.display().to_string();

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| NameError::NotATile(display()))?;
    if !TIF_EXTENSIONS.iter().any(|t| ext.eq_ignore_ascii_case(t)) {
        return Err(NameError::NotATile(display()));
    }

    path.file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| NameError::NotATile(display()))
}

fn parse_date(stem: &str, token: &str) -> Result<NaiveDate, NameError> {
    if token.len() != 8 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NameError::BadDate(stem.to_string(), token.to_string()));
    }
    NaiveDate::parse_from_str(token, "%Y%m%d")
        .map_err(|_| NameError::BadDate(stem.to_string(), token.to_string()))
}
