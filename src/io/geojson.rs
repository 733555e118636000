//! Minimal GeoJSON FeatureCollection types and snapshot writer.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,

    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,

    pub geometry: Geometry,

    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry, properties: Map<String, Value>) -> Self {
        Self {
            kind: "Feature".to_string(),
            geometry,
            properties,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,

    /// One exterior ring; no holes are ever produced here.
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

impl Geometry {
    /// Polygon geometry from a closed exterior ring.
    pub fn polygon(ring: &[[f64; 2]]) -> Self {
        Self {
            kind: "Polygon".to_string(),
            coordinates: vec![ring.to_vec()],
        }
    }
}

/// Write a collection to disk, overwriting any prior snapshot.
pub fn write(path: &Path, collection: &FeatureCollection) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), collection)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Read a collection back (used by downstream tooling and tests).
pub fn read(path: &Path) -> Result<FeatureCollection> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let collection = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parse {}", path.display()))?;
    Ok(collection)
}
