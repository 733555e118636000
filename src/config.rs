//! Configuration for the tile distribution pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the persisted coverage snapshot.
pub const SNAPSHOT_FILE: &str = "all_grid_cells_5x5_merged.geojson";

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory layout
    pub paths: PathsConfig,

    /// Processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
}

/// Directory layout rooted at the data share.
///
/// Every directory except `base` has a conventional default under it and can
/// be overridden individually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root directory of the embedding data share
    pub base: PathBuf,

    /// Extracted archives (default: `<base>/GEE_extracted`)
    #[serde(default)]
    pub extracted: Option<PathBuf>,

    /// Tile staging and destination tree (default: `<base>/AEF_tiles`)
    #[serde(default)]
    pub tiles: Option<PathBuf>,

    /// Persisted metadata artifacts (default: `<base>/metadata`)
    #[serde(default)]
    pub metadata: Option<PathBuf>,

    /// Downloaded archives awaiting extraction (default: `<base>/zips`)
    #[serde(default)]
    pub zips: Option<PathBuf>,

    /// Coverage visualizations (default: `<base>/merged_files_vis`)
    #[serde(default)]
    pub vis: Option<PathBuf>,
}

impl PathsConfig {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            extracted: None,
            tiles: None,
            metadata: None,
            zips: None,
            vis: None,
        }
    }

    pub fn extracted(&self) -> PathBuf {
        self.resolve(&self.extracted, "GEE_extracted")
    }

    pub fn tiles(&self) -> PathBuf {
        self.resolve(&self.tiles, "AEF_tiles")
    }

    pub fn metadata(&self) -> PathBuf {
        self.resolve(&self.metadata, "metadata")
    }

    pub fn zips(&self) -> PathBuf {
        self.resolve(&self.zips, "zips")
    }

    pub fn vis(&self) -> PathBuf {
        self.resolve(&self.vis, "merged_files_vis")
    }

    /// Path of the coverage snapshot, overwritten on every run.
    pub fn snapshot(&self) -> PathBuf {
        self.metadata().join(SNAPSHOT_FILE)
    }

    fn resolve(&self, explicit: &Option<PathBuf>, default_name: &str) -> PathBuf {
        match explicit {
            Some(path) => path.clone(),
            None => self.base.join(default_name),
        }
    }
}

/// Processing configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Worker threads for the I/O pool (None = number of CPUs)
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Config {
    /// Load configuration from a YAML or JSON file.
    /// Format is auto-detected from file extension (.yaml, .yml, or .json).
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Config = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&contents)?,
            "json" => serde_json::from_str(&contents)?,
            _ => {
                // YAML is a superset of JSON
                serde_yaml::from_str(&contents)?
            }
        };
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.paths.base.as_os_str().is_empty() {
            anyhow::bail!("paths.base must not be empty");
        }
        if let Some(workers) = self.processing.workers {
            if workers == 0 {
                anyhow::bail!("processing.workers must be > 0");
            }
        }
        Ok(())
    }
}
