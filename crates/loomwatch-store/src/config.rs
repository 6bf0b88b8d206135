//! Service configuration.

use std::path::{Path, PathBuf};

use loomwatch_engine::ResizeFilter;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Where the tracker keeps its data and how it resamples images.
///
/// Unknown fields are rejected and missing fields take their defaults, so
/// a partial JSON file such as `{"data_dir": "/srv/loomwatch"}` is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    /// Root directory for stored images and the record file.
    pub data_dir: PathBuf,

    /// Filter used to normalize comparison images to an order's standard
    /// dimensions.
    pub resize_filter: ResizeFilter,
}

impl TrackerConfig {
    /// Default data directory, relative to the working directory.
    pub const DEFAULT_DATA_DIR: &str = "loomwatch-data";

    /// Name of the record file inside [`data_dir`](Self::data_dir).
    pub const RECORDS_FILE: &str = "records.json";

    /// Parse a config from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Json`] for malformed JSON or unknown fields.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Path of the record file.
    #[must_use]
    pub fn records_path(&self) -> PathBuf {
        self.data_dir.join(Self::RECORDS_FILE)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(Self::DEFAULT_DATA_DIR),
            resize_filter: ResizeFilter::default(),
        }
    }
}
