// Batch settings
// Loaded from <root>/repricer.toml, then ~/.config/repricer/repricer.toml

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "repricer.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("config validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Where the input tables live and where their data starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputSettings {
    /// Zero-based row holding the column headers; rows above it are preamble.
    pub header_row: usize,
    /// File-name substring identifying the catalog table.
    pub catalog_marker: String,
    /// File-name substring identifying the outlet table.
    pub outlet_marker: String,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            header_row: 18,
            catalog_marker: "all_item".to_string(),
            outlet_marker: "outlet_item".to_string(),
        }
    }
}

/// Column names in the input tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnSettings {
    /// Item id column in the catalog; outlet ids are renamed to this.
    pub item_id: String,
    /// Item id column in the outlet table.
    pub outlet_item_id: String,
    /// Catalog reference price.
    pub reference_price: String,
    /// Catalog price used when the reference price is zero.
    pub fallback_price: String,
    /// Outlet current price.
    pub current_price: String,
    /// Outlet columns left out of the bulk export.
    pub drop: Vec<String>,
}

impl Default for ColumnSettings {
    fn default() -> Self {
        Self {
            item_id: "ItemID".to_string(),
            outlet_item_id: "id".to_string(),
            reference_price: "Price R1 (E,C)".to_string(),
            fallback_price: "Price CP (E,C)".to_string(),
            current_price: "Price CP (E,C)".to_string(),
            drop: vec!["Productgroup".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    /// Write the before/after diagnostic plots.
    pub plots: bool,
    /// Appended to the folder name for the bulk file (`<folder><suffix>.xlsx`).
    pub bulk_suffix: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            plots: true,
            bulk_suffix: "_bulk".to_string(),
        }
    }
}

/// Operator identifiers stamped on a folder's bulk rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FolderIds {
    pub qc_id: String,
    pub pg_id: String,
}

impl FolderIds {
    pub fn is_empty(&self) -> bool {
        self.qc_id.is_empty() && self.pg_id.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Fixed jitter seed; omitted means fresh entropy per run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub input: InputSettings,
    pub columns: ColumnSettings,
    pub output: OutputSettings,
    /// Identifiers for folders without their own entry.
    pub defaults: FolderIds,
    /// Per-folder identifiers keyed by folder name.
    pub folders: BTreeMap<String, FolderIds>,
}

impl BatchConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: BatchConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Config for a batch root: an explicit path if given, else
    /// `<root>/repricer.toml`, else the user config file, else defaults.
    /// Returns the file actually used, if any.
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::from_path(path)?, Some(path.to_path_buf())));
        }
        let candidates = [Some(root.join(CONFIG_FILE_NAME)), Self::user_config_path()];
        for path in candidates.into_iter().flatten() {
            if path.is_file() {
                return Ok((Self::from_path(&path)?, Some(path)));
            }
        }
        Ok((Self::default(), None))
    }

    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("repricer").join(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let input = &self.input;
        if input.catalog_marker.is_empty() || input.outlet_marker.is_empty() {
            return Err(ConfigError::Validation(
                "input.catalog_marker and input.outlet_marker must be non-empty".into(),
            ));
        }
        if input.catalog_marker == input.outlet_marker {
            return Err(ConfigError::Validation(format!(
                "input.catalog_marker and input.outlet_marker are both '{}'",
                input.catalog_marker
            )));
        }

        let cols = &self.columns;
        let required = [
            ("item_id", &cols.item_id),
            ("outlet_item_id", &cols.outlet_item_id),
            ("reference_price", &cols.reference_price),
            ("fallback_price", &cols.fallback_price),
            ("current_price", &cols.current_price),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("columns.{key} must be non-empty")));
            }
        }
        for dropped in &cols.drop {
            if dropped == &cols.outlet_item_id || dropped == &cols.current_price {
                return Err(ConfigError::Validation(format!(
                    "columns.drop cannot remove required column '{dropped}'"
                )));
            }
        }

        if self.output.bulk_suffix.is_empty() {
            return Err(ConfigError::Validation("output.bulk_suffix must be non-empty".into()));
        }
        Ok(())
    }

    /// Identifiers for a folder, falling back to `[defaults]`.
    /// The flag is false when the folder had no entry of its own.
    pub fn folder_ids(&self, folder_name: &str) -> (FolderIds, bool) {
        match self.folders.get(folder_name) {
            Some(ids) => (ids.clone(), true),
            None => (self.defaults.clone(), false),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
