// Folder discovery: which sub-folders to process and which files in each
// folder are the catalog and outlet tables.

use std::path::{Path, PathBuf};

use repricer_config::BatchConfig;
use tracing::{debug, warn};

use crate::error::IoError;
use crate::table::is_supported;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderInputs {
    pub catalog: Option<PathBuf>,
    pub outlet: Option<PathBuf>,
}

impl FolderInputs {
    /// Both tables, if present.
    pub fn pair(&self) -> Option<(&Path, &Path)> {
        match (&self.catalog, &self.outlet) {
            (Some(c), Some(o)) => Some((c.as_path(), o.as_path())),
            _ => None,
        }
    }
}

/// Immediate sub-directories of `root`, sorted by name.
pub fn list_folders(root: &Path) -> Result<Vec<PathBuf>, IoError> {
    let entries = std::fs::read_dir(root).map_err(|e| IoError::read(root, e))?;
    let mut folders = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| IoError::read(root, e))?;
        if entry.file_type().map_err(|e| IoError::read(&entry.path(), e))?.is_dir() {
            folders.push(entry.path());
        }
    }
    folders.sort();
    Ok(folders)
}

/// Locate the catalog and outlet tables by file-name marker.
///
/// Spreadsheet lock files (`~$…`) and this tool's own bulk output are ignored.
/// When several files carry the same marker the first by name wins.
pub fn find_inputs(folder: &Path, config: &BatchConfig) -> Result<FolderInputs, IoError> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(folder).map_err(|e| IoError::read(folder, e))? {
        let entry = entry.map_err(|e| IoError::read(folder, e))?;
        let path = entry.path();
        if path.is_file() && is_supported(&path) {
            names.push(path);
        }
    }
    names.sort();

    let mut inputs = FolderInputs::default();
    for path in names {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with("~$") || is_bulk_output(&path, config) {
            continue;
        }
        let slot = if name.contains(&config.input.catalog_marker) {
            &mut inputs.catalog
        } else if name.contains(&config.input.outlet_marker) {
            &mut inputs.outlet
        } else {
            continue;
        };
        if let Some(existing) = slot.as_ref() {
            warn!(
                folder = %folder.display(),
                using = %existing.display(),
                ignored = %path.display(),
                "duplicate input table"
            );
        } else {
            debug!(file = %path.display(), "found input table");
            *slot = Some(path);
        }
    }
    Ok(inputs)
}

fn is_bulk_output(path: &Path, config: &BatchConfig) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| stem.ends_with(&config.output.bulk_suffix))
}

/// `<folder>/<folder_name><suffix>.xlsx`
pub fn bulk_path(folder: &Path, config: &BatchConfig) -> PathBuf {
    let name = folder_name(folder);
    folder.join(format!("{name}{}.xlsx", config.output.bulk_suffix))
}

pub fn folder_name(folder: &Path) -> String {
    folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| folder.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn finds_both_tables() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "TV_all_item.xlsx");
        touch(dir.path(), "TV_outlet_item.csv");
        touch(dir.path(), "notes.txt");
        let inputs = find_inputs(dir.path(), &BatchConfig::default()).unwrap();
        assert_eq!(inputs.catalog, Some(dir.path().join("TV_all_item.xlsx")));
        assert_eq!(inputs.outlet, Some(dir.path().join("TV_outlet_item.csv")));
        assert!(inputs.pair().is_some());
    }

    #[test]
    fn ignores_lock_files_and_bulk_output() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "~$all_item.xlsx");
        touch(dir.path(), "outlet_item_bulk.xlsx");
        let inputs = find_inputs(dir.path(), &BatchConfig::default()).unwrap();
        assert_eq!(inputs, FolderInputs::default());
        assert!(inputs.pair().is_none());
    }

    #[test]
    fn first_duplicate_by_name_wins() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b_all_item.xlsx");
        touch(dir.path(), "a_all_item.xlsx");
        let inputs = find_inputs(dir.path(), &BatchConfig::default()).unwrap();
        assert_eq!(inputs.catalog, Some(dir.path().join("a_all_item.xlsx")));
        assert!(inputs.outlet.is_none());
    }

    #[test]
    fn lists_sorted_sub_folders_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("zeta")).unwrap();
        std::fs::create_dir(dir.path().join("alpha")).unwrap();
        touch(dir.path(), "file.xlsx");
        let folders = list_folders(dir.path()).unwrap();
        assert_eq!(folders, vec![dir.path().join("alpha"), dir.path().join("zeta")]);
    }

    #[test]
    fn bulk_path_uses_folder_name() {
        let path = bulk_path(Path::new("/data/MSP_offline"), &BatchConfig::default());
        assert_eq!(path, Path::new("/data/MSP_offline/MSP_offline_bulk.xlsx"));
    }
}
