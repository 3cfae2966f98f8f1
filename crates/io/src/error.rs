use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("cannot read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("cannot write {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },

    #[error("{}: no header row at row {row} (table has {rows} rows)", .path.display())]
    HeaderRowMissing { path: PathBuf, row: usize, rows: usize },

    #[error("{table} table {}: missing column '{column}'", .path.display())]
    MissingColumn {
        table: &'static str,
        path: PathBuf,
        column: String,
    },

    #[error("unsupported table format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("plot rendering failed: {0}")]
    Render(String),
}

impl IoError {
    pub(crate) fn read(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub(crate) fn write(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}
