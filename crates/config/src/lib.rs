// Configuration loading

pub mod settings;

pub use settings::{BatchConfig, ColumnSettings, ConfigError, FolderIds, InputSettings, OutputSettings};
