// File I/O: input tables, folder discovery and per-folder outputs

pub mod bulk;
pub mod discover;
pub mod error;
pub mod loader;
pub mod plot;
pub mod table;

pub use bulk::{bulk_headers, write_bulk, BulkSummary};
pub use discover::{bulk_path, find_inputs, folder_name, list_folders, FolderInputs};
pub use error::IoError;
pub use loader::{load_catalog, load_outlet};
pub use plot::{plot_path, render_plot, write_plot};
pub use table::{read_table, RawTable};
