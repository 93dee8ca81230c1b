pub mod config;
pub mod context;
pub mod entry_paths;
pub mod logging;
