//! Concrete adapter implementations for ports.

pub mod confirmation;
pub mod csv_adapter;
pub mod csv_outcome_archive;
pub mod file_config_adapter;
pub mod ini_weight_file;
pub mod memory;
pub mod paper_execution;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod state_file;
