//! Configuration loading and parsing.
//!
//! This module provides YAML-based DAG definitions and the scanner's settings
//! file.

mod builder;
mod error;
mod types;
mod yaml;

pub use builder::{DagConfigBuilder, load_dag_file, load_dags_from_directory};
pub use error::ConfigError;
pub use types::{DagConfig, ScanConfig, SourceToggles, TaskConfig};
pub use yaml::{SCAN_CONFIG_FILE, YamlLoader};
