pub mod config;
pub mod core;
pub mod definitions;
pub mod render;
pub mod scan;

pub use config::{
    ConfigError, DagConfig, DagConfigBuilder, ScanConfig, TaskConfig, YamlLoader,
    load_dag_file, load_dags_from_directory,
};
pub use core::dag::{Dag, DagBuilder, DagError, Edge};
pub use core::schedule::{Schedule, ScheduleError};
pub use core::task::{Task, TaskHandle};
pub use core::types::{DagId, TaskId};
pub use definitions::example_dag;
pub use render::{dag_mermaid, mermaid};
pub use scan::{PipelineGraph, ScanError, SourceLocation, scan_workspace};
