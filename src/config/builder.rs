//! DAG builder from YAML configuration.
//!
//! This module converts DagConfig into validated Dag instances.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::dag::{Dag, DagBuilder};
use crate::core::schedule::Schedule;

use super::error::ConfigError;
use super::types::DagConfig;
use super::yaml::YamlLoader;

/// Builder for creating DAGs from YAML configuration.
pub struct DagConfigBuilder;

impl DagConfigBuilder {
    /// Build a Dag from a DagConfig.
    pub fn build(config: DagConfig) -> Result<Dag, ConfigError> {
        let start_date = YamlLoader::parse_start_date(&config.start_date)?;
        let schedule = match &config.schedule {
            Some(expr) => Schedule::new(expr.as_str()).map_err(|e| {
                ConfigError::InvalidConfig(format!("invalid schedule '{}': {}", expr, e))
            })?,
            None => Schedule::manual(),
        };

        let mut builder = DagBuilder::new(&config.id)
            .start_date(start_date)
            .with_schedule(schedule)
            .catchup(config.catchup);

        if let Some(description) = &config.description {
            builder = builder.description(description);
        }

        for task in &config.tasks {
            let deps: Vec<&str> = task.depends_on.iter().map(|s| s.as_str()).collect();
            builder = builder.bash_task_with_deps(&task.id, &task.command, &deps);
        }

        let dag = builder.build()?;
        debug!(dag = %dag.id(), tasks = dag.len(), "built DAG from config");
        Ok(dag)
    }
}

/// Load and build a single DAG definition file.
pub fn load_dag_file(path: impl AsRef<Path>) -> Result<Dag, ConfigError> {
    let config = YamlLoader::load_dag_config(path)?;
    DagConfigBuilder::build(config)
}

/// Load all DAG definitions from a directory, in file name order.
pub fn load_dags_from_directory(dir: impl AsRef<Path>) -> Result<Vec<Dag>, ConfigError> {
    let dir = dir.as_ref();

    if !dir.is_dir() {
        return Err(ConfigError::InvalidConfig(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }

    let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::DirReadError {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ConfigError::DirReadError {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();

        // Only process .yaml and .yml files
        if let Some(ext) = path.extension()
            && (ext == "yaml" || ext == "yml")
        {
            paths.push(path);
        }
    }
    paths.sort();

    let mut dags = Vec::with_capacity(paths.len());
    for path in paths {
        dags.push(load_dag_file(&path)?);
    }

    info!(count = dags.len(), dir = %dir.display(), "loaded DAG definitions");
    Ok(dags)
}
