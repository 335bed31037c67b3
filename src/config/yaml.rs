//! YAML configuration parsing.
//!
//! Parses DAG definitions and scanner settings from YAML files.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use super::error::ConfigError;
use super::types::{DagConfig, ScanConfig};

/// Conventional name of the scanner settings file at a workspace root.
pub const SCAN_CONFIG_FILE: &str = "dagscout.yaml";

/// YAML configuration loader.
pub struct YamlLoader;

impl YamlLoader {
    /// Load scanner settings from a file.
    pub fn load_scan_config(path: impl AsRef<Path>) -> Result<ScanConfig, ConfigError> {
        let path = path.as_ref();
        let content = read(path)?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlFileError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse scanner settings from a YAML string.
    pub fn parse_scan_config(yaml: &str) -> Result<ScanConfig, ConfigError> {
        let config: ScanConfig = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load a DAG definition from a file.
    pub fn load_dag_config(path: impl AsRef<Path>) -> Result<DagConfig, ConfigError> {
        let path = path.as_ref();
        let content = read(path)?;
        let config: DagConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlFileError {
                path: path.to_path_buf(),
                source,
            })?;
        Self::validate_dag_config(&config)?;
        Ok(config)
    }

    /// Parse a DAG definition from a YAML string.
    pub fn parse_dag_config(yaml: &str) -> Result<DagConfig, ConfigError> {
        let config: DagConfig = serde_yaml::from_str(yaml)?;
        Self::validate_dag_config(&config)?;
        Ok(config)
    }

    /// Validate a DAG definition.
    fn validate_dag_config(config: &DagConfig) -> Result<(), ConfigError> {
        if config.id.is_empty() {
            return Err(ConfigError::MissingField("id".into()));
        }

        if config.start_date.trim().is_empty() {
            return Err(ConfigError::MissingField("start_date".into()));
        }
        Self::parse_start_date(&config.start_date)?;

        if config.tasks.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "DAG must have at least one task".into(),
            ));
        }

        // Check for duplicate task IDs
        let mut task_ids: HashSet<&str> = HashSet::new();
        for task in &config.tasks {
            if !task_ids.insert(&task.id) {
                return Err(ConfigError::InvalidConfig(format!(
                    "duplicate task id: {}",
                    task.id
                )));
            }
        }

        // Dependencies must name other, existing tasks, each at most once
        for task in &config.tasks {
            let mut seen_deps = HashSet::new();
            for dep in &task.depends_on {
                if dep == &task.id {
                    return Err(ConfigError::InvalidConfig(format!(
                        "task '{}' cannot depend on itself",
                        task.id
                    )));
                }
                if !task_ids.contains(dep.as_str()) {
                    return Err(ConfigError::InvalidConfig(format!(
                        "task '{}' depends on unknown task '{}'",
                        task.id, dep
                    )));
                }
                if !seen_deps.insert(dep) {
                    return Err(ConfigError::InvalidConfig(format!(
                        "task '{}' has duplicate dependency '{}'",
                        task.id, dep
                    )));
                }
            }
        }

        Self::validate_no_cycles(config)?;

        Ok(())
    }

    /// Validate that there are no cycles in the task dependency graph.
    fn validate_no_cycles(config: &DagConfig) -> Result<(), ConfigError> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut reverse_deps: HashMap<&str, Vec<&str>> = HashMap::new();

        for task in &config.tasks {
            in_degree.insert(&task.id, task.depends_on.len());
            reverse_deps.insert(&task.id, Vec::new());
        }

        for task in &config.tasks {
            for dep in &task.depends_on {
                reverse_deps.entry(dep.as_str()).or_default().push(&task.id);
            }
        }

        // Kahn's algorithm: start with nodes that have no dependencies
        let mut queue: VecDeque<&str> = config
            .tasks
            .iter()
            .map(|t| t.id.as_str())
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();

        let mut visited_count = 0;

        while let Some(id) = queue.pop_front() {
            visited_count += 1;

            if let Some(downstream) = reverse_deps.get(id) {
                for next in downstream {
                    if let Some(degree) = in_degree.get_mut(next) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(next);
                        }
                    }
                }
            }
        }

        if visited_count != config.tasks.len() {
            let cycle_tasks: Vec<&str> = config
                .tasks
                .iter()
                .map(|t| t.id.as_str())
                .filter(|id| in_degree.get(id).is_some_and(|d| *d > 0))
                .collect();

            return Err(ConfigError::InvalidConfig(format!(
                "dependency cycle detected involving tasks: {}",
                cycle_tasks.join(", ")
            )));
        }

        Ok(())
    }

    /// Parse a start date: a plain date (midnight UTC), a naive timestamp
    /// (UTC), or an RFC 3339 timestamp.
    pub fn parse_start_date(value: &str) -> Result<DateTime<Utc>, ConfigError> {
        let value = value.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Ok(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
            return Ok(naive.and_utc());
        }
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
            && let Some(naive) = date.and_hms_opt(0, 0, 0)
        {
            return Ok(naive.and_utc());
        }

        Err(ConfigError::InvalidConfig(format!(
            "invalid start_date '{}': expected YYYY-MM-DD or an RFC 3339 timestamp",
            value
        )))
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
        path: path.to_path_buf(),
        source,
    })
}
