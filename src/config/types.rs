//! Configuration type definitions.
//!
//! This module contains the type definitions for YAML DAG definitions and for
//! the scanner settings file.

use serde::{Deserialize, Serialize};

/// Files above this size are skipped by the scanner unless configured.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Scanner settings (dagscout.yaml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory names pruned from the walk, matched anywhere in the tree.
    pub ignore_dirs: Vec<String>,
    /// Which extractors run.
    pub sources: SourceToggles,
    /// Files larger than this are skipped.
    pub max_file_bytes: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ignore_dirs: [
                ".git",
                "node_modules",
                "target",
                ".venv",
                "venv",
                "__pycache__",
                "dist",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            sources: SourceToggles::default(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

/// Per-ecosystem extractor switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceToggles {
    pub airflow: bool,
    pub prefect: bool,
    pub dbt: bool,
    pub github_actions: bool,
    /// YAML DAG definitions in this crate's own format.
    pub dagscout: bool,
}

impl Default for SourceToggles {
    fn default() -> Self {
        Self {
            airflow: true,
            prefect: true,
            dbt: true,
            github_actions: true,
            dagscout: true,
        }
    }
}

/// DAG definition from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DagConfig {
    /// DAG identifier.
    pub id: String,
    /// Optional description.
    pub description: Option<String>,
    /// `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS` (UTC) or RFC 3339.
    pub start_date: String,
    /// Schedule expression; `null` means manual only.
    #[serde(default = "default_schedule")]
    pub schedule: Option<String>,
    /// Backfill missed intervals.
    #[serde(default)]
    pub catchup: bool,
    /// Task definitions.
    pub tasks: Vec<TaskConfig>,
}

fn default_schedule() -> Option<String> {
    Some("@daily".to_string())
}

/// Task configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Task identifier (unique within the DAG).
    pub id: String,
    /// Shell command.
    pub command: String,
    /// Tasks that must complete first.
    #[serde(default)]
    pub depends_on: Vec<String>,
}
