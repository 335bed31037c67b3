//! Workspace scanning for pipeline definitions.
//!
//! Walks a directory tree, hands each candidate file to the extractor for its
//! ecosystem (Airflow, Prefect, dbt, GitHub Actions, dagscout YAML) and merges
//! what they find into a single [`PipelineGraph`] of nodes, edges and source
//! locations.

pub mod airflow;
mod dbt;
mod github;
mod native;
mod prefect;
mod python;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::core::dag::DagError;
use crate::core::schedule::ScheduleError;

/// Errors that can occur while scanning or reading pipeline sources.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The scan root is missing or not a directory.
    #[error("'{0}' is not a directory")]
    NotADirectory(PathBuf),

    /// A source file could not be read.
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file has no `DAG(...)` call.
    #[error("no DAG(...) declaration found")]
    NoDagDeclaration,

    /// A required argument is absent from a call.
    #[error("{call}(...) at line {line} is missing '{name}'")]
    MissingArgument {
        call: String,
        name: String,
        line: usize,
    },

    /// An argument is present but has a form this reader does not accept.
    #[error("line {line}: unsupported value for '{name}': {value}")]
    InvalidArgument {
        name: String,
        value: String,
        line: usize,
    },

    /// An operator other than BashOperator was assigned to a variable.
    #[error("line {line}: '{var}' uses {operator}; only BashOperator carries a shell command")]
    UnsupportedOperator {
        var: String,
        operator: String,
        line: usize,
    },

    /// A dependency statement names a variable that holds no task.
    #[error("line {line}: unknown task variable '{var}'")]
    UnknownTask { var: String, line: usize },

    /// A `>>`/`<<`, `set_*stream` or `chain` statement whose operands are
    /// not task variables or lists of them.
    #[error("line {line}: cannot read dependency statement '{statement}'")]
    UnreadableDependency { statement: String, line: usize },

    /// A call's parentheses never close.
    #[error("unterminated call starting at line {0}")]
    Unterminated(usize),

    #[error(transparent)]
    Dag(#[from] DagError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// A node in the pipeline graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedNode {
    /// Mermaid-safe unique id.
    pub id: String,
    pub label: String,
}

/// A directed edge between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ParsedEdge {
    pub from: String,
    pub to: String,
}

/// Where a node was found, relative to the scan root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: String,
    /// 1-based.
    pub line: usize,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Nodes, edges and node locations collected from a workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineGraph {
    nodes: Vec<ParsedNode>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
    edges: Vec<ParsedEdge>,
    #[serde(skip)]
    edge_set: HashSet<ParsedEdge>,
    mapping: BTreeMap<String, SourceLocation>,
}

impl PipelineGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, or relabel it if the id is already present.
    pub fn add_node(&mut self, id: &str, label: &str) {
        match self.positions.get(id) {
            Some(&i) => self.nodes[i].label = label.to_string(),
            None => {
                self.positions.insert(id.to_string(), self.nodes.len());
                self.nodes.push(ParsedNode {
                    id: id.to_string(),
                    label: label.to_string(),
                });
            }
        }
    }

    /// Add a node at the place it is defined; replaces any earlier location.
    pub fn define(&mut self, id: &str, label: &str, location: SourceLocation) {
        self.add_node(id, label);
        self.mapping.insert(id.to_string(), location);
    }

    /// Add a node referenced from elsewhere; keeps an existing location.
    pub fn mention(&mut self, id: &str, label: &str, location: SourceLocation) {
        self.add_node(id, label);
        self.mapping.entry(id.to_string()).or_insert(location);
    }

    /// Add an edge; repeated edges are kept once.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let edge = ParsedEdge {
            from: from.to_string(),
            to: to.to_string(),
        };
        if self.edge_set.insert(edge.clone()) {
            self.edges.push(edge);
        }
    }

    pub fn nodes(&self) -> &[ParsedNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[ParsedEdge] {
        &self.edges
    }

    pub fn mapping(&self) -> &BTreeMap<String, SourceLocation> {
        &self.mapping
    }

    /// Source location of a node, if known.
    pub fn location(&self, id: &str) -> Option<&SourceLocation> {
        self.mapping.get(id)
    }

    /// All nodes with the given label, with their locations.
    pub fn find_by_label(&self, label: &str) -> Vec<(&ParsedNode, Option<&SourceLocation>)> {
        self.nodes
            .iter()
            .filter(|n| n.label == label)
            .map(|n| (n, self.mapping.get(&n.id)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Mermaid-safe node id for `key` declared in `file`.
pub fn node_id(file: &str, key: &str) -> String {
    let hash = hash_code(&format!("{}::{}", file, key));
    format!("n{}", i64::from(hash).abs())
}

/// 31-polynomial string hash over UTF-16 code units with 32-bit wrapping.
pub fn hash_code(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

#[derive(Default)]
struct Candidates {
    python: Vec<PathBuf>,
    sql: Vec<PathBuf>,
    yaml: Vec<PathBuf>,
}

/// Scan a workspace and build its pipeline graph.
///
/// Python sources are processed first, then SQL, then YAML, each in path
/// order. Files that cannot be read are logged and skipped.
pub fn scan_workspace(
    root: impl AsRef<Path>,
    config: &ScanConfig,
) -> Result<PipelineGraph, ScanError> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let candidates = collect_candidates(root, config);
    let sources = &config.sources;
    let mut graph = PipelineGraph::new();

    if sources.airflow || sources.prefect {
        for path in &candidates.python {
            let Some(content) = read_source(path, config) else {
                continue;
            };
            if !is_python_candidate(path, &content) {
                continue;
            }
            let file = relative_name(root, path);
            debug!(file = %file, "scanning python source");
            if sources.airflow {
                airflow::extract(&content, &file, &mut graph);
            }
            if sources.prefect {
                prefect::extract(&content, &file, &mut graph);
            }
        }
    }

    if sources.dbt {
        for path in &candidates.sql {
            let Some(content) = read_source(path, config) else {
                continue;
            };
            let file = relative_name(root, path);
            debug!(file = %file, "scanning dbt model");
            dbt::extract_sql(&content, path, &file, &mut graph);
        }
    }

    if sources.dbt || sources.github_actions || sources.dagscout {
        for path in &candidates.yaml {
            let Some(content) = read_source(path, config) else {
                continue;
            };
            let doc: serde_yaml::Value = match serde_yaml::from_str(&content) {
                Ok(doc) => doc,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unparsable YAML");
                    continue;
                }
            };
            let file = relative_name(root, path);
            debug!(file = %file, "scanning YAML source");
            if sources.dbt {
                dbt::extract_yaml(&doc, &content, &file, &mut graph);
            }
            if sources.github_actions {
                github::extract(&doc, &content, &file, &mut graph);
            }
            if sources.dagscout {
                native::extract(&doc, &content, &file, &mut graph);
            }
        }
    }

    info!(
        root = %root.display(),
        nodes = graph.nodes().len(),
        edges = graph.edges().len(),
        "scan complete"
    );
    Ok(graph)
}

fn collect_candidates(root: &Path, config: &ScanConfig) -> Candidates {
    let mut candidates = Candidates::default();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let ignored = entry.depth() > 0
                && entry.file_type().is_dir()
                && config
                    .ignore_dirs
                    .iter()
                    .any(|dir| entry.file_name().to_str() == Some(dir.as_str()));
            !ignored
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("py") => candidates.python.push(path),
            Some("sql") => candidates.sql.push(path),
            Some("yml") | Some("yaml") => candidates.yaml.push(path),
            _ => {}
        }
    }

    candidates
}

/// Python files named `*_dag.py`, or mentioning Airflow or Prefect.
fn is_python_candidate(path: &Path, content: &str) -> bool {
    let named_dag = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with("_dag.py"));

    named_dag || content.contains("DAG(") || content.contains("airflow") || content.contains("@task")
}

fn read_source(path: &Path, config: &ScanConfig) -> Option<String> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > config.max_file_bytes => {
            debug!(path = %path.display(), bytes = meta.len(), "skipping large file");
            return None;
        }
        Ok(_) => {}
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable file");
            return None;
        }
    }

    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable file");
            None
        }
    }
}

/// Path relative to the scan root, `/`-separated.
fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// 1-based line of the first line whose trimmed text satisfies `matches`.
fn line_of(content: &str, matches: impl Fn(&str) -> bool) -> usize {
    content
        .lines()
        .position(|line| matches(line.trim()))
        .map(|i| i + 1)
        .unwrap_or(1)
}
