//! Core identifier types.
//!
//! These types provide type-safe identifiers for DAGs and the tasks they hold.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest identifier accepted for a DAG or a task.
pub const MAX_ID_LEN: usize = 250;

/// Unique identifier for a task within a DAG.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(String);

/// Unique identifier for a DAG.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DagId(String);

impl TaskId {
    /// Create a new TaskId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is usable as a task key.
    pub fn is_well_formed(&self) -> bool {
        is_well_formed(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl DagId {
    /// Create a new DagId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is usable as a DAG key.
    pub fn is_well_formed(&self) -> bool {
        is_well_formed(&self.0)
    }
}

impl From<&str> for DagId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DagId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Non-empty, bounded, and limited to [A-Za-z0-9_.-].
fn is_well_formed(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
