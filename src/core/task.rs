//! Shell-command tasks and the handles that refer to them.
//!
//! A [`Task`] is the unit of work in a DAG: an id and the shell command the
//! orchestrator will eventually run. Registering a task on a DAG returns a
//! [`TaskHandle`], which is how dependencies are declared.

use serde::Serialize;

use super::types::{DagId, TaskId};

/// A single shell command within a DAG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    id: TaskId,
    command: String,
}

impl Task {
    /// Create a new task. The command is stored verbatim.
    pub fn new(id: impl Into<TaskId>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
        }
    }

    /// The task id, unique within its DAG.
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// The shell command to execute.
    pub fn command(&self) -> &str {
        &self.command
    }
}

/// Reference to a task registered on a specific DAG.
///
/// Handles are only accepted by the DAG that issued them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    dag_id: DagId,
    task_id: TaskId,
}

impl TaskHandle {
    pub(crate) fn new(dag_id: DagId, task_id: TaskId) -> Self {
        Self { dag_id, task_id }
    }

    /// The DAG this handle belongs to.
    pub fn dag_id(&self) -> &DagId {
        &self.dag_id
    }

    /// The referenced task.
    pub fn id(&self) -> &TaskId {
        &self.task_id
    }
}
