//! Directed Acyclic Graph (DAG) of shell tasks.
//!
//! A DAG carries the metadata an orchestrator needs to schedule it (id, start
//! date, schedule, catch-up flag), an ordered set of tasks and the "must
//! complete before" edges between them. Declaring a DAG never runs anything.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::schedule::{Schedule, ScheduleError};
use super::task::{Task, TaskHandle};
use super::types::{DagId, TaskId};

/// Errors that can occur when working with DAGs.
#[derive(Debug, Error)]
pub enum DagError {
    /// A cycle was detected in the graph.
    #[error("cycle detected involving task: {0}")]
    CycleDetected(TaskId),

    /// A dependency references a task that doesn't exist.
    #[error("missing dependency: task '{from}' depends on non-existent task '{to}'")]
    MissingDependency { from: TaskId, to: TaskId },

    /// Attempted to add a duplicate task.
    #[error("duplicate task: {0}")]
    DuplicateTask(TaskId),

    /// Task not found in the DAG.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// A handle issued by another DAG was used.
    #[error("task '{task}' belongs to DAG '{owner}', not '{dag}'")]
    ForeignTask {
        task: TaskId,
        owner: DagId,
        dag: DagId,
    },

    /// The DAG id is empty, too long, or has forbidden characters.
    #[error("invalid DAG id: '{0}'")]
    InvalidDagId(String),

    /// The task id is empty, too long, or has forbidden characters.
    #[error("invalid task id: '{0}'")]
    InvalidTaskId(String),

    /// The start date does not name a single instant.
    #[error("invalid start date: {0}")]
    InvalidStartDate(String),

    /// No start date was given to the builder.
    #[error("DAG '{0}' has no start date")]
    MissingStartDate(DagId),

    /// The schedule expression did not parse.
    #[error("invalid schedule: {0}")]
    Schedule(#[from] ScheduleError),
}

/// A directed edge: `upstream` must complete before `downstream` starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub upstream: TaskId,
    pub downstream: TaskId,
}

/// A Directed Acyclic Graph of shell tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dag {
    /// Unique identifier for this DAG.
    id: DagId,

    /// Optional human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    /// Scheduling is eligible from this instant.
    start_date: DateTime<Utc>,

    /// Recurrence of the DAG.
    schedule: Schedule,

    /// Whether missed intervals since `start_date` get backfilled.
    catchup: bool,

    /// Tasks in declaration order.
    tasks: Vec<Task>,

    /// Task id -> position in `tasks`.
    #[serde(skip)]
    index: HashMap<TaskId, usize>,

    /// Edges in declaration order, without duplicates.
    edges: Vec<Edge>,

    /// Membership index over `edges`.
    #[serde(skip)]
    edge_set: HashSet<Edge>,
}

impl Dag {
    /// Create a new empty DAG.
    pub fn new(
        id: impl Into<String>,
        start_date: DateTime<Utc>,
        schedule: Schedule,
        catchup: bool,
    ) -> Result<Self, DagError> {
        let id = DagId::new(id);
        if !id.is_well_formed() {
            return Err(DagError::InvalidDagId(id.as_str().to_string()));
        }

        Ok(Self {
            id,
            description: None,
            start_date,
            schedule,
            catchup,
            tasks: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            edge_set: HashSet::new(),
        })
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Get the DAG ID.
    pub fn id(&self) -> &DagId {
        &self.id
    }

    /// Get the description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Get the start date.
    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    /// Get the schedule.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Whether missed intervals are backfilled.
    pub fn catchup(&self) -> bool {
        self.catchup
    }

    /// Check if the DAG is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Get the number of tasks in the DAG.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Register a shell-command task.
    pub fn bash_task(
        &mut self,
        id: impl Into<String>,
        command: impl Into<String>,
    ) -> Result<TaskHandle, DagError> {
        self.add_task(Task::new(id.into(), command))
    }

    /// Register a task and return its handle.
    pub fn add_task(&mut self, task: Task) -> Result<TaskHandle, DagError> {
        let id = task.id().clone();
        if !id.is_well_formed() {
            return Err(DagError::InvalidTaskId(id.as_str().to_string()));
        }
        if self.index.contains_key(&id) {
            return Err(DagError::DuplicateTask(id));
        }

        debug!(dag = %self.id, task = %id, "registered task");
        self.index.insert(id.clone(), self.tasks.len());
        self.tasks.push(task);
        Ok(TaskHandle::new(self.id.clone(), id))
    }

    /// Get the handle of a registered task.
    pub fn handle(&self, id: &TaskId) -> Option<TaskHandle> {
        self.index
            .contains_key(id)
            .then(|| TaskHandle::new(self.id.clone(), id.clone()))
    }

    /// Declare that `upstream` must complete before `downstream`.
    ///
    /// Declaring an existing edge again is a no-op. Cycles are reported by
    /// [`Dag::validate`], not here.
    pub fn set_downstream(
        &mut self,
        upstream: &TaskHandle,
        downstream: &TaskHandle,
    ) -> Result<(), DagError> {
        self.check_handle(upstream)?;
        self.check_handle(downstream)?;

        let edge = Edge {
            upstream: upstream.id().clone(),
            downstream: downstream.id().clone(),
        };
        if self.edge_set.insert(edge.clone()) {
            self.edges.push(edge);
        }
        Ok(())
    }

    /// Declare that `upstream` must complete before `task`.
    pub fn set_upstream(
        &mut self,
        task: &TaskHandle,
        upstream: &TaskHandle,
    ) -> Result<(), DagError> {
        self.set_downstream(upstream, task)
    }

    /// Link the tasks into a linear chain, `a >> b >> c` style.
    pub fn chain(&mut self, tasks: &[&TaskHandle]) -> Result<(), DagError> {
        for pair in tasks.windows(2) {
            self.set_downstream(pair[0], pair[1])?;
        }
        Ok(())
    }

    fn check_handle(&self, handle: &TaskHandle) -> Result<(), DagError> {
        if handle.dag_id() != &self.id {
            return Err(DagError::ForeignTask {
                task: handle.id().clone(),
                owner: handle.dag_id().clone(),
                dag: self.id.clone(),
            });
        }
        if !self.index.contains_key(handle.id()) {
            return Err(DagError::TaskNotFound(handle.id().clone()));
        }
        Ok(())
    }

    /// Get a task by ID.
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    /// All tasks in declaration order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// All edges in declaration order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Check whether `upstream -> downstream` was declared.
    pub fn has_edge(&self, upstream: &str, downstream: &str) -> bool {
        self.edges
            .iter()
            .any(|e| e.upstream.as_str() == upstream && e.downstream.as_str() == downstream)
    }

    /// Tasks that must complete before the given task.
    pub fn upstream_of(&self, id: &TaskId) -> Vec<&TaskId> {
        self.edges
            .iter()
            .filter(|e| &e.downstream == id)
            .map(|e| &e.upstream)
            .collect()
    }

    /// Tasks that wait on the given task.
    pub fn downstream_of(&self, id: &TaskId) -> Vec<&TaskId> {
        self.edges
            .iter()
            .filter(|e| &e.upstream == id)
            .map(|e| &e.downstream)
            .collect()
    }

    /// Tasks without upstream dependencies.
    pub fn roots(&self) -> Vec<&TaskId> {
        self.tasks
            .iter()
            .map(Task::id)
            .filter(|id| !self.edges.iter().any(|e| &e.downstream == *id))
            .collect()
    }

    /// Tasks nothing depends on.
    pub fn leaves(&self) -> Vec<&TaskId> {
        self.tasks
            .iter()
            .map(Task::id)
            .filter(|id| !self.edges.iter().any(|e| &e.upstream == *id))
            .collect()
    }

    /// Return tasks in topological order.
    ///
    /// Ties are broken by declaration order, so the result is stable.
    pub fn topological_sort(&self) -> Result<Vec<TaskId>, DagError> {
        // Kahn's algorithm over task positions
        let mut in_degree = vec![0usize; self.tasks.len()];
        let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); self.tasks.len()];

        for edge in &self.edges {
            let from = self.position(&edge.upstream)?;
            let to = self.position(&edge.downstream)?;
            in_degree[to] += 1;
            downstream[from].push(to);
        }

        let mut queue: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(i, _)| i)
            .collect();

        let mut result = Vec::with_capacity(self.tasks.len());

        while let Some(i) = queue.pop_front() {
            result.push(self.tasks[i].id().clone());

            for &next in &downstream[i] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        // Anything left with a positive in-degree sits on a cycle
        if result.len() != self.tasks.len() {
            let stuck = in_degree
                .iter()
                .position(|degree| *degree > 0)
                .unwrap_or_default();
            return Err(DagError::CycleDetected(self.tasks[stuck].id().clone()));
        }

        Ok(result)
    }

    fn position(&self, id: &TaskId) -> Result<usize, DagError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| DagError::TaskNotFound(id.clone()))
    }

    /// Validate the DAG structure.
    pub fn validate(&self) -> Result<(), DagError> {
        self.topological_sort()?;
        debug!(
            dag = %self.id,
            tasks = self.tasks.len(),
            edges = self.edges.len(),
            "DAG is valid"
        );
        Ok(())
    }
}

/// Builder for constructing DAGs fluently by task id.
///
/// Errors are collected and reported by [`DagBuilder::build`], which also
/// validates the result.
pub struct DagBuilder {
    id: String,
    description: Option<String>,
    start_date: Option<DateTime<Utc>>,
    schedule: Option<Schedule>,
    schedule_expr: Option<String>,
    catchup: bool,
    tasks: Vec<Task>,
    dependencies: Vec<(String, String)>,
}

impl DagBuilder {
    /// Create a new DAG builder. The schedule defaults to `@daily` and
    /// catch-up to off.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            start_date: None,
            schedule: None,
            schedule_expr: None,
            catchup: false,
            tasks: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the start date.
    pub fn start_date(mut self, start_date: DateTime<Utc>) -> Self {
        self.start_date = Some(start_date);
        self
    }

    /// Set the schedule expression; it is parsed on build.
    pub fn schedule(mut self, expression: impl Into<String>) -> Self {
        self.schedule = None;
        self.schedule_expr = Some(expression.into());
        self
    }

    /// Use an already parsed schedule.
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule_expr = None;
        self.schedule = Some(schedule);
        self
    }

    /// Set the catch-up flag.
    pub fn catchup(mut self, catchup: bool) -> Self {
        self.catchup = catchup;
        self
    }

    /// Add a shell-command task.
    pub fn bash_task(mut self, id: impl Into<String>, command: impl Into<String>) -> Self {
        self.tasks.push(Task::new(id.into(), command));
        self
    }

    /// Add a task with dependencies.
    pub fn bash_task_with_deps(
        mut self,
        id: impl Into<String>,
        command: impl Into<String>,
        depends_on: &[&str],
    ) -> Self {
        let id = id.into();
        for dep in depends_on {
            self.dependencies.push((dep.to_string(), id.clone()));
        }
        self.tasks.push(Task::new(id, command));
        self
    }

    /// Add a dependency between tasks.
    pub fn dependency(mut self, upstream: &str, downstream: &str) -> Self {
        self.dependencies
            .push((upstream.to_string(), downstream.to_string()));
        self
    }

    /// Build the DAG, validating it in the process.
    pub fn build(self) -> Result<Dag, DagError> {
        let start_date = self
            .start_date
            .ok_or_else(|| DagError::MissingStartDate(DagId::new(self.id.clone())))?;
        let schedule = match (self.schedule, self.schedule_expr) {
            (Some(schedule), _) => schedule,
            (None, Some(expr)) => Schedule::new(expr)?,
            (None, None) => Schedule::new("@daily")?,
        };

        let mut dag = Dag::new(self.id, start_date, schedule, self.catchup)?;
        if let Some(description) = self.description {
            dag = dag.with_description(description);
        }

        for task in self.tasks {
            dag.add_task(task)?;
        }

        for (upstream, downstream) in &self.dependencies {
            let downstream_id = TaskId::new(downstream.as_str());
            let to = dag
                .handle(&downstream_id)
                .ok_or_else(|| DagError::TaskNotFound(downstream_id.clone()))?;
            let from = dag
                .handle(&TaskId::new(upstream.as_str()))
                .ok_or_else(|| DagError::MissingDependency {
                    from: downstream_id.clone(),
                    to: TaskId::new(upstream.as_str()),
                })?;
            dag.set_downstream(&from, &to)?;
        }

        dag.validate()?;
        Ok(dag)
    }
}
