//! Core DAG model: identifiers, schedules, tasks and the DAG itself.

pub mod dag;
pub mod schedule;
pub mod task;
pub mod types;
