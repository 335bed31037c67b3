//! Concrete DAG definitions shipped with the crate.

use chrono::{TimeZone, Utc};

use crate::core::dag::{Dag, DagError};
use crate::core::schedule::Schedule;

/// Id of [`example_dag`].
pub const EXAMPLE_DAG_ID: &str = "example_dag";

/// Daily DAG chaining three shell commands: `print_date >> sleep >> echo_hello`.
///
/// Every call declares the DAG from scratch and yields an equal value.
pub fn example_dag() -> Result<Dag, DagError> {
    let start_date = Utc
        .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| DagError::InvalidStartDate("2025-01-01".to_string()))?;

    let mut dag = Dag::new(EXAMPLE_DAG_ID, start_date, Schedule::new("@daily")?, false)?;

    let t1 = dag.bash_task("print_date", "date")?;
    let t2 = dag.bash_task("sleep", "sleep 5")?;
    let t3 = dag.bash_task("echo_hello", r#"echo "Hello World""#)?;

    dag.chain(&[&t1, &t2, &t3])?;

    Ok(dag)
}
