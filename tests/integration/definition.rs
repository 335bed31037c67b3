//! The example DAG from every angle.
//!
//! The same pipeline is declared in code, in an Airflow file and in a YAML
//! definition; all three must produce the same DAG.

use crate::common::{Workspace, fixture};
use dagscout::scan::airflow;
use dagscout::{
    ConfigError, DagError, ScanError, TaskId, example_dag, load_dag_file,
    load_dags_from_directory,
};
use std::collections::HashSet;

#[test]
fn test_airflow_file_matches_declared_dag() {
    let parsed = airflow::parse_dag_file(fixture("example_dag.py")).unwrap();
    assert_eq!(parsed, example_dag().unwrap());
}

#[test]
fn test_yaml_definition_matches_declared_dag() {
    let loaded = load_dag_file(fixture("example_dag.yaml")).unwrap();
    assert_eq!(loaded, example_dag().unwrap());
}

#[test]
fn test_declaration_is_idempotent() {
    let first = example_dag().unwrap();
    let second = example_dag().unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[test]
fn test_example_structure() {
    let dag = example_dag().unwrap();

    let ids: HashSet<&str> = dag.tasks().iter().map(|t| t.id().as_str()).collect();
    assert_eq!(ids, HashSet::from(["print_date", "sleep", "echo_hello"]));

    let edges: HashSet<(&str, &str)> = dag
        .edges()
        .iter()
        .map(|e| (e.upstream.as_str(), e.downstream.as_str()))
        .collect();
    assert_eq!(
        edges,
        HashSet::from([("print_date", "sleep"), ("sleep", "echo_hello")])
    );

    assert_eq!(dag.roots(), vec![&TaskId::new("print_date")]);
    assert_eq!(dag.leaves(), vec![&TaskId::new("echo_hello")]);
    assert!(!dag.catchup());
    assert!(dag.schedule().is_daily());
}

#[test]
fn test_example_serializes_schedule_and_date_as_strings() {
    let json = serde_json::to_value(example_dag().unwrap()).unwrap();

    assert_eq!(json["id"], "example_dag");
    assert_eq!(json["schedule"], "@daily");
    assert_eq!(json["catchup"], false);
    assert!(json["start_date"].as_str().unwrap().starts_with("2025-01-01T00:00:00"));
    assert_eq!(json["tasks"][2]["command"], "echo \"Hello World\"");
    assert!(json.get("description").is_none());
}

#[test]
fn test_directory_of_definitions() {
    let ws = Workspace::new();
    ws.copy_fixture("example_dag.yaml", "dags/b_example.yaml");
    ws.write(
        "dags/a_single.yml",
        "id: single\nstart_date: 2024-12-31\nschedule: null\ntasks:\n  - id: only\n    command: 'true'\n",
    );
    ws.write("dags/README.md", "not a definition\n");

    let dags = load_dags_from_directory(ws.root().join("dags")).unwrap();
    let ids: Vec<&str> = dags.iter().map(|d| d.id().as_str()).collect();

    assert_eq!(ids, vec!["single", "example_dag"]);
    assert!(dags[0].schedule().is_manual());
    assert_eq!(dags[1], example_dag().unwrap());
}

#[test]
fn test_yaml_cycle_is_rejected() {
    let ws = Workspace::new();
    let path = ws.write(
        "loop.yaml",
        "id: loop\nstart_date: 2025-01-01\ntasks:\n  - id: a\n    command: 'true'\n    depends_on: [b]\n  - id: b\n    command: 'true'\n    depends_on: [a]\n",
    );

    let err = load_dag_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidConfig(_)));
    assert!(err.to_string().contains("cycle"));
}

#[test]
fn test_airflow_file_with_python_operator_is_rejected() {
    let ws = Workspace::new();
    let path = ws.write(
        "py_dag.py",
        "with DAG('py', start_date=datetime(2025, 1, 1)) as dag:\n    t = PythonOperator(task_id='t', python_callable=run)\n",
    );

    let err = airflow::parse_dag_file(&path).unwrap_err();
    assert!(matches!(err, ScanError::UnsupportedOperator { .. }));
}

#[test]
fn test_missing_airflow_file() {
    let err = airflow::parse_dag_file("/no/such/file_dag.py").unwrap_err();
    assert!(matches!(err, ScanError::Read { .. }));
}

#[test]
fn test_airflow_duplicate_edges_collapse() {
    let ws = Workspace::new();
    let path = ws.write(
        "twice_dag.py",
        "with DAG('twice', start_date=datetime(2025, 1, 1)) as dag:\n    a = BashOperator(task_id='a', bash_command='true')\n    b = BashOperator(task_id='b', bash_command='true')\n    a >> b\n    a >> b\n    b << a\n",
    );

    let dag = airflow::parse_dag_file(&path).unwrap();
    assert_eq!(dag.edges().len(), 1);
    assert!(matches!(dag.validate(), Ok(())));
    assert!(!matches!(
        dag.topological_sort(),
        Err(DagError::CycleDetected(_))
    ));
}
